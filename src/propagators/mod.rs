//! Contains the propagator implementations.
//!
//! See [`crate::engine::propagation`] for the contract propagators implement.

pub(crate) mod global_cardinality;

pub use global_cardinality::Occurrence;
