//! Defines the constraints the library provides out of the box.
//!
//! A constraint is a relation over variables. It is enforced through one of its propagators,
//! selected at posting time; posting validates the arguments and returns the propagator for the
//! surrounding engine to own and schedule.

mod global_cardinality;

pub use global_cardinality::*;
