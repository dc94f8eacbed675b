//! Containers used throughout the library.
mod keyed_vec;

pub use keyed_vec::*;
