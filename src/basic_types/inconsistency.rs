use thiserror::Error;

use crate::engine::EmptyDomain;

/// The reason why a propagation cannot be completed. Either a domain mutation wiped out a domain,
/// or the propagator itself has proven the current state inconsistent and reports a typed
/// [`Conflict`].
#[derive(Debug, PartialEq, Eq)]
pub enum Inconsistency {
    EmptyDomain,
    Conflict(Conflict),
}

impl From<EmptyDomain> for Inconsistency {
    fn from(_: EmptyDomain) -> Self {
        Inconsistency::EmptyDomain
    }
}

impl From<Conflict> for Inconsistency {
    fn from(conflict: Conflict) -> Self {
        Inconsistency::Conflict(conflict)
    }
}

/// A conflict stated by a propagator before any domain was wiped out.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// More variables are forced to take a value than its cardinality allows.
    #[error("value {value} is taken by {forced} variables but may occur at most {available} times")]
    CapacityExceeded {
        value: i32,
        forced: i32,
        available: i32,
    },
    /// Fewer variables can still take a value than its cardinality requires.
    #[error("value {value} must occur at least {required} times but only {supported} variables support it")]
    CapacityShortage {
        value: i32,
        required: i32,
        supported: i32,
    },
    /// More variables are contained in a value interval than the interval can absorb.
    #[error("more variables are contained in {lower}..={upper} than the values can absorb")]
    HallIntervalOverflow { lower: i32, upper: i32 },
    /// The joint demand of a value interval exceeds the variables that can reach it.
    #[error("values {lower}..={upper} require {demand} occurrences but only {supported} variables reach them")]
    DemandExceedsSupport {
        lower: i32,
        upper: i32,
        demand: i64,
        supported: i64,
    },
    /// No assignment of variables to values respects the remaining capacities.
    #[error("variable at index {variable} cannot be matched to any value within the remaining capacities")]
    UnmatchableVariable { variable: usize },
}
