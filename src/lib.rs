//! # Tally
//! Tally is a finite-domain propagation library centred on the global cardinality constraint:
//! given integer variables `x[0..n)` and cardinalities pairing a value with an admissible
//! occurrence range, every remaining assignment must take each value a number of times inside
//! its range.
//!
//! Three propagator variants of increasing strength are provided and selected at posting time
//! through [`constraints::ConsistencyLevel`]:
//! * value consistency, a cheap counting loop;
//! * bounds consistency, the Hall-interval algorithm of Quimper et al.;
//! * domain consistency, the matching-based algorithm of Régin.
//!
//! The library does not ship a search engine. It exposes the propagation contract an engine
//! drives instead:
//! * [`engine::Assignments`] stores the variable domains; mutators report a
//!   [`engine::ModificationEvent`] from the lattice `None ⊑ Bounds ⊑ Domain ⊑ Assigned`, and an
//!   emptied domain surfaces as an error absorbing everything else.
//! * [`constraints::global_cardinality`] and [`constraints::global_cardinality_with_counts`]
//!   validate a posting and return the chosen
//!   [`Propagator`](engine::propagation::Propagator).
//! * The engine registers the propagator's subscriptions ([`engine::WatchListCP`]), and calls
//!   [`propagate`](engine::propagation::Propagator::propagate) with the joined modification
//!   events whenever a watched variable changed, until a fixpoint, subsumption, or failure is
//!   reported.
//! * Branching clones the state: [`engine::Assignments`] and every propagator deep-copy
//!   themselves, so incremental structures (such as the domain propagator's variable-value
//!   graph) are never shared between branches.
//!
//! ## Feature flags
//! - `debug-checks`: enable expensive internal consistency assertions. Turning this on slows
//!   the propagators down considerably, so it is off by default.

pub mod asserts;
pub mod basic_types;
pub mod constraints;
pub mod containers;
pub mod engine;
pub(crate) mod propagators;

pub use propagators::Occurrence;
