use crate::basic_types::Inconsistency;

/// The result of invoking a propagator. Propagation either succeeds, reporting how the scheduler
/// should treat the propagator afterwards through a [`PropagationOutcome`], or it identifies the
/// current state as a dead end through an [`Inconsistency`].
pub type PropagationStatus = Result<PropagationOutcome, Inconsistency>;

/// Reported by a successful [`propagate`](crate::engine::propagation::Propagator::propagate)
/// call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropagationOutcome {
    /// The propagator is at fixpoint with respect to the current domains; it does not need to run
    /// again until one of its watched variables changes.
    AtFixpoint,
    /// Domains were changed in ways the propagator may itself react to; it should be scheduled
    /// again.
    NotAtFixpoint,
    /// The constraint holds in every extension of the current domains; the propagator can be
    /// removed.
    Subsumed,
}
