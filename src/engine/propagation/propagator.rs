use crate::basic_types::Inconsistency;
use crate::basic_types::PropagationCost;
use crate::basic_types::PropagationStatus;
use crate::engine::propagation::PropagationContext;
use crate::engine::propagation::PropagationContextMut;
use crate::engine::propagation::PropagatorInitialisationContext;
use crate::engine::ModificationEvent;

/// All propagators implement the [`Propagator`] trait, which defines the main propagator logic
/// with regards to propagation and detecting conflicts.
///
/// A propagator is a passive object: the surrounding engine invokes
/// [`Propagator::propagate`] whenever one of the variables the propagator subscribed to through
/// [`Propagator::initialise_at_root`] was modified, passing the join of the modification events
/// seen since the previous invocation. Within a single call the propagator runs to its own
/// fixpoint on the current domains and reports through the returned
/// [`PropagationStatus`](crate::basic_types::PropagationStatus) whether it needs to be scheduled
/// again, can be removed altogether, or has proven the current state a dead end.
pub trait Propagator {
    /// Return the name of the propagator, this is a convenience method that is used for printing.
    fn name(&self) -> &str;

    /// Initialises the propagator without performing propagation. This method is called only once
    /// when the propagator is added to the engine.
    ///
    /// The method is used to detect root-level inconsistencies and to register the variables the
    /// propagator wants to be scheduled for by calling
    /// [`PropagatorInitialisationContext::register`].
    fn initialise_at_root(
        &mut self,
        context: &mut PropagatorInitialisationContext,
    ) -> Result<(), Inconsistency>;

    /// Extend the current domains with inferred domain changes.
    ///
    /// `delta` is the join of the modification events on watched variables since the previous
    /// call ([`ModificationEvent::Assigned`] on the very first call).
    fn propagate(
        &mut self,
        context: PropagationContextMut,
        delta: ModificationEvent,
    ) -> PropagationStatus;

    /// The worst-case cost class of running [`Propagator::propagate`] on the current domains,
    /// used by the engine to order scheduled propagators from cheap to expensive.
    fn cost(&self, context: PropagationContext, delta: ModificationEvent) -> PropagationCost;

    /// Returns the priority of the propagator represented as an integer. Lower values mean
    /// higher priority and the priority determines the order in which propagators will be asked
    /// to propagate. It is custom for simpler propagators to have lower priority values.
    fn priority(&self) -> u32 {
        3
    }

    /// A deep copy of the propagator, including any state it carries across propagations. Used
    /// when the surrounding space is cloned for branching, so that no matching or scratch state
    /// is shared between branches.
    fn boxed_clone(&self) -> Box<dyn Propagator>;
}

impl Clone for Box<dyn Propagator> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}
