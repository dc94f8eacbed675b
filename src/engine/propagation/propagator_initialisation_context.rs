use crate::engine::propagation::LocalId;
use crate::engine::propagation::PropagationContext;
use crate::engine::propagation::PropagatorId;
use crate::engine::variables::IntegerVariable;
use crate::engine::Assignments;
use crate::engine::DomainEvents;
use crate::engine::PropagatorVarId;
use crate::engine::WatchListCP;
use crate::engine::Watchers;

/// [`PropagatorInitialisationContext`] is used when [`Propagator`]s are initialised; it provides
/// read access to the current domains and the ability to register subscriptions to domain events.
///
/// [`Propagator`]: crate::engine::propagation::Propagator
#[derive(Debug)]
pub struct PropagatorInitialisationContext<'a> {
    watch_list: &'a mut WatchListCP,
    propagator_id: PropagatorId,
    pub assignments: &'a Assignments,
}

impl<'a> PropagatorInitialisationContext<'a> {
    pub fn new(
        watch_list: &'a mut WatchListCP,
        propagator_id: PropagatorId,
        assignments: &'a Assignments,
    ) -> Self {
        PropagatorInitialisationContext {
            watch_list,
            propagator_id,
            assignments,
        }
    }

    /// Subscribes the propagator to the given [`DomainEvents`] on `var` under the local slot
    /// `local_id`.
    pub fn register<Var: IntegerVariable>(
        &mut self,
        var: Var,
        domain_events: DomainEvents,
        local_id: LocalId,
    ) {
        let propagator_var = PropagatorVarId {
            propagator: self.propagator_id,
            variable: local_id,
        };
        let mut watchers = Watchers::new(propagator_var, self.watch_list);
        var.watch_all(&mut watchers, domain_events.get_int_events());
    }

    pub fn as_readonly(&self) -> PropagationContext<'_> {
        PropagationContext::new(self.assignments)
    }
}
