#![cfg(test)]
//! This module exposes helpers that aid testing of propagators. The [`TestSolver`] allows
//! setting up specific scenarios under which to test the various operations of a propagator.
use crate::basic_types::Inconsistency;
use crate::basic_types::PropagationOutcome;
use crate::basic_types::PropagationStatus;
use crate::containers::KeyedVec;
use crate::engine::propagation::PropagationContextMut;
use crate::engine::propagation::Propagator;
use crate::engine::propagation::PropagatorId;
use crate::engine::propagation::PropagatorInitialisationContext;
use crate::engine::variables::DomainId;
use crate::engine::Assignments;
use crate::engine::EmptyDomain;
use crate::engine::ModificationEvent;
use crate::engine::WatchListCP;

/// A container for variables and propagators, which can be used to test propagators. It drives
/// the cooperative scheduling contract: domain events are joined per watching propagator into a
/// pending modification-event delta, which the next `propagate` call consumes.
///
/// The solver is `Clone`; cloning it is the space-cloning operation, deep-copying domains and
/// propagator state.
#[derive(Clone, Default)]
pub(crate) struct TestSolver {
    pub assignments: Assignments,
    pub watch_list: WatchListCP,
    propagators: KeyedVec<PropagatorId, Box<dyn Propagator>>,
    pending_deltas: KeyedVec<PropagatorId, ModificationEvent>,
}

impl TestSolver {
    pub(crate) fn new_variable(&mut self, lb: i32, ub: i32) -> DomainId {
        self.watch_list.grow();
        self.assignments.grow(lb, ub)
    }

    /// Registers a propagator without propagating; the first [`TestSolver::propagate`] call
    /// sees the full [`ModificationEvent::Assigned`] delta.
    pub(crate) fn new_propagator(
        &mut self,
        propagator: impl Propagator + 'static,
    ) -> Result<PropagatorId, Inconsistency> {
        let propagator: Box<dyn Propagator> = Box::new(propagator);
        let id = self.propagators.push(propagator);
        let _ = self.pending_deltas.push(ModificationEvent::Assigned);

        self.propagators[id].initialise_at_root(&mut PropagatorInitialisationContext::new(
            &mut self.watch_list,
            id,
            &self.assignments,
        ))?;

        Ok(id)
    }

    pub(crate) fn propagate(&mut self, propagator: PropagatorId) -> PropagationStatus {
        self.distribute_events();
        let delta = std::mem::replace(
            &mut self.pending_deltas[propagator],
            ModificationEvent::None,
        );
        let context = PropagationContextMut::new(&mut self.assignments);
        self.propagators[propagator].propagate(context, delta)
    }

    /// Propagate with an explicit delta, bypassing the pending events; used to check that a
    /// re-run at a fixpoint does not prune further.
    pub(crate) fn propagate_with_delta(
        &mut self,
        propagator: PropagatorId,
        delta: ModificationEvent,
    ) -> PropagationStatus {
        self.distribute_events();
        self.pending_deltas[propagator] = ModificationEvent::None;
        let context = PropagationContextMut::new(&mut self.assignments);
        self.propagators[propagator].propagate(context, delta)
    }

    pub(crate) fn propagate_until_fixed_point(
        &mut self,
        propagator: PropagatorId,
    ) -> PropagationStatus {
        // the iteration bound only exists to turn a non-converging propagator into a test
        // failure instead of a hang
        for _ in 0..1000 {
            let outcome = self.propagate(propagator)?;
            if outcome == PropagationOutcome::Subsumed {
                return Ok(outcome);
            }
            self.distribute_events();
            if outcome == PropagationOutcome::AtFixpoint
                && self.pending_deltas[propagator] == ModificationEvent::None
            {
                return Ok(outcome);
            }
        }
        panic!("propagator did not reach a fixpoint");
    }

    /// Join buffered domain events into the pending deltas of the watching propagators.
    fn distribute_events(&mut self) {
        let events: Vec<_> = self.assignments.drain_domain_events().collect();
        for (event, domain) in events {
            for watcher in self.watch_list.get_affected_propagators(event, domain) {
                let delta = &mut self.pending_deltas[watcher.propagator];
                *delta = delta.join(event.into());
            }
        }
    }

    pub(crate) fn contains(&self, var: DomainId, value: i32) -> bool {
        self.assignments.is_value_in_domain(var, value)
    }

    pub(crate) fn lower_bound(&self, var: DomainId) -> i32 {
        self.assignments.get_lower_bound(var)
    }

    pub(crate) fn upper_bound(&self, var: DomainId) -> i32 {
        self.assignments.get_upper_bound(var)
    }

    pub(crate) fn domain_values(&self, var: DomainId) -> Vec<i32> {
        self.assignments.get_domain_iterator(var).collect()
    }

    pub(crate) fn remove(&mut self, var: DomainId, value: i32) -> Result<(), EmptyDomain> {
        let _ = self.assignments.remove_value_from_domain(var, value)?;
        Ok(())
    }

    pub(crate) fn set_lower_bound(&mut self, var: DomainId, bound: i32) -> Result<(), EmptyDomain> {
        let _ = self.assignments.tighten_lower_bound(var, bound)?;
        Ok(())
    }

    pub(crate) fn set_upper_bound(&mut self, var: DomainId, bound: i32) -> Result<(), EmptyDomain> {
        let _ = self.assignments.tighten_upper_bound(var, bound)?;
        Ok(())
    }

    pub(crate) fn assign(&mut self, var: DomainId, value: i32) -> Result<(), EmptyDomain> {
        let _ = self.assignments.make_assignment(var, value)?;
        Ok(())
    }

    pub(crate) fn assert_bounds(&self, var: DomainId, lb: i32, ub: i32) {
        let actual_lb = self.lower_bound(var);
        let actual_ub = self.upper_bound(var);

        assert_eq!(
            (lb, ub), (actual_lb, actual_ub),
            "The expected bounds [{lb}..{ub}] did not match the actual bounds [{actual_lb}..{actual_ub}]"
        );
    }
}
