use fnv::FnvHashMap;
use log::trace;

use crate::basic_types::Conflict;
use crate::basic_types::Inconsistency;
use crate::basic_types::PropagationCost;
use crate::basic_types::PropagationOutcome;
use crate::basic_types::PropagationStatus;
use crate::engine::propagation::LocalId;
use crate::engine::propagation::PropagationContext;
use crate::engine::propagation::PropagationContextMut;
use crate::engine::propagation::Propagator;
use crate::engine::propagation::PropagatorInitialisationContext;
use crate::engine::propagation::ReadDomains;
use crate::engine::variables::IntegerVariable;
use crate::engine::DomainEvents;
use crate::engine::ModificationEvent;
use crate::propagators::global_cardinality::card_positions;
use crate::propagators::global_cardinality::check_subsumption;
use crate::propagators::global_cardinality::count_occurrences;
use crate::propagators::global_cardinality::hall_intervals::HallIntervalEngine;
use crate::propagators::global_cardinality::initial_prune;
use crate::propagators::global_cardinality::partial_sum::PartialSum;
use crate::propagators::global_cardinality::Cardinality;

/// Bounds-consistent propagator for the global cardinality constraint.
///
/// One propagation runs: prune the cardinalities (when they are variable backed), then the two
/// Hall-interval sweeps against the upper capacities, then the demand filtering against the
/// lower capacities. Variable bounds changed by one pass can enable the others, so the
/// propagator reports [`PropagationOutcome::NotAtFixpoint`] after any change and is re-run
/// until the passes agree.
#[derive(Clone, Debug)]
pub(crate) struct GccBoundsPropagator<Var, C> {
    vars: Box<[Var]>,
    cards: Box<[C]>,
    card_index: FnvHashMap<i32, usize>,
    closed: bool,
    initial_pruning_done: bool,
    engine: HallIntervalEngine,
    /// Demand partial sums, kept across propagations while the demands cannot move.
    lower_sums: Option<PartialSum>,
    /// Reused capacity buffer for rebuilding the upper partial sums.
    capacity_buffer: Vec<i64>,
}

impl<Var: IntegerVariable, C: Cardinality> GccBoundsPropagator<Var, C> {
    pub(crate) fn new(vars: Box<[Var]>, cards: Box<[C]>, closed: bool) -> Self {
        let card_index = card_positions(&cards);
        GccBoundsPropagator {
            vars,
            cards,
            card_index,
            closed,
            initial_pruning_done: false,
            engine: HallIntervalEngine::default(),
            lower_sums: None,
            capacity_buffer: Vec::new(),
        }
    }

    /// Build the prefix sums of the upper capacities over the current variable span. Values
    /// without a cardinality are unconstrained unless the constraint is closed.
    fn build_upper_sums(&mut self, context: &PropagationContextMut<'_>) -> PartialSum {
        let span_lower = self
            .vars
            .iter()
            .map(|var| context.lower_bound(var))
            .min()
            .expect("bounds propagation runs on at least one variable");
        let span_upper = self
            .vars
            .iter()
            .map(|var| context.upper_bound(var))
            .max()
            .expect("bounds propagation runs on at least one variable");

        let unlisted = if self.closed {
            0
        } else {
            self.vars.len() as i64
        };
        self.capacity_buffer.clear();
        for value in span_lower..=span_upper {
            let capacity = match self.card_index.get(&value) {
                Some(&slot) => self.cards[slot].max(context.assignments).max(0) as i64,
                None => unlisted,
            };
            self.capacity_buffer.push(capacity);
        }
        PartialSum::new(span_lower, &self.capacity_buffer)
    }

    /// Build the prefix sums of the lower capacities over the cardinality value span.
    fn build_lower_sums(&self, context: &PropagationContextMut<'_>) -> PartialSum {
        let first = self
            .cards
            .iter()
            .map(|card| card.value())
            .min()
            .expect("there is at least one cardinality");
        let last = self
            .cards
            .iter()
            .map(|card| card.value())
            .max()
            .expect("there is at least one cardinality");

        let mut demands = vec![0_i64; (last - first + 1) as usize];
        for card in self.cards.iter() {
            demands[(card.value() - first) as usize] =
                card.min(context.assignments).max(0) as i64;
        }
        PartialSum::new(first, &demands)
    }

    fn skip_demand_filtering(&self, context: &PropagationContextMut<'_>) -> bool {
        self.cards
            .iter()
            .all(|card| card.min(context.assignments) <= 0)
    }

    fn all_cardinalities_fixed(&self, context: &PropagationContextMut<'_>) -> bool {
        self.cards
            .iter()
            .all(|card| card.is_fixed(context.assignments))
    }

    /// Tighten every cardinality to the number of variables that are forced to respectively can
    /// still take its value, and remove values whose cardinality has collapsed to zero.
    fn prune_cardinalities(
        &mut self,
        context: &mut PropagationContextMut<'_>,
    ) -> Result<ModificationEvent, Inconsistency> {
        let mut change = ModificationEvent::None;
        let mut demand_total = 0_i64;
        let mut capacity_total = 0_i64;

        for slot in 0..self.cards.len() {
            let value = self.cards[slot].value();
            let (forced, possible) = count_occurrences(context, &self.vars, value);
            self.cards[slot].set_counter(forced);

            change = change.join(self.cards[slot].require_at_least(context.assignments, forced)?);
            change = change.join(self.cards[slot].require_at_most(context.assignments, possible)?);

            if self.cards[slot].max(context.assignments) == 0 && possible > 0 {
                for var in self.vars.iter() {
                    change = change.join(context.remove(var, value)?);
                }
            }

            demand_total += self.cards[slot].min(context.assignments) as i64;
            capacity_total += self.cards[slot].max(context.assignments) as i64;
        }

        let n = self.vars.len() as i64;
        let span = || {
            let lower = self.cards.iter().map(|card| card.value()).min();
            let upper = self.cards.iter().map(|card| card.value()).max();
            (lower.unwrap_or(0), upper.unwrap_or(0))
        };
        if demand_total > n {
            let (lower, upper) = span();
            return Err(Conflict::DemandExceedsSupport {
                lower,
                upper,
                demand: demand_total,
                supported: n,
            }
            .into());
        }
        if self.closed && capacity_total < n {
            let (lower, upper) = span();
            return Err(Conflict::HallIntervalOverflow { lower, upper }.into());
        }

        Ok(change)
    }
}

impl<Var: IntegerVariable + 'static, C: Cardinality> Propagator for GccBoundsPropagator<Var, C> {
    fn name(&self) -> &str {
        "GccBounds"
    }

    fn initialise_at_root(
        &mut self,
        context: &mut PropagatorInitialisationContext,
    ) -> Result<(), Inconsistency> {
        for (i, var) in self.vars.iter().enumerate() {
            context.register(var.clone(), DomainEvents::BOUNDS, LocalId::from(i as u32));
        }
        for (j, card) in self.cards.iter().enumerate() {
            let local_id = LocalId::from((self.vars.len() + j) as u32);
            card.register(context, DomainEvents::BOUNDS, local_id);
        }
        Ok(())
    }

    fn propagate(
        &mut self,
        mut context: PropagationContextMut,
        delta: ModificationEvent,
    ) -> PropagationStatus {
        if self.cards.is_empty() {
            return Ok(PropagationOutcome::Subsumed);
        }
        if !delta.has_changed() {
            return Ok(PropagationOutcome::AtFixpoint);
        }

        let mut change = ModificationEvent::None;
        if !self.initial_pruning_done {
            change = change.join(initial_prune(
                &mut context,
                &self.vars,
                &mut self.cards,
                &self.card_index,
                self.closed,
            )?);
            self.initial_pruning_done = true;
        }

        if C::IS_VARIABLE {
            change = change.join(self.prune_cardinalities(&mut context)?);
        }

        if let Some(outcome) = check_subsumption(&mut context, &self.vars, &mut self.cards)? {
            return Ok(outcome);
        }

        let upper_sums = self.build_upper_sums(&context);
        change = change.join(self.engine.prepare(&mut context, &self.vars, &upper_sums)?);
        change = change.join(self.engine.filter_lower_bounds(
            &mut context,
            &self.vars,
            &upper_sums,
        )?);
        change = change.join(self.engine.filter_upper_bounds(
            &mut context,
            &self.vars,
            &upper_sums,
        )?);

        if !self.skip_demand_filtering(&context) {
            let lower_sums = if C::IS_VARIABLE {
                self.build_lower_sums(&context)
            } else {
                match self.lower_sums.take() {
                    Some(sums) => sums,
                    None => self.build_lower_sums(&context),
                }
            };
            change = change.join(self.engine.filter_demand(
                &mut context,
                &self.vars,
                &lower_sums,
            )?);
            if !C::IS_VARIABLE {
                self.lower_sums = Some(lower_sums);
            }
        }

        if C::IS_VARIABLE && !self.all_cardinalities_fixed(&context) {
            change = change.join(self.prune_cardinalities(&mut context)?);
        }

        if let Some(outcome) = check_subsumption(&mut context, &self.vars, &mut self.cards)? {
            return Ok(outcome);
        }
        if change.has_changed() {
            trace!("global cardinality bounds pass changed domains; rescheduling");
            Ok(PropagationOutcome::NotAtFixpoint)
        } else {
            Ok(PropagationOutcome::AtFixpoint)
        }
    }

    fn cost(&self, _context: PropagationContext, _delta: ModificationEvent) -> PropagationCost {
        PropagationCost::LinearLow
    }

    fn priority(&self) -> u32 {
        2
    }

    fn boxed_clone(&self) -> Box<dyn Propagator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_solver::TestSolver;
    use crate::engine::variables::DomainId;
    use crate::propagators::global_cardinality::FixedCardinality;
    use crate::propagators::global_cardinality::Occurrence;
    use crate::propagators::global_cardinality::VariableCardinality;

    fn fixed(cards: &[(i32, i32, i32)]) -> Box<[FixedCardinality]> {
        cards
            .iter()
            .map(|&(value, min, max)| FixedCardinality::new(Occurrence::between(value, min, max)))
            .collect()
    }

    fn all_different(values: &[i32]) -> Box<[FixedCardinality]> {
        values
            .iter()
            .map(|&value| FixedCardinality::new(Occurrence::exactly(value, 1)))
            .collect()
    }

    #[test]
    fn a_permutation_without_hall_intervals_is_left_untouched() {
        let mut solver = TestSolver::default();
        let vars: Vec<DomainId> = (0..3).map(|_| solver.new_variable(1, 3)).collect();

        let propagator = solver
            .new_propagator(GccBoundsPropagator::new(
                vars.clone().into(),
                all_different(&[1, 2, 3]),
                false,
            ))
            .expect("posting succeeds");
        let outcome = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        assert_eq!(outcome, PropagationOutcome::AtFixpoint);
        for var in vars {
            solver.assert_bounds(var, 1, 3);
        }
    }

    #[test]
    fn a_hall_interval_raises_the_outside_minimum() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);
        let x2 = solver.new_variable(1, 3);

        let propagator = solver
            .new_propagator(GccBoundsPropagator::new(
                [x0, x1, x2].into(),
                all_different(&[1, 2, 3]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        solver.assert_bounds(x2, 3, 3);
        solver.assert_bounds(x0, 1, 2);
        solver.assert_bounds(x1, 1, 2);
    }

    #[test]
    fn a_hall_interval_lowers_the_outside_maximum() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(2, 3);
        let x1 = solver.new_variable(2, 3);
        let x2 = solver.new_variable(1, 3);

        let propagator = solver
            .new_propagator(GccBoundsPropagator::new(
                [x0, x1, x2].into(),
                all_different(&[1, 2, 3]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        solver.assert_bounds(x2, 1, 1);
    }

    #[test]
    fn loose_cardinalities_reach_a_fixpoint_without_pruning() {
        let mut solver = TestSolver::default();
        let vars: Vec<DomainId> = (0..3).map(|_| solver.new_variable(1, 2)).collect();

        let propagator = solver
            .new_propagator(GccBoundsPropagator::new(
                vars.clone().into(),
                fixed(&[(1, 1, 3), (2, 1, 3)]),
                false,
            ))
            .expect("posting succeeds");
        let outcome = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        assert_eq!(outcome, PropagationOutcome::AtFixpoint);
        for var in vars {
            solver.assert_bounds(var, 1, 2);
        }
    }

    #[test]
    fn insufficient_capacity_for_the_variables_fails() {
        let mut solver = TestSolver::default();
        let vars: Vec<DomainId> = (0..3).map(|_| solver.new_variable(1, 2)).collect();

        let propagator = solver
            .new_propagator(GccBoundsPropagator::new(
                vars.into(),
                fixed(&[(1, 0, 1), (2, 0, 1)]),
                false,
            ))
            .expect("posting succeeds");

        assert!(solver.propagate(propagator).is_err());
    }

    #[test]
    fn a_tight_demand_interval_clamps_the_reaching_variables() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 4);
        let x1 = solver.new_variable(1, 4);
        let x2 = solver.new_variable(3, 4);

        let propagator = solver
            .new_propagator(GccBoundsPropagator::new(
                [x0, x1, x2].into(),
                fixed(&[(1, 1, 3), (2, 1, 3)]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        solver.assert_bounds(x0, 1, 2);
        solver.assert_bounds(x1, 1, 2);
        solver.assert_bounds(x2, 3, 4);
    }

    #[test]
    fn unsatisfiable_demand_fails() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);
        let x2 = solver.new_variable(1, 4);

        let propagator = solver
            .new_propagator(GccBoundsPropagator::new(
                [x0, x1, x2].into(),
                fixed(&[(3, 1, 2), (4, 1, 2)]),
                false,
            ))
            .expect("posting succeeds");

        assert!(solver.propagate(propagator).is_err());
    }

    #[test]
    fn zero_capacity_values_are_removed_everywhere() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 3);
        let x1 = solver.new_variable(1, 3);

        let propagator = solver
            .new_propagator(GccBoundsPropagator::new(
                [x0, x1].into(),
                fixed(&[(2, 0, 0)]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        assert!(!solver.contains(x0, 2));
        assert!(!solver.contains(x1, 2));
    }

    #[test]
    fn count_variables_are_tightened_to_the_supported_range() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);
        let x2 = solver.new_variable(4, 5);
        let x3 = solver.new_variable(4, 5);
        let counts: Vec<DomainId> = (0..5).map(|_| solver.new_variable(0, 4)).collect();

        let cards: Box<[VariableCardinality<DomainId>]> = counts
            .iter()
            .enumerate()
            .map(|(index, &count)| VariableCardinality::new(index as i32 + 1, count))
            .collect();
        let propagator = solver
            .new_propagator(GccBoundsPropagator::new(
                [x0, x1, x2, x3].into(),
                cards,
                false,
            ))
            .expect("posting succeeds");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        solver.assert_bounds(counts[0], 0, 2);
        solver.assert_bounds(counts[1], 0, 2);
        solver.assert_bounds(counts[2], 0, 0);
        solver.assert_bounds(counts[3], 0, 2);
        solver.assert_bounds(counts[4], 0, 2);
    }

    #[test]
    fn external_bound_changes_are_picked_up_incrementally() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 3);
        let x1 = solver.new_variable(1, 3);
        let x2 = solver.new_variable(1, 3);

        let propagator = solver
            .new_propagator(GccBoundsPropagator::new(
                [x0, x1, x2].into(),
                all_different(&[1, 2, 3]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        solver.set_lower_bound(x0, 3).expect("within the domain");
        solver.set_upper_bound(x1, 2).expect("within the domain");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("still feasible");

        solver.assert_bounds(x2, 1, 2);
    }

    #[test]
    fn a_second_run_at_the_fixpoint_changes_nothing() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);
        let x2 = solver.new_variable(1, 3);

        let propagator = solver
            .new_propagator(GccBoundsPropagator::new(
                [x0, x1, x2].into(),
                all_different(&[1, 2, 3]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        let outcome = solver
            .propagate_with_delta(propagator, ModificationEvent::Assigned)
            .expect("feasible");
        assert_eq!(outcome, PropagationOutcome::AtFixpoint);
        solver.assert_bounds(x2, 3, 3);
    }

    #[test]
    fn assigned_variables_with_consistent_counts_are_subsumed() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 1);
        let x1 = solver.new_variable(1, 1);
        let x2 = solver.new_variable(3, 3);

        let propagator = solver
            .new_propagator(GccBoundsPropagator::new(
                [x0, x1, x2].into(),
                fixed(&[(1, 2, 2), (3, 0, 1)]),
                false,
            ))
            .expect("posting succeeds");

        assert_eq!(
            solver.propagate(propagator),
            Ok(PropagationOutcome::Subsumed)
        );
    }
}
