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
use crate::engine::Assignments;
use crate::engine::DomainEvents;
use crate::engine::ModificationEvent;
use crate::propagators::global_cardinality::card_positions;
use crate::propagators::global_cardinality::check_subsumption;
use crate::propagators::global_cardinality::count_occurrences;
use crate::propagators::global_cardinality::initial_prune;
use crate::propagators::global_cardinality::var_value_graph::VarValGraph;
use crate::propagators::global_cardinality::Cardinality;

/// Domain-consistent (generalised arc-consistent) propagator for the global cardinality
/// constraint, after Régin: maintain a b-matching on the variable-value graph which saturates
/// every variable and meets every lower cardinality, then remove the edges no maximum matching
/// can use, found through a strongly-connected-component analysis of the residual orientation.
///
/// The graph persists across propagations and is repaired incrementally; cloning the propagator
/// deep-copies it, so matchings are never shared between search branches.
#[derive(Clone, Debug)]
pub(crate) struct GccDomainPropagator<Var, C> {
    vars: Box<[Var]>,
    cards: Box<[C]>,
    card_index: FnvHashMap<i32, usize>,
    closed: bool,
    initial_pruning_done: bool,
    graph: VarValGraph,
}

impl<Var: IntegerVariable, C: Cardinality> GccDomainPropagator<Var, C> {
    pub(crate) fn new(vars: Box<[Var]>, cards: Box<[C]>, closed: bool) -> Self {
        let card_index = card_positions(&cards);
        GccDomainPropagator {
            vars,
            cards,
            card_index,
            closed,
            initial_pruning_done: false,
            graph: VarValGraph::default(),
        }
    }

    /// The usage range admitted for a value: its cardinality bounds when listed, otherwise
    /// unconstrained unless the constraint is closed.
    fn capacities<'a>(
        cards: &'a [C],
        card_index: &'a FnvHashMap<i32, usize>,
        assignments: &'a Assignments,
        closed: bool,
        n: i32,
    ) -> impl Fn(i32) -> (i32, i32) + 'a {
        let unlisted_max = if closed { 0 } else { n };
        move |value| match card_index.get(&value) {
            Some(&slot) => (
                cards[slot].min(assignments).max(0),
                cards[slot].max(assignments).max(0),
            ),
            None => (0, unlisted_max),
        }
    }
}

impl<Var: IntegerVariable + 'static, C: Cardinality> Propagator for GccDomainPropagator<Var, C> {
    fn name(&self) -> &str {
        "GccDomain"
    }

    fn initialise_at_root(
        &mut self,
        context: &mut PropagatorInitialisationContext,
    ) -> Result<(), Inconsistency> {
        for (i, var) in self.vars.iter().enumerate() {
            context.register(var.clone(), DomainEvents::ANY_INT, LocalId::from(i as u32));
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

        {
            let assignments = &*context.assignments;
            let capacities = Self::capacities(
                &self.cards,
                &self.card_index,
                assignments,
                self.closed,
                self.vars.len() as i32,
            );
            if self.graph.is_empty() {
                self.graph.build(
                    assignments,
                    &self.vars,
                    self.cards.iter().map(|card| card.value()),
                    capacities,
                );
            } else {
                self.graph.sync(assignments, &self.vars, capacities);
            }
        }

        if let Err(variable) = self.graph.repair_variable_matching() {
            return Err(Conflict::UnmatchableVariable { variable }.into());
        }
        if let Err((value, required, usage)) = self.graph.repair_demand_matching() {
            trace!("demand of value {value} is unreachable at usage {usage}");
            return Err(Conflict::CapacityShortage {
                value,
                required,
                supported: usage,
            }
            .into());
        }

        for (var, value) in self.graph.prune_inconsistent_edges() {
            change = change.join(context.remove(&self.vars[var], value)?);
        }

        if C::IS_VARIABLE {
            for slot in 0..self.cards.len() {
                let value = self.cards[slot].value();
                let (forced, possible) = count_occurrences(&context, &self.vars, value);
                self.cards[slot].set_counter(forced);
                change =
                    change.join(self.cards[slot].require_at_least(context.assignments, forced)?);
                change =
                    change.join(self.cards[slot].require_at_most(context.assignments, possible)?);
            }
        }

        if let Some(outcome) = check_subsumption(&mut context, &self.vars, &mut self.cards)? {
            return Ok(outcome);
        }
        if change.has_changed() && C::IS_VARIABLE {
            // tightened counts change the capacities the matching ran under
            Ok(PropagationOutcome::NotAtFixpoint)
        } else {
            Ok(PropagationOutcome::AtFixpoint)
        }
    }

    fn cost(&self, context: PropagationContext, _delta: ModificationEvent) -> PropagationCost {
        let n = self.vars.len() as i64;
        let largest_domain = self
            .vars
            .iter()
            .map(|var| context.size(var) as i64)
            .max()
            .unwrap_or(0);

        if largest_domain < 6 {
            PropagationCost::LinearLow
        } else if largest_domain < n / 2 {
            PropagationCost::LinearHigh
        } else if largest_domain < n * n {
            PropagationCost::QuadraticLow
        } else {
            PropagationCost::CubicHigh
        }
    }

    fn priority(&self) -> u32 {
        3
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
    fn a_permutation_keeps_all_domains() {
        let mut solver = TestSolver::default();
        let vars: Vec<DomainId> = (0..3).map(|_| solver.new_variable(1, 3)).collect();

        let propagator = solver
            .new_propagator(GccDomainPropagator::new(
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
            assert_eq!(solver.domain_values(var), vec![1, 2, 3]);
        }
    }

    #[test]
    fn the_unconstrained_variable_is_forced_out_of_a_saturated_block() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);
        let x2 = solver.new_variable(1, 3);

        let propagator = solver
            .new_propagator(GccDomainPropagator::new(
                [x0, x1, x2].into(),
                all_different(&[1, 2, 3]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        assert_eq!(solver.domain_values(x2), vec![3]);
    }

    #[test]
    fn loose_cardinalities_reach_a_fixpoint_without_pruning() {
        let mut solver = TestSolver::default();
        let vars: Vec<DomainId> = (0..3).map(|_| solver.new_variable(1, 2)).collect();

        let propagator = solver
            .new_propagator(GccDomainPropagator::new(
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
            assert_eq!(solver.domain_values(var), vec![1, 2]);
        }
    }

    #[test]
    fn insufficient_capacity_for_the_variables_fails() {
        let mut solver = TestSolver::default();
        let vars: Vec<DomainId> = (0..3).map(|_| solver.new_variable(1, 2)).collect();

        let propagator = solver
            .new_propagator(GccDomainPropagator::new(
                vars.into(),
                fixed(&[(1, 0, 1), (2, 0, 1)]),
                false,
            ))
            .expect("posting succeeds");
        let error = solver.propagate(propagator).expect_err("three variables, two slots");

        assert!(matches!(
            error,
            Inconsistency::Conflict(Conflict::UnmatchableVariable { .. })
        ));
    }

    #[test]
    fn values_without_matching_support_are_pruned() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 3);
        let x1 = solver.new_variable(1, 3);
        let x2 = solver.new_variable(1, 3);
        solver.remove(x0, 2).expect("value present");
        solver.remove(x1, 2).expect("value present");

        let propagator = solver
            .new_propagator(GccDomainPropagator::new(
                [x0, x1, x2].into(),
                fixed(&[(1, 2, 2), (2, 0, 1), (3, 1, 1)]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        // taking 2 would leave no variable for the required occurrence of 3
        assert_eq!(solver.domain_values(x2), vec![1, 3]);
    }

    #[test]
    fn a_required_value_nobody_supports_fails() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);

        let propagator = solver
            .new_propagator(GccDomainPropagator::new(
                [x0, x1].into(),
                fixed(&[(5, 1, 1)]),
                false,
            ))
            .expect("posting succeeds");
        let error = solver.propagate(propagator).expect_err("5 is unreachable");

        assert_eq!(
            error,
            Conflict::CapacityShortage {
                value: 5,
                required: 1,
                supported: 0
            }
            .into()
        );
    }

    #[test]
    fn matching_state_is_repaired_after_external_removals() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 3);
        let x1 = solver.new_variable(1, 3);
        let x2 = solver.new_variable(1, 3);

        let propagator = solver
            .new_propagator(GccDomainPropagator::new(
                [x0, x1, x2].into(),
                all_different(&[1, 2, 3]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        solver.remove(x0, 2).expect("value present");
        solver.remove(x1, 2).expect("value present");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("still feasible");

        assert_eq!(solver.domain_values(x2), vec![2]);
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
            .new_propagator(GccDomainPropagator::new(
                [x0, x1, x2, x3].into(),
                cards,
                false,
            ))
            .expect("posting succeeds");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        solver.assert_bounds(counts[0], 0, 2);
        solver.assert_bounds(counts[2], 0, 0);
        solver.assert_bounds(counts[4], 0, 2);
    }

    #[test]
    fn cloned_spaces_do_not_share_matching_state() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 3);
        let x1 = solver.new_variable(1, 3);
        let x2 = solver.new_variable(1, 3);

        let propagator = solver
            .new_propagator(GccDomainPropagator::new(
                [x0, x1, x2].into(),
                all_different(&[1, 2, 3]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver
            .propagate_until_fixed_point(propagator)
            .expect("feasible");

        let mut branch = solver.clone();
        branch.assign(x0, 3).expect("value present");
        branch.remove(x1, 1).expect("value present");
        let _ = branch
            .propagate_until_fixed_point(propagator)
            .expect("still feasible");

        assert_eq!(branch.domain_values(x1), vec![2]);
        assert_eq!(branch.domain_values(x2), vec![1]);
        // the original space is untouched and still propagates on its own
        for var in [x0, x1, x2] {
            assert_eq!(solver.domain_values(var), vec![1, 2, 3]);
        }
        let outcome = solver
            .propagate_with_delta(propagator, ModificationEvent::Assigned)
            .expect("feasible");
        assert_eq!(outcome, PropagationOutcome::AtFixpoint);
    }

    #[test]
    fn a_second_run_at_the_fixpoint_changes_nothing() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 2);
        let x1 = solver.new_variable(1, 2);
        let x2 = solver.new_variable(1, 3);

        let propagator = solver
            .new_propagator(GccDomainPropagator::new(
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
        assert_eq!(solver.domain_values(x2), vec![3]);
    }

    #[test]
    fn cost_is_tiered_by_the_largest_domain_size() {
        let tier = |variables: u32, width: i32| {
            let mut assignments = Assignments::default();
            let vars: Vec<DomainId> = (0..variables).map(|_| assignments.grow(1, width)).collect();
            let propagator =
                GccDomainPropagator::new(vars.into(), all_different(&[1]), false);
            propagator.cost(
                PropagationContext::new(&assignments),
                ModificationEvent::Assigned,
            )
        };

        assert_eq!(tier(3, 5), PropagationCost::LinearLow);
        assert_eq!(tier(20, 6), PropagationCost::LinearHigh);
        assert_eq!(tier(4, 6), PropagationCost::QuadraticLow);
        assert_eq!(tier(2, 6), PropagationCost::CubicHigh);
    }

    #[test]
    fn assigned_variables_with_inconsistent_counts_fail() {
        let mut solver = TestSolver::default();
        let x0 = solver.new_variable(1, 1);
        let x1 = solver.new_variable(1, 1);

        let propagator = solver
            .new_propagator(GccDomainPropagator::new(
                [x0, x1].into(),
                fixed(&[(1, 0, 1)]),
                false,
            ))
            .expect("posting succeeds");

        assert!(solver.propagate(propagator).is_err());
    }
}
