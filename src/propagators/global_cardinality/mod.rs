//! Propagators for the global cardinality constraint: given variables `x` and cardinalities
//! `(value, min, max)`, every value must be taken at least `min` and at most `max` times across
//! `x`. Three variants of increasing strength are provided:
//!
//! - [`GccValuePropagator`]: value consistency; saturated values are removed elsewhere and
//!   exactly-supported values are forced.
//! - [`GccBoundsPropagator`]: bounds consistency through Hall-interval filtering over capacity
//!   partial sums.
//! - [`GccDomainPropagator`]: domain consistency through a b-matching and strongly-connected
//!   component analysis of the variable-value graph.
mod bounds_consistent;
mod domain_consistent;
mod hall_intervals;
mod occurrence;
mod partial_sum;
mod value_consistent;
mod var_value_graph;

pub(crate) use bounds_consistent::GccBoundsPropagator;
pub(crate) use domain_consistent::GccDomainPropagator;
pub use occurrence::Occurrence;
pub(crate) use occurrence::Cardinality;
pub(crate) use occurrence::FixedCardinality;
pub(crate) use occurrence::VariableCardinality;
pub(crate) use value_consistent::GccValuePropagator;

use fnv::FnvHashMap;

use crate::basic_types::Inconsistency;
use crate::basic_types::PropagationOutcome;
use crate::engine::propagation::PropagationContextMut;
use crate::engine::propagation::ReadDomains;
use crate::engine::variables::IntegerVariable;
use crate::engine::ModificationEvent;

/// Value to cardinality-slot lookup shared by the propagator variants.
fn card_positions<C: Cardinality>(cards: &[C]) -> FnvHashMap<i32, usize> {
    cards
        .iter()
        .enumerate()
        .map(|(slot, card)| (card.value(), slot))
        .collect()
}

/// Count how many variables are assigned to `value` and how many still have it in their domain.
fn count_occurrences<Var: IntegerVariable>(
    context: &PropagationContextMut<'_>,
    vars: &[Var],
    value: i32,
) -> (i32, i32) {
    let mut forced = 0;
    let mut possible = 0;
    for var in vars {
        if context.contains(var, value) {
            possible += 1;
            if context.is_fixed(var) {
                forced += 1;
            }
        }
    }
    (forced, possible)
}

/// One-time pruning performed on the first propagation: clamp variable-backed counts to
/// `[0, n]`, remove values outside the cardinality list when the constraint is `closed`, and
/// remove values whose cardinality already rules them out entirely.
fn initial_prune<Var: IntegerVariable, C: Cardinality>(
    context: &mut PropagationContextMut<'_>,
    vars: &[Var],
    cards: &mut [C],
    card_index: &FnvHashMap<i32, usize>,
    closed: bool,
) -> Result<ModificationEvent, Inconsistency> {
    let mut change = ModificationEvent::None;

    if C::IS_VARIABLE {
        for card in cards.iter() {
            change = change.join(card.require_at_least(context.assignments, 0)?);
            change = change.join(card.require_at_most(context.assignments, vars.len() as i32)?);
        }
    }

    if closed {
        for var in vars {
            let unlisted: Vec<i32> = context
                .iterate_domain(var)
                .filter(|value| !card_index.contains_key(value))
                .collect();
            for value in unlisted {
                change = change.join(context.remove(var, value)?);
            }
        }
    }

    for slot in 0..cards.len() {
        if cards[slot].max(context.assignments) == 0 {
            let value = cards[slot].value();
            for var in vars {
                change = change.join(context.remove(var, value)?);
            }
        }
    }

    Ok(change)
}

/// When every variable is assigned, refresh the counters, propagate them into the
/// cardinalities (which fails on any count outside its admissible range and fixes
/// variable-backed counts), and report subsumption.
fn check_subsumption<Var: IntegerVariable, C: Cardinality>(
    context: &mut PropagationContextMut<'_>,
    vars: &[Var],
    cards: &mut [C],
) -> Result<Option<PropagationOutcome>, Inconsistency> {
    if !vars.iter().all(|var| context.is_fixed(var)) {
        return Ok(None);
    }

    for slot in 0..cards.len() {
        let value = cards[slot].value();
        let (forced, _) = count_occurrences(context, vars, value);
        cards[slot].set_counter(forced);
        let counter = cards[slot].counter();
        let _ = cards[slot].require_at_least(context.assignments, counter)?;
        let _ = cards[slot].require_at_most(context.assignments, counter)?;
    }

    Ok(Some(PropagationOutcome::Subsumed))
}

#[cfg(test)]
mod tests {
    //! The variants form a strength order: every pruning made by the value-consistent variant
    //! is made by the bounds-consistent one, and every pruning made by the bounds-consistent
    //! variant is made by the domain-consistent one.
    use super::*;
    use crate::engine::test_solver::TestSolver;
    use crate::engine::variables::DomainId;

    fn solver_with_three_vars(domains: [(i32, i32); 3]) -> (TestSolver, Vec<DomainId>) {
        let mut solver = TestSolver::default();
        let vars = domains
            .iter()
            .map(|&(lb, ub)| solver.new_variable(lb, ub))
            .collect();
        (solver, vars)
    }

    fn capped(values: &[i32]) -> Box<[FixedCardinality]> {
        values
            .iter()
            .map(|&value| FixedCardinality::new(Occurrence::between(value, 0, 1)))
            .collect()
    }

    #[test]
    fn bounds_consistency_catches_the_hall_interval_value_consistency_misses() {
        let domains = [(1, 2), (1, 2), (1, 3)];

        let (mut solver, vars) = solver_with_three_vars(domains);
        let value = solver
            .new_propagator(GccValuePropagator::new(
                vars.clone().into(),
                capped(&[1, 2, 3]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver.propagate_until_fixed_point(value).expect("feasible");
        solver.assert_bounds(vars[2], 1, 3);

        let (mut solver, vars) = solver_with_three_vars(domains);
        let bounds = solver
            .new_propagator(GccBoundsPropagator::new(
                vars.clone().into(),
                capped(&[1, 2, 3]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver.propagate_until_fixed_point(bounds).expect("feasible");
        solver.assert_bounds(vars[2], 3, 3);

        let (mut solver, vars) = solver_with_three_vars(domains);
        let domain = solver
            .new_propagator(GccDomainPropagator::new(
                vars.clone().into(),
                capped(&[1, 2, 3]),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver.propagate_until_fixed_point(domain).expect("feasible");
        solver.assert_bounds(vars[2], 3, 3);
    }

    #[test]
    fn domain_consistency_catches_the_hole_bounds_consistency_misses() {
        let cards = [(1, 1, 1), (2, 0, 1), (3, 1, 1)];
        let fixed = |cards: &[(i32, i32, i32)]| -> Box<[FixedCardinality]> {
            cards
                .iter()
                .map(|&(value, min, max)| {
                    FixedCardinality::new(Occurrence::between(value, min, max))
                })
                .collect()
        };
        let with_holes = |solver: &mut TestSolver| -> Vec<DomainId> {
            let vars: Vec<DomainId> = (0..3).map(|_| solver.new_variable(1, 3)).collect();
            solver.remove(vars[0], 2).expect("value present");
            solver.remove(vars[1], 2).expect("value present");
            vars
        };

        let mut solver = TestSolver::default();
        let vars = with_holes(&mut solver);
        let bounds = solver
            .new_propagator(GccBoundsPropagator::new(
                vars.clone().into(),
                fixed(&cards),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver.propagate_until_fixed_point(bounds).expect("feasible");
        // the holes are invisible to the variable ranges
        assert_eq!(solver.domain_values(vars[2]), vec![1, 2, 3]);

        let mut solver = TestSolver::default();
        let vars = with_holes(&mut solver);
        let domain = solver
            .new_propagator(GccDomainPropagator::new(
                vars.clone().into(),
                fixed(&cards),
                false,
            ))
            .expect("posting succeeds");
        let _ = solver.propagate_until_fixed_point(domain).expect("feasible");
        assert_eq!(solver.domain_values(vars[2]), vec![2]);
    }
}
