use crate::basic_types::Conflict;
use crate::basic_types::Inconsistency;
use crate::engine::propagation::LocalId;
use crate::engine::propagation::PropagatorInitialisationContext;
use crate::engine::variables::IntegerVariable;
use crate::engine::Assignments;
use crate::engine::DomainEvents;
use crate::engine::ModificationEvent;

/// A `(value, min, max)` triple stating how often `value` may be taken across a sequence of
/// variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Occurrence {
    pub value: i32,
    pub min: i32,
    pub max: i32,
}

impl Occurrence {
    /// An occurrence which must be taken exactly `count` times.
    pub fn exactly(value: i32, count: i32) -> Occurrence {
        Occurrence {
            value,
            min: count,
            max: count,
        }
    }

    /// An occurrence which may be taken between `min` and `max` times.
    pub fn between(value: i32, min: i32, max: i32) -> Occurrence {
        Occurrence { value, min, max }
    }
}

/// One cardinality entry of a global cardinality constraint: a value together with a (possibly
/// variable) range of admissible occurrence counts and a counter of the occurrences accounted so
/// far.
///
/// The propagators are generic over this trait so that the fixed-count and the counting-variable
/// forms of the constraint share one implementation; [`Cardinality::IS_VARIABLE`] tells the
/// propagator whether count bounds can move between propagations.
pub(crate) trait Cardinality: Clone + std::fmt::Debug + 'static {
    /// Whether the count bounds are backed by a variable and can change between propagations.
    const IS_VARIABLE: bool;

    fn value(&self) -> i32;

    /// The smallest admissible number of occurrences.
    fn min(&self, assignments: &Assignments) -> i32;

    /// The largest admissible number of occurrences.
    fn max(&self, assignments: &Assignments) -> i32;

    fn is_fixed(&self, assignments: &Assignments) -> bool {
        self.min(assignments) == self.max(assignments)
    }

    /// The number of variables currently assigned to [`Cardinality::value`], as refreshed by the
    /// owning propagator.
    fn counter(&self) -> i32;

    fn set_counter(&mut self, counter: i32);

    /// Require at least `bound` occurrences.
    fn require_at_least(
        &self,
        assignments: &mut Assignments,
        bound: i32,
    ) -> Result<ModificationEvent, Inconsistency>;

    /// Allow at most `bound` occurrences.
    fn require_at_most(
        &self,
        assignments: &mut Assignments,
        bound: i32,
    ) -> Result<ModificationEvent, Inconsistency>;

    /// Subscribe the owning propagator to changes of the count bounds; a no-op for fixed
    /// counts.
    fn register(
        &self,
        context: &mut PropagatorInitialisationContext,
        events: DomainEvents,
        local_id: LocalId,
    );
}

/// A cardinality whose admissible range is known at posting time.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FixedCardinality {
    value: i32,
    min: i32,
    max: i32,
    counter: i32,
}

impl FixedCardinality {
    pub(crate) fn new(occurrence: Occurrence) -> FixedCardinality {
        FixedCardinality {
            value: occurrence.value,
            min: occurrence.min,
            max: occurrence.max,
            counter: 0,
        }
    }
}

impl Cardinality for FixedCardinality {
    const IS_VARIABLE: bool = false;

    fn value(&self) -> i32 {
        self.value
    }

    fn min(&self, _assignments: &Assignments) -> i32 {
        self.min
    }

    fn max(&self, _assignments: &Assignments) -> i32 {
        self.max
    }

    fn counter(&self) -> i32 {
        self.counter
    }

    fn set_counter(&mut self, counter: i32) {
        self.counter = counter;
    }

    fn require_at_least(
        &self,
        _assignments: &mut Assignments,
        bound: i32,
    ) -> Result<ModificationEvent, Inconsistency> {
        if bound > self.max {
            return Err(Conflict::CapacityExceeded {
                value: self.value,
                forced: bound,
                available: self.max,
            }
            .into());
        }
        Ok(ModificationEvent::None)
    }

    fn require_at_most(
        &self,
        _assignments: &mut Assignments,
        bound: i32,
    ) -> Result<ModificationEvent, Inconsistency> {
        if bound < self.min {
            return Err(Conflict::CapacityShortage {
                value: self.value,
                required: self.min,
                supported: bound,
            }
            .into());
        }
        Ok(ModificationEvent::None)
    }

    fn register(
        &self,
        _context: &mut PropagatorInitialisationContext,
        _events: DomainEvents,
        _local_id: LocalId,
    ) {
    }
}

/// A cardinality whose admissible range is the domain of an integer variable. Tightening the
/// range prunes the variable, and the variable shrinking re-schedules the propagator.
#[derive(Clone, Debug)]
pub(crate) struct VariableCardinality<Var> {
    value: i32,
    count: Var,
    counter: i32,
}

impl<Var: IntegerVariable> VariableCardinality<Var> {
    pub(crate) fn new(value: i32, count: Var) -> VariableCardinality<Var> {
        VariableCardinality {
            value,
            count,
            counter: 0,
        }
    }
}

impl<Var: IntegerVariable + 'static> Cardinality for VariableCardinality<Var> {
    const IS_VARIABLE: bool = true;

    fn value(&self) -> i32 {
        self.value
    }

    fn min(&self, assignments: &Assignments) -> i32 {
        self.count.lower_bound(assignments)
    }

    fn max(&self, assignments: &Assignments) -> i32 {
        self.count.upper_bound(assignments)
    }

    fn counter(&self) -> i32 {
        self.counter
    }

    fn set_counter(&mut self, counter: i32) {
        self.counter = counter;
    }

    fn require_at_least(
        &self,
        assignments: &mut Assignments,
        bound: i32,
    ) -> Result<ModificationEvent, Inconsistency> {
        Ok(self.count.set_lower_bound(assignments, bound)?)
    }

    fn require_at_most(
        &self,
        assignments: &mut Assignments,
        bound: i32,
    ) -> Result<ModificationEvent, Inconsistency> {
        Ok(self.count.set_upper_bound(assignments, bound)?)
    }

    fn register(
        &self,
        context: &mut PropagatorInitialisationContext,
        events: DomainEvents,
        local_id: LocalId,
    ) {
        context.register(self.count.clone(), events, local_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::Conflict;
    use crate::engine::variables::DomainId;

    #[test]
    fn fixed_cardinalities_reject_counts_outside_their_range() {
        let mut assignments = Assignments::default();
        let card = FixedCardinality::new(Occurrence::between(7, 1, 2));

        assert_eq!(
            card.require_at_least(&mut assignments, 2),
            Ok(ModificationEvent::None)
        );
        assert_eq!(
            card.require_at_least(&mut assignments, 3),
            Err(Conflict::CapacityExceeded {
                value: 7,
                forced: 3,
                available: 2
            }
            .into())
        );
        assert_eq!(
            card.require_at_most(&mut assignments, 0),
            Err(Conflict::CapacityShortage {
                value: 7,
                required: 1,
                supported: 0
            }
            .into())
        );
    }

    #[test]
    fn variable_cardinalities_tighten_their_count_variable() {
        let mut assignments = Assignments::default();
        let count: DomainId = assignments.grow(0, 5);
        let card = VariableCardinality::new(3, count);

        assert_eq!(card.min(&assignments), 0);
        assert_eq!(card.max(&assignments), 5);

        let event = card.require_at_least(&mut assignments, 2).unwrap();
        assert_eq!(event, ModificationEvent::Bounds);
        assert_eq!(card.min(&assignments), 2);

        let event = card.require_at_most(&mut assignments, 2).unwrap();
        assert_eq!(event, ModificationEvent::Assigned);
        assert!(card.is_fixed(&assignments));
    }
}
