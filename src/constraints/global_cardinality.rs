use log::debug;
use thiserror::Error;

use crate::engine::propagation::Propagator;
use crate::engine::variables::IntegerVariable;
use crate::propagators::global_cardinality::FixedCardinality;
use crate::propagators::global_cardinality::GccBoundsPropagator;
use crate::propagators::global_cardinality::GccDomainPropagator;
use crate::propagators::global_cardinality::GccValuePropagator;
use crate::propagators::global_cardinality::Occurrence;
use crate::propagators::global_cardinality::VariableCardinality;

/// The strength of the filtering performed for a global cardinality constraint. Stronger levels
/// prune more but cost more per propagation: every pruning made by [`ConsistencyLevel::Value`]
/// is also made by [`ConsistencyLevel::Bounds`], and every pruning made by
/// [`ConsistencyLevel::Bounds`] is also made by [`ConsistencyLevel::Domain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsistencyLevel {
    /// Value consistency: saturation and exact-support reasoning per value.
    Value,
    /// Bounds consistency: Hall-interval reasoning on the variable bounds.
    Bounds,
    /// Domain consistency: matching-based reasoning over the full domains.
    Domain,
}

/// Errors detected when posting a global cardinality constraint.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostError {
    /// A value appears in more than one cardinality.
    #[error("value {0} appears more than once in the cardinality list")]
    DuplicateValue(i32),
    /// A cardinality admits no occurrence count at all.
    #[error("the occurrence range {min}..={max} of value {value} is empty or negative")]
    InvalidRange { value: i32, min: i32, max: i32 },
    /// The summed lower cardinalities exceed the number of variables.
    #[error("the cardinalities require {demand} occurrences but only {variables} variables exist")]
    ExcessDemand { demand: i64, variables: usize },
    /// The summed upper cardinalities of a closed constraint cannot cover all variables.
    #[error("a closed constraint over {variables} variables admits only {capacity} occurrences")]
    InsufficientCapacity { capacity: i64, variables: usize },
}

/// Creates the [global cardinality constraint](https://sofdem.github.io/gccat/gccat/Cglobal_cardinality.html),
/// which restricts, for each `(value, min, max)` occurrence, how often `value` is taken across
/// `vars`.
///
/// With `closed` set, the variables may additionally only take values that appear in the
/// occurrence list. An empty occurrence list makes the constraint trivially satisfied.
pub fn global_cardinality<Var: IntegerVariable + 'static>(
    vars: impl Into<Box<[Var]>>,
    cardinalities: impl Into<Box<[Occurrence]>>,
    level: ConsistencyLevel,
    closed: bool,
) -> Result<Box<dyn Propagator>, PostError> {
    let vars = vars.into();
    let cardinalities = cardinalities.into();

    check_distinct_values(cardinalities.iter().map(|occurrence| occurrence.value))?;
    for occurrence in cardinalities.iter() {
        if occurrence.min < 0 || occurrence.max < occurrence.min {
            return Err(PostError::InvalidRange {
                value: occurrence.value,
                min: occurrence.min,
                max: occurrence.max,
            });
        }
    }
    if !cardinalities.is_empty() {
        let demand: i64 = cardinalities
            .iter()
            .map(|occurrence| occurrence.min as i64)
            .sum();
        if demand > vars.len() as i64 {
            return Err(PostError::ExcessDemand {
                demand,
                variables: vars.len(),
            });
        }
        let capacity: i64 = cardinalities
            .iter()
            .map(|occurrence| occurrence.max as i64)
            .sum();
        if closed && capacity < vars.len() as i64 {
            return Err(PostError::InsufficientCapacity {
                capacity,
                variables: vars.len(),
            });
        }
    }

    let cards: Box<[FixedCardinality]> = cardinalities
        .iter()
        .copied()
        .map(FixedCardinality::new)
        .collect();
    debug!(
        "posting global cardinality over {} variables and {} values at {level:?} consistency",
        vars.len(),
        cards.len()
    );
    Ok(match level {
        ConsistencyLevel::Value => Box::new(GccValuePropagator::new(vars, cards, closed)),
        ConsistencyLevel::Bounds => Box::new(GccBoundsPropagator::new(vars, cards, closed)),
        ConsistencyLevel::Domain => Box::new(GccDomainPropagator::new(vars, cards, closed)),
    })
}

/// The form of [`global_cardinality`] in which the occurrence counts are themselves variables:
/// for each `(value, count)` pair, `count` equals the number of variables taking `value`. The
/// propagators tighten the count variables as well as the `vars`.
pub fn global_cardinality_with_counts<Var: IntegerVariable + 'static>(
    vars: impl Into<Box<[Var]>>,
    counts: impl Into<Box<[(i32, Var)]>>,
    level: ConsistencyLevel,
    closed: bool,
) -> Result<Box<dyn Propagator>, PostError> {
    let vars = vars.into();
    let counts = counts.into();

    check_distinct_values(counts.iter().map(|(value, _)| *value))?;

    let cards: Box<[VariableCardinality<Var>]> = counts
        .iter()
        .map(|(value, count)| VariableCardinality::new(*value, count.clone()))
        .collect();
    debug!(
        "posting global cardinality over {} variables and {} count variables at {level:?} consistency",
        vars.len(),
        cards.len()
    );
    Ok(match level {
        ConsistencyLevel::Value => Box::new(GccValuePropagator::new(vars, cards, closed)),
        ConsistencyLevel::Bounds => Box::new(GccBoundsPropagator::new(vars, cards, closed)),
        ConsistencyLevel::Domain => Box::new(GccDomainPropagator::new(vars, cards, closed)),
    })
}

fn check_distinct_values(values: impl Iterator<Item = i32>) -> Result<(), PostError> {
    let mut seen = Vec::new();
    for value in values {
        if seen.contains(&value) {
            return Err(PostError::DuplicateValue(value));
        }
        seen.push(value);
    }
    Ok(())
}
