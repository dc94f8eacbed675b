use enumset::EnumSet;

use crate::engine::Assignments;
use crate::engine::EmptyDomain;
use crate::engine::IntDomainEvent;
use crate::engine::ModificationEvent;
use crate::engine::Watchers;

/// A variable over the integers, the seam between propagators and the domain store.
///
/// Reads take the [`Assignments`]; mutators take it mutably and report the produced
/// [`ModificationEvent`], or [`EmptyDomain`] when the change would wipe out the domain.
pub trait IntegerVariable: Clone + std::fmt::Debug {
    fn lower_bound(&self, assignments: &Assignments) -> i32;

    fn upper_bound(&self, assignments: &Assignments) -> i32;

    /// The number of values currently in the domain.
    fn size(&self, assignments: &Assignments) -> usize;

    fn contains(&self, assignments: &Assignments, value: i32) -> bool;

    /// Iterate the values of the domain in ascending order.
    fn iterate_domain(&self, assignments: &Assignments) -> impl Iterator<Item = i32>;

    /// Require the variable to be at least `bound`.
    fn set_lower_bound(
        &self,
        assignments: &mut Assignments,
        bound: i32,
    ) -> Result<ModificationEvent, EmptyDomain>;

    /// Require the variable to be at most `bound`.
    fn set_upper_bound(
        &self,
        assignments: &mut Assignments,
        bound: i32,
    ) -> Result<ModificationEvent, EmptyDomain>;

    /// Remove `value` from the domain.
    fn remove(
        &self,
        assignments: &mut Assignments,
        value: i32,
    ) -> Result<ModificationEvent, EmptyDomain>;

    /// Fix the variable to `value`.
    fn assign(
        &self,
        assignments: &mut Assignments,
        value: i32,
    ) -> Result<ModificationEvent, EmptyDomain>;

    /// Subscribe to the given events on this variable.
    fn watch_all(&self, watchers: &mut Watchers<'_>, events: EnumSet<IntDomainEvent>);
}
