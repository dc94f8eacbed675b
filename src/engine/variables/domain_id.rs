use enumset::EnumSet;

use crate::containers::StorageKey;
use crate::engine::variables::IntegerVariable;
use crate::engine::Assignments;
use crate::engine::EmptyDomain;
use crate::engine::IntDomainEvent;
use crate::engine::ModificationEvent;
use crate::engine::Watchers;

/// A structure which represents the most basic [`IntegerVariable`]; it is simply the id which
/// links to a domain (hence the name).
#[derive(Clone, PartialEq, Eq, Copy, Hash)]
pub struct DomainId {
    id: u32,
}

impl DomainId {
    pub fn new(id: u32) -> Self {
        DomainId { id }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl IntegerVariable for DomainId {
    fn lower_bound(&self, assignments: &Assignments) -> i32 {
        assignments.get_lower_bound(*self)
    }

    fn upper_bound(&self, assignments: &Assignments) -> i32 {
        assignments.get_upper_bound(*self)
    }

    fn size(&self, assignments: &Assignments) -> usize {
        assignments.get_domain_size(*self)
    }

    fn contains(&self, assignments: &Assignments, value: i32) -> bool {
        assignments.is_value_in_domain(*self, value)
    }

    fn iterate_domain(&self, assignments: &Assignments) -> impl Iterator<Item = i32> {
        assignments.get_domain_iterator(*self)
    }

    fn set_lower_bound(
        &self,
        assignments: &mut Assignments,
        bound: i32,
    ) -> Result<ModificationEvent, EmptyDomain> {
        assignments.tighten_lower_bound(*self, bound)
    }

    fn set_upper_bound(
        &self,
        assignments: &mut Assignments,
        bound: i32,
    ) -> Result<ModificationEvent, EmptyDomain> {
        assignments.tighten_upper_bound(*self, bound)
    }

    fn remove(
        &self,
        assignments: &mut Assignments,
        value: i32,
    ) -> Result<ModificationEvent, EmptyDomain> {
        assignments.remove_value_from_domain(*self, value)
    }

    fn assign(
        &self,
        assignments: &mut Assignments,
        value: i32,
    ) -> Result<ModificationEvent, EmptyDomain> {
        assignments.make_assignment(*self, value)
    }

    fn watch_all(&self, watchers: &mut Watchers<'_>, events: EnumSet<IntDomainEvent>) {
        watchers.watch_all(*self, events);
    }
}

impl StorageKey for DomainId {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        DomainId { id: index as u32 }
    }
}

impl std::fmt::Display for DomainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{}", self.id)
    }
}

impl std::fmt::Debug for DomainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{}", self.id)
    }
}
