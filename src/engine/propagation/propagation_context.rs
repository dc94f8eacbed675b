use crate::engine::variables::IntegerVariable;
use crate::engine::Assignments;
use crate::engine::EmptyDomain;
use crate::engine::ModificationEvent;

/// [`PropagationContext`] is passed to propagators during propagation. It may be queried to
/// retrieve information about the current variable domains such as the lower-bound of a
/// particular variable.
#[derive(Clone, Copy, Debug)]
pub struct PropagationContext<'a> {
    pub assignments: &'a Assignments,
}

impl<'a> PropagationContext<'a> {
    pub fn new(assignments: &'a Assignments) -> Self {
        PropagationContext { assignments }
    }
}

/// The mutable variant of [`PropagationContext`]; the only point of communication between a
/// propagator and the domain store during propagation. All mutators report the produced
/// [`ModificationEvent`] so that the propagator can decide whether it is at fixpoint.
#[derive(Debug)]
pub struct PropagationContextMut<'a> {
    pub assignments: &'a mut Assignments,
}

impl<'a> PropagationContextMut<'a> {
    pub fn new(assignments: &'a mut Assignments) -> Self {
        PropagationContextMut { assignments }
    }

    pub fn as_readonly(&self) -> PropagationContext<'_> {
        PropagationContext {
            assignments: self.assignments,
        }
    }

    pub fn set_lower_bound<Var: IntegerVariable>(
        &mut self,
        var: &Var,
        bound: i32,
    ) -> Result<ModificationEvent, EmptyDomain> {
        var.set_lower_bound(self.assignments, bound)
    }

    pub fn set_upper_bound<Var: IntegerVariable>(
        &mut self,
        var: &Var,
        bound: i32,
    ) -> Result<ModificationEvent, EmptyDomain> {
        var.set_upper_bound(self.assignments, bound)
    }

    pub fn remove<Var: IntegerVariable>(
        &mut self,
        var: &Var,
        value: i32,
    ) -> Result<ModificationEvent, EmptyDomain> {
        var.remove(self.assignments, value)
    }

    pub fn assign<Var: IntegerVariable>(
        &mut self,
        var: &Var,
        value: i32,
    ) -> Result<ModificationEvent, EmptyDomain> {
        var.assign(self.assignments, value)
    }
}

/// A trait which defines common methods for retrieving the [`Assignments`] from the structure
/// which implements this trait.
pub trait HasAssignments {
    /// Returns the stored [`Assignments`].
    fn assignments(&self) -> &Assignments;
}

mod private {
    use super::*;

    impl HasAssignments for PropagationContext<'_> {
        fn assignments(&self) -> &Assignments {
            self.assignments
        }
    }

    impl HasAssignments for PropagationContextMut<'_> {
        fn assignments(&self) -> &Assignments {
            self.assignments
        }
    }
}

pub trait ReadDomains: HasAssignments {
    /// Returns `true` if the domain of the given variable is singleton.
    fn is_fixed<Var: IntegerVariable>(&self, var: &Var) -> bool {
        self.lower_bound(var) == self.upper_bound(var)
    }

    fn lower_bound<Var: IntegerVariable>(&self, var: &Var) -> i32 {
        var.lower_bound(self.assignments())
    }

    fn upper_bound<Var: IntegerVariable>(&self, var: &Var) -> i32 {
        var.upper_bound(self.assignments())
    }

    fn size<Var: IntegerVariable>(&self, var: &Var) -> usize {
        var.size(self.assignments())
    }

    fn contains<Var: IntegerVariable>(&self, var: &Var, value: i32) -> bool {
        var.contains(self.assignments(), value)
    }

    fn iterate_domain<Var: IntegerVariable>(&self, var: &Var) -> impl Iterator<Item = i32> {
        var.iterate_domain(self.assignments())
    }
}

impl<T: HasAssignments> ReadDomains for T {}
