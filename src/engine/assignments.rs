use crate::containers::KeyedVec;
use crate::engine::variables::DomainId;
use crate::engine::IntDomainEvent;
use crate::tally_assert_moderate;

/// Returned by a domain mutator whose change would leave a domain without any values. The
/// surrounding engine treats the state as a dead end; the domain itself is left untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmptyDomain;

/// Summarises what kind of change a domain mutator produced. The variants form a lattice ordered
/// `None ⊑ Bounds ⊑ Domain ⊑ Assigned`; [`ModificationEvent::join`] is the least upper bound. A
/// failed mutation is not part of the enum but the [`EmptyDomain`] error of the mutator result,
/// which absorbs every other event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModificationEvent {
    /// The domain was not changed.
    None,
    /// At least one bound was tightened.
    Bounds,
    /// A value strictly inside the bounds was removed.
    Domain,
    /// The domain collapsed to a single value.
    Assigned,
}

impl ModificationEvent {
    pub fn join(self, other: ModificationEvent) -> ModificationEvent {
        self.max(other)
    }

    /// Whether the mutation changed the domain at all.
    pub fn has_changed(self) -> bool {
        self != ModificationEvent::None
    }
}

impl From<IntDomainEvent> for ModificationEvent {
    fn from(event: IntDomainEvent) -> Self {
        match event {
            IntDomainEvent::Assign => ModificationEvent::Assigned,
            IntDomainEvent::LowerBound | IntDomainEvent::UpperBound => ModificationEvent::Bounds,
            IntDomainEvent::Removal => ModificationEvent::Domain,
        }
    }
}

/// The domain store. Each [`DomainId`] indexes an integer domain kept as bounds plus a hole set
/// over the initial range.
///
/// Mutators report the produced [`ModificationEvent`] and additionally record
/// `(IntDomainEvent, DomainId)` pairs in an internal buffer which a driver drains through
/// [`Assignments::drain_domain_events`] to schedule watching propagators.
///
/// Cloning the store is the space-cloning operation used for branching: domains are plain values,
/// so the clone shares nothing with the original.
#[derive(Clone, Debug, Default)]
pub struct Assignments {
    domains: KeyedVec<DomainId, IntegerDomain>,
    events: Vec<(IntDomainEvent, DomainId)>,
}

impl Assignments {
    /// Create a new domain `[lower_bound, upper_bound]` and return its id.
    pub fn grow(&mut self, lower_bound: i32, upper_bound: i32) -> DomainId {
        tally_assert_moderate!(
            lower_bound <= upper_bound,
            "cannot create an empty domain [{lower_bound}, {upper_bound}]"
        );
        self.domains
            .push(IntegerDomain::new(lower_bound, upper_bound))
    }

    pub fn num_domains(&self) -> usize {
        self.domains.len()
    }

    pub fn get_lower_bound(&self, domain: DomainId) -> i32 {
        self.domains[domain].lower_bound
    }

    pub fn get_upper_bound(&self, domain: DomainId) -> i32 {
        self.domains[domain].upper_bound
    }

    pub fn get_domain_size(&self, domain: DomainId) -> usize {
        self.domains[domain].size as usize
    }

    pub fn is_domain_assigned(&self, domain: DomainId) -> bool {
        let domain = &self.domains[domain];
        domain.lower_bound == domain.upper_bound
    }

    /// The assigned value, if the domain is a singleton.
    pub fn get_assigned_value(&self, domain: DomainId) -> Option<i32> {
        let domain = &self.domains[domain];
        (domain.lower_bound == domain.upper_bound).then_some(domain.lower_bound)
    }

    pub fn is_value_in_domain(&self, domain: DomainId, value: i32) -> bool {
        self.domains[domain].contains(value)
    }

    /// Iterate the values of the domain in ascending order.
    pub fn get_domain_iterator(&self, domain: DomainId) -> impl Iterator<Item = i32> + '_ {
        let domain = &self.domains[domain];
        (domain.lower_bound..=domain.upper_bound).filter(move |&value| domain.contains(value))
    }

    /// Tighten the lower bound to at least `bound`.
    pub fn tighten_lower_bound(
        &mut self,
        domain_id: DomainId,
        bound: i32,
    ) -> Result<ModificationEvent, EmptyDomain> {
        let domain = &self.domains[domain_id];
        if bound <= domain.lower_bound {
            return Ok(ModificationEvent::None);
        }
        if bound > domain.upper_bound {
            return Err(EmptyDomain);
        }

        let domain = &mut self.domains[domain_id];
        domain.set_lower_bound(bound);
        self.events.push((IntDomainEvent::LowerBound, domain_id));
        Ok(self.finish_bound_change(domain_id))
    }

    /// Tighten the upper bound to at most `bound`.
    pub fn tighten_upper_bound(
        &mut self,
        domain_id: DomainId,
        bound: i32,
    ) -> Result<ModificationEvent, EmptyDomain> {
        let domain = &self.domains[domain_id];
        if bound >= domain.upper_bound {
            return Ok(ModificationEvent::None);
        }
        if bound < domain.lower_bound {
            return Err(EmptyDomain);
        }

        let domain = &mut self.domains[domain_id];
        domain.set_upper_bound(bound);
        self.events.push((IntDomainEvent::UpperBound, domain_id));
        Ok(self.finish_bound_change(domain_id))
    }

    /// Remove a single value from the domain.
    pub fn remove_value_from_domain(
        &mut self,
        domain_id: DomainId,
        value: i32,
    ) -> Result<ModificationEvent, EmptyDomain> {
        let domain = &self.domains[domain_id];
        if !domain.contains(value) {
            return Ok(ModificationEvent::None);
        }
        if domain.size == 1 {
            return Err(EmptyDomain);
        }

        if value == domain.lower_bound {
            return self.tighten_lower_bound(domain_id, value + 1);
        }
        if value == domain.upper_bound {
            return self.tighten_upper_bound(domain_id, value - 1);
        }

        let domain = &mut self.domains[domain_id];
        domain.remove_inner(value);
        self.events.push((IntDomainEvent::Removal, domain_id));
        Ok(ModificationEvent::Domain)
    }

    /// Collapse the domain to `value`.
    pub fn make_assignment(
        &mut self,
        domain_id: DomainId,
        value: i32,
    ) -> Result<ModificationEvent, EmptyDomain> {
        if !self.domains[domain_id].contains(value) {
            return Err(EmptyDomain);
        }
        if self.is_domain_assigned(domain_id) {
            return Ok(ModificationEvent::None);
        }

        let domain = &mut self.domains[domain_id];
        if domain.lower_bound < value {
            domain.set_lower_bound(value);
            self.events.push((IntDomainEvent::LowerBound, domain_id));
        }
        let domain = &mut self.domains[domain_id];
        if domain.upper_bound > value {
            domain.set_upper_bound(value);
            self.events.push((IntDomainEvent::UpperBound, domain_id));
        }
        self.events.push((IntDomainEvent::Assign, domain_id));
        Ok(ModificationEvent::Assigned)
    }

    /// Drain the buffered domain events in the order they occurred.
    pub fn drain_domain_events(&mut self) -> impl Iterator<Item = (IntDomainEvent, DomainId)> + '_ {
        self.events.drain(..)
    }

    fn finish_bound_change(&mut self, domain_id: DomainId) -> ModificationEvent {
        if self.is_domain_assigned(domain_id) {
            self.events.push((IntDomainEvent::Assign, domain_id));
            ModificationEvent::Assigned
        } else {
            ModificationEvent::Bounds
        }
    }
}

/// Bounds plus a hole bitvector over the initial range. Both bounds always sit on present
/// values.
#[derive(Clone, Debug)]
struct IntegerDomain {
    lower_bound: i32,
    upper_bound: i32,
    /// The lower bound the domain was created with; offsets `removed`.
    initial_lower_bound: i32,
    removed: Vec<bool>,
    size: u32,
}

impl IntegerDomain {
    fn new(lower_bound: i32, upper_bound: i32) -> IntegerDomain {
        IntegerDomain {
            lower_bound,
            upper_bound,
            initial_lower_bound: lower_bound,
            removed: vec![false; (upper_bound - lower_bound + 1) as usize],
            size: (upper_bound - lower_bound + 1) as u32,
        }
    }

    fn contains(&self, value: i32) -> bool {
        value >= self.lower_bound
            && value <= self.upper_bound
            && !self.removed[(value - self.initial_lower_bound) as usize]
    }

    fn set_lower_bound(&mut self, bound: i32) {
        tally_assert_moderate!(bound > self.lower_bound && bound <= self.upper_bound);
        let mut bound = bound;
        for value in self.lower_bound..bound {
            if !self.removed[(value - self.initial_lower_bound) as usize] {
                self.size -= 1;
            }
        }
        // land on a present value; the upper bound is present, so this terminates
        while self.removed[(bound - self.initial_lower_bound) as usize] {
            bound += 1;
        }
        self.lower_bound = bound;
    }

    fn set_upper_bound(&mut self, bound: i32) {
        tally_assert_moderate!(bound < self.upper_bound && bound >= self.lower_bound);
        let mut bound = bound;
        for value in (bound + 1)..=self.upper_bound {
            if !self.removed[(value - self.initial_lower_bound) as usize] {
                self.size -= 1;
            }
        }
        while self.removed[(bound - self.initial_lower_bound) as usize] {
            bound -= 1;
        }
        self.upper_bound = bound;
    }

    fn remove_inner(&mut self, value: i32) {
        tally_assert_moderate!(value > self.lower_bound && value < self.upper_bound);
        self.removed[(value - self.initial_lower_bound) as usize] = true;
        self.size -= 1;
    }
}
