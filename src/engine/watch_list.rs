use std::fmt::Display;

use enumset::EnumSet;
use enumset::EnumSetType;

use crate::containers::KeyedVec;
use crate::engine::propagation::LocalId;
use crate::engine::propagation::PropagatorId;
use crate::engine::variables::DomainId;

/// A description of the kinds of events that can happen on a domain variable.
#[derive(Debug, EnumSetType, Hash)]
pub enum IntDomainEvent {
    /// Event where an (integer) variable domain collapses to a single value.
    Assign,
    /// Event where an (integer) variable domain tightens the lower bound.
    LowerBound,
    /// Event where an (integer) variable domain tightens the upper bound.
    UpperBound,
    /// Event where an (integer) variable domain removes an inner value within the domain.
    /// N.B. this DomainEvent should not be subscribed to by itself!
    #[doc(hidden)]
    Removal,
}

impl Display for IntDomainEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntDomainEvent::Assign => write!(f, "[Event:Assign]"),
            IntDomainEvent::LowerBound => write!(f, "[Event:LB]"),
            IntDomainEvent::UpperBound => write!(f, "[Event:UB]"),
            IntDomainEvent::Removal => write!(f, "[Event:Remove]"),
        }
    }
}

/// A propagator together with the local slot under which it watches a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropagatorVarId {
    pub propagator: PropagatorId,
    pub variable: LocalId,
}

/// Per-domain subscription lists: which propagators want to hear about which events.
#[derive(Clone, Debug, Default)]
pub struct WatchListCP {
    watchers: KeyedVec<DomainId, WatcherCP>,
}

#[derive(Clone, Debug, Default)]
struct WatcherCP {
    lower_bound_watchers: Vec<PropagatorVarId>,
    upper_bound_watchers: Vec<PropagatorVarId>,
    assign_watchers: Vec<PropagatorVarId>,
    removal_watchers: Vec<PropagatorVarId>,
}

impl WatchListCP {
    pub fn grow(&mut self) {
        let _ = self.watchers.push(WatcherCP::default());
    }

    pub fn num_domains(&self) -> usize {
        self.watchers.len()
    }

    pub fn watch(
        &mut self,
        watcher: PropagatorVarId,
        domain: DomainId,
        events: EnumSet<IntDomainEvent>,
    ) {
        let watchers = &mut self.watchers[domain];
        for event in events {
            let list = match event {
                IntDomainEvent::Assign => &mut watchers.assign_watchers,
                IntDomainEvent::LowerBound => &mut watchers.lower_bound_watchers,
                IntDomainEvent::UpperBound => &mut watchers.upper_bound_watchers,
                IntDomainEvent::Removal => &mut watchers.removal_watchers,
            };
            if !list.contains(&watcher) {
                list.push(watcher);
            }
        }
    }

    pub fn get_affected_propagators(
        &self,
        event: IntDomainEvent,
        domain: DomainId,
    ) -> &[PropagatorVarId] {
        let watchers = &self.watchers[domain];
        match event {
            IntDomainEvent::Assign => &watchers.assign_watchers,
            IntDomainEvent::LowerBound => &watchers.lower_bound_watchers,
            IntDomainEvent::UpperBound => &watchers.upper_bound_watchers,
            IntDomainEvent::Removal => &watchers.removal_watchers,
        }
    }
}

/// Used to register a propagator for notifications about events to a particular variable.
#[derive(Debug)]
pub struct Watchers<'a> {
    propagator_var: PropagatorVarId,
    watch_list: &'a mut WatchListCP,
}

impl<'a> Watchers<'a> {
    pub(crate) fn new(propagator_var: PropagatorVarId, watch_list: &'a mut WatchListCP) -> Self {
        Watchers {
            propagator_var,
            watch_list,
        }
    }

    pub fn watch_all(&mut self, domain: DomainId, events: EnumSet<IntDomainEvent>) {
        self.watch_list.watch(self.propagator_var, domain, events)
    }
}
