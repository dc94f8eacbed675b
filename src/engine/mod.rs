mod assignments;
pub(crate) mod domain_events;
pub mod propagation;
pub(crate) mod test_solver;
mod watch_list;

pub mod variables;

pub use assignments::Assignments;
pub use assignments::EmptyDomain;
pub use assignments::ModificationEvent;
pub use domain_events::DomainEvents;
pub use watch_list::IntDomainEvent;
pub use watch_list::PropagatorVarId;
pub use watch_list::WatchListCP;
pub use watch_list::Watchers;
