pub(crate) mod local_id;
pub(crate) mod propagation_context;
pub(crate) mod propagator;
pub(crate) mod propagator_id;
pub(crate) mod propagator_initialisation_context;

pub use local_id::LocalId;
pub use propagation_context::HasAssignments;
pub use propagation_context::PropagationContext;
pub use propagation_context::PropagationContextMut;
pub use propagation_context::ReadDomains;
pub use propagator::Propagator;
pub use propagator_id::PropagatorId;
pub use propagator_initialisation_context::PropagatorInitialisationContext;
