//! Dependent object discovery
//!
//! Starting from one canary, finds the objects it references (target, ingress,
//! autoscaler) and every object of a candidate kind whose owner references
//! point back at it. Candidate kinds depend on the canary's traffic provider.

mod graph;
pub mod providers;
pub mod status;

pub use graph::{CanaryObjects, DiscoveryError, list_canary_objects};
pub use status::{ObjectStatus, StatusResult, compute_status};
