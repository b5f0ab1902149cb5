//! canary-fleet library
//!
//! Fleet-wide queries over Flagger canaries: which clusters run Flagger,
//! clustered listing with resumable pagination, canary and metric template
//! summaries, deployment strategy classification, and discovery of the
//! objects each canary drives.

pub mod cli;
pub mod config;
pub mod convert;
pub mod discovery;
pub mod kube;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use self::kube::{ClientError, ClusterClient, ListOptions, ListPage};
pub use self::models::{Canary, DeploymentStrategy, MetricTemplate};
pub use self::services::{CrdCache, ProgressiveDelivery, RefreshPolicy};
