//! Service layer
//!
//! - `crd_cache` - which Flagger CRDs each cluster has installed
//! - `aggregator` - clustered list fan-out and continuation tokens
//! - `flagger` - Canary and MetricTemplate fetching with availability gating
//! - `progressive_delivery` - request-level facade used by the CLI

pub mod aggregator;
pub mod crd_cache;
pub mod flagger;
pub mod progressive_delivery;

pub use aggregator::{AggregateError, AggregatedList, ClusterError, clustered_list};
pub use crd_cache::{CrdCache, RefreshPolicy};
pub use flagger::{FetchError, FlaggerFetcher};
pub use progressive_delivery::ProgressiveDelivery;
