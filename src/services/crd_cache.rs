//! Per-cluster custom resource availability cache
//!
//! Tracks which of a fixed set of CRDs are installed on each cluster in the
//! pool. Readers never hit the network unless the cache runs in on-demand
//! mode; in poll mode a background task refreshes the snapshot periodically.

use chrono::{DateTime, Utc};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::kube::{ClientError, ClusterClient, ListOptions, resource_gvk};
use crate::models::flagger::{CANARY_CRD_NAME, METRIC_TEMPLATE_CRD_NAME};

/// Default interval between background refreshes
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// CRDs tracked unless the caller supplies its own list
pub const TRACKED_CRDS: &[&str] = &[CANARY_CRD_NAME, METRIC_TEMPLATE_CRD_NAME];

/// When the cache refreshes its snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Refresh in the background on a fixed interval
    Poll(Duration),
    /// Refresh synchronously before every read
    OnDemand,
}

/// cluster name -> CRD name -> installed
pub type AvailabilitySnapshot = BTreeMap<String, BTreeMap<String, bool>>;

#[derive(Debug, Default)]
struct CacheState {
    clusters: AvailabilitySnapshot,
    last_refresh: Option<DateTime<Utc>>,
}

/// CRD availability per cluster
pub struct CrdCache {
    client: Arc<dyn ClusterClient>,
    tracked: Vec<String>,
    policy: RefreshPolicy,
    state: Mutex<CacheState>,
}

impl CrdCache {
    /// Create a cache tracking the Flagger CRDs
    pub fn new(client: Arc<dyn ClusterClient>, policy: RefreshPolicy) -> Self {
        Self::with_tracked(client, policy, TRACKED_CRDS.iter().map(|s| s.to_string()))
    }

    pub fn with_tracked(
        client: Arc<dyn ClusterClient>,
        policy: RefreshPolicy,
        tracked: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            client,
            tracked: tracked.into_iter().collect(),
            policy,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Rebuild the snapshot from every cluster in the pool
    ///
    /// Listing happens without the lock held. The new snapshot replaces the
    /// old one wholesale, so clusters that left the pool disappear and a
    /// cluster whose listing failed reads as having nothing installed.
    pub async fn refresh(&self) {
        let clusters = self.client.cluster_names();
        let calls = clusters.iter().map(|cluster| async move {
            let installed = list_installed_crds(self.client.as_ref(), cluster).await;
            (cluster.clone(), installed)
        });
        let results = futures::future::join_all(calls).await;

        let mut snapshot = AvailabilitySnapshot::new();
        for (cluster, installed) in results {
            let installed = match installed {
                Ok(names) => names,
                Err(e) => {
                    tracing::warn!("Failed to list CRDs on cluster '{}': {}", cluster, e);
                    BTreeSet::new()
                }
            };

            let entry = self
                .tracked
                .iter()
                .map(|name| (name.clone(), installed.contains(name)))
                .collect();
            snapshot.insert(cluster, entry);
        }

        tracing::info!("Refreshed CRD availability for {} cluster(s)", snapshot.len());

        let mut state = self.state.lock().await;
        state.clusters = snapshot;
        state.last_refresh = Some(Utc::now());
    }

    /// Whether `crd_name` is installed on `cluster`
    ///
    /// Unknown clusters and untracked names read as not installed.
    pub async fn is_available(&self, cluster: &str, crd_name: &str) -> bool {
        self.refresh_if_on_demand().await;

        let state = self.state.lock().await;
        state
            .clusters
            .get(cluster)
            .and_then(|crds| crds.get(crd_name))
            .copied()
            .unwrap_or(false)
    }

    /// Availability of `crd_name` on every known cluster
    ///
    /// Every cluster in the snapshot gets an explicit entry, including `false`
    /// for names that were never observed.
    pub async fn is_available_on_clusters(&self, crd_name: &str) -> BTreeMap<String, bool> {
        self.refresh_if_on_demand().await;

        let state = self.state.lock().await;
        state
            .clusters
            .iter()
            .map(|(cluster, crds)| {
                let available = crds.get(crd_name).copied().unwrap_or(false);
                (cluster.clone(), available)
            })
            .collect()
    }

    /// Copy of the current snapshot
    pub async fn snapshot(&self) -> AvailabilitySnapshot {
        self.state.lock().await.clusters.clone()
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_refresh
    }

    /// Start the background refresh task for poll mode
    ///
    /// Returns `None` for on-demand caches and for a zero poll period. The
    /// first tick fires one interval after spawning; callers refresh once up front.
    pub fn spawn_poller(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let RefreshPolicy::Poll(period) = self.policy else {
            return None;
        };
        if period.is_zero() {
            tracing::warn!("CRD refresh period is zero, background refresh disabled");
            return None;
        }

        let cache = Arc::clone(self);
        Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                cache.refresh().await;
            }
        }))
    }

    async fn refresh_if_on_demand(&self) {
        if self.policy == RefreshPolicy::OnDemand {
            self.refresh().await;
        }
    }
}

async fn list_installed_crds(
    client: &dyn ClusterClient,
    cluster: &str,
) -> Result<BTreeSet<String>, ClientError> {
    let gvk = resource_gvk::<CustomResourceDefinition>();
    let mut options = ListOptions::default();
    let mut names = BTreeSet::new();

    loop {
        let page = client.list(cluster, &gvk, &options).await?;
        names.extend(page.items.into_iter().filter_map(|crd| crd.metadata.name));

        match page.continue_token {
            Some(token) => options.continue_token = Some(token),
            None => break,
        }
    }

    Ok(names)
}
