//! Canary and MetricTemplate queries
//!
//! List calls go through the clustered aggregator and are then gated on CRD
//! availability: a cluster without Flagger installed reports one
//! "not installed" error and no items, whatever its raw list call returned.

use k8s_openapi::api::apps::v1::Deployment;
use kube::Resource;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::aggregator::{AggregateError, ClusterError, clustered_list};
use super::crd_cache::CrdCache;
use crate::kube::{ClientError, ClusterClient, ListOptions, parse_object, resource_gvk};
use crate::models::flagger::CANARY_CRD_NAME;
use crate::models::responses::{ListError, ObjectRequest, Pagination};
use crate::models::{Canary, DeploymentStrategy, MetricTemplate};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{kind} not found: name={name} namespace={namespace} cluster={cluster}")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
        cluster: String,
    },

    #[error("failed getting {kind}: name={name} namespace={namespace} cluster={cluster} err={source}")]
    Get {
        kind: String,
        name: String,
        namespace: String,
        cluster: String,
        #[source]
        source: ClientError,
    },

    #[error(transparent)]
    List(#[from] AggregateError),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

/// Message for clusters that do not have Flagger installed
pub fn flagger_not_available(cluster: &str) -> String {
    format!("flagger is not installed on cluster: {}", cluster)
}

/// Per-cluster items of a gated list call
#[derive(Debug, Clone)]
pub struct ClusterListing<K> {
    pub items: BTreeMap<String, Vec<K>>,
    pub next_page_token: String,
    pub errors: Vec<ListError>,
}

/// Fetches Flagger resources from the fleet
///
/// The fetcher only owns the availability cache. The cluster client is passed
/// per call so each request can carry its own credentials.
#[derive(Clone)]
pub struct FlaggerFetcher {
    crds: Arc<CrdCache>,
}

impl FlaggerFetcher {
    pub fn new(crds: Arc<CrdCache>) -> Self {
        Self { crds }
    }

    pub async fn list_canaries(
        &self,
        client: &dyn ClusterClient,
        pagination: &Pagination,
    ) -> Result<ClusterListing<Canary>, FetchError> {
        self.list_gated(client, pagination, CANARY_CRD_NAME).await
    }

    /// Metric templates, gated on the Canary CRD like every Flagger list
    pub async fn list_metric_templates(
        &self,
        client: &dyn ClusterClient,
        pagination: &Pagination,
    ) -> Result<ClusterListing<MetricTemplate>, FetchError> {
        self.list_gated(client, pagination, CANARY_CRD_NAME).await
    }

    pub async fn get_canary(
        &self,
        client: &dyn ClusterClient,
        request: &ObjectRequest,
    ) -> Result<Canary, FetchError> {
        get_typed(client, &request.cluster_name, &request.namespace, &request.name).await
    }

    pub async fn get_metric_template(
        &self,
        client: &dyn ClusterClient,
        request: &ObjectRequest,
    ) -> Result<MetricTemplate, FetchError> {
        get_typed(client, &request.cluster_name, &request.namespace, &request.name).await
    }

    /// The workload named by the canary's target reference
    pub async fn fetch_target_ref(
        &self,
        client: &dyn ClusterClient,
        cluster: &str,
        canary: &Canary,
    ) -> Result<Deployment, FetchError> {
        let namespace = canary.metadata.namespace.as_deref().unwrap_or_default();
        get_typed(client, cluster, namespace, &canary.spec.target_ref.name).await
    }

    /// The promoted workload `<target>-primary`
    ///
    /// A missing primary is normal before the first promotion and yields an
    /// empty deployment instead of an error.
    pub async fn fetch_promoted(
        &self,
        client: &dyn ClusterClient,
        cluster: &str,
        canary: &Canary,
    ) -> Result<Deployment, FetchError> {
        let namespace = canary.metadata.namespace.as_deref().unwrap_or_default();
        match get_typed(client, cluster, namespace, &canary.primary_name()).await {
            Err(e) if e.is_not_found() => {
                tracing::debug!("{}", e);
                Ok(Deployment::default())
            }
            other => other,
        }
    }

    pub fn deployment_strategy_for(&self, canary: &Canary) -> DeploymentStrategy {
        DeploymentStrategy::for_canary(canary)
    }

    async fn list_gated<K>(
        &self,
        client: &dyn ClusterClient,
        pagination: &Pagination,
        crd_name: &str,
    ) -> Result<ClusterListing<K>, FetchError>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let options = ListOptions {
            limit: pagination.page_size.filter(|size| *size > 0),
            continue_token: pagination.page_token.clone().filter(|t| !t.is_empty()),
        };

        let list = clustered_list::<K>(client, &options, true).await?;
        let availability = self.crds.is_available_on_clusters(crd_name).await;
        let available = |cluster: &str| availability.get(cluster).copied().unwrap_or(false);

        let kind = K::kind(&()).to_lowercase();
        let mut errors: Vec<ListError> = list
            .errors
            .into_iter()
            .filter(|e| available(e.cluster.as_str()))
            .map(|ClusterError { cluster, error }| ListError {
                message: format!("{} list error on cluster {}: {}", kind, cluster, error),
                cluster_name: cluster,
                namespace: String::new(),
            })
            .collect();

        let mut items = BTreeMap::new();
        for (cluster, cluster_items) in list.items {
            if available(cluster.as_str()) {
                items.insert(cluster, cluster_items);
            } else {
                errors.push(ListError {
                    message: flagger_not_available(&cluster),
                    cluster_name: cluster.clone(),
                    namespace: String::new(),
                });
                items.insert(cluster, Vec::new());
            }
        }

        Ok(ClusterListing {
            items,
            next_page_token: list.continue_token,
            errors,
        })
    }
}

async fn get_typed<K>(
    client: &dyn ClusterClient,
    cluster: &str,
    namespace: &str,
    name: &str,
) -> Result<K, FetchError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let gvk = resource_gvk::<K>();
    let object = client.get(cluster, &gvk, namespace, name).await;

    object.and_then(parse_object::<K>).map_err(|source| {
        if source.is_not_found() {
            FetchError::NotFound {
                kind: gvk.kind.clone(),
                name: name.to_string(),
                namespace: namespace.to_string(),
                cluster: cluster.to_string(),
            }
        } else {
            FetchError::Get {
                kind: gvk.kind.to_lowercase(),
                name: name.to_string(),
                namespace: namespace.to_string(),
                cluster: cluster.to_string(),
                source,
            }
        }
    })
}
