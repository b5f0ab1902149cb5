//! Progressive delivery query service
//!
//! The request-level API: each operation fans out through the fetcher and
//! shapes the result into response records. List operations never fail
//! because of a single cluster; per-cluster problems travel in `errors`.

use k8s_openapi::api::apps::v1::Deployment;
use std::sync::Arc;

use super::crd_cache::CrdCache;
use super::flagger::{FetchError, FlaggerFetcher};
use crate::convert;
use crate::discovery::{self, DiscoveryError};
use crate::kube::ClusterClient;
use crate::models::flagger::CANARY_CRD_NAME;
use crate::models::responses::{
    GetCanaryResponse, GetMetricTemplateResponse, GetVersionResponse, IsFlaggerAvailableResponse,
    ListCanariesResponse, ListCanaryObjectsResponse, ListMetricTemplatesResponse, ObjectRequest,
    Pagination,
};
use crate::models::{Canary, MetricTemplate};

/// Version reported by [`ProgressiveDelivery::get_version`]
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct ProgressiveDelivery {
    client: Arc<dyn ClusterClient>,
    crds: Arc<CrdCache>,
    flagger: FlaggerFetcher,
}

impl ProgressiveDelivery {
    pub fn new(client: Arc<dyn ClusterClient>, crds: Arc<CrdCache>) -> Self {
        Self {
            flagger: FlaggerFetcher::new(Arc::clone(&crds)),
            client,
            crds,
        }
    }

    /// Names of the clusters in the fleet, in response order
    pub fn clusters(&self) -> Vec<String> {
        self.client.cluster_names()
    }

    pub fn get_version(&self) -> GetVersionResponse {
        GetVersionResponse {
            version: VERSION.to_string(),
        }
    }

    pub async fn is_flagger_available(&self) -> IsFlaggerAvailableResponse {
        IsFlaggerAvailableResponse {
            clusters: self.crds.is_available_on_clusters(CANARY_CRD_NAME).await,
        }
    }

    /// Canaries from every cluster with their target and promoted workloads
    ///
    /// Workload lookups are best effort: a canary whose target is missing is
    /// still listed, with an empty target deployment.
    pub async fn list_canaries(
        &self,
        pagination: &Pagination,
    ) -> Result<ListCanariesResponse, FetchError> {
        let client = self.client.as_ref();
        let listing = self.flagger.list_canaries(client, pagination).await?;

        let mut canaries = Vec::new();
        for (cluster, items) in &listing.items {
            for canary in items {
                let (target, promoted) = self.workloads(cluster, canary).await;
                canaries.push(convert::canary_summary(canary, cluster, &target, &promoted, &[]));
            }
        }

        Ok(ListCanariesResponse {
            canaries,
            next_page_token: listing.next_page_token,
            errors: listing.errors,
        })
    }

    /// One canary with its managing Flux object and resolved metric templates
    ///
    /// Fails when the canary or its target workload cannot be fetched.
    pub async fn get_canary(&self, request: &ObjectRequest) -> Result<GetCanaryResponse, FetchError> {
        let client = self.client.as_ref();
        let cluster = request.cluster_name.as_str();
        let canary = self.flagger.get_canary(client, request).await?;

        let target = self.flagger.fetch_target_ref(client, cluster, &canary).await?;
        let promoted = self
            .flagger
            .fetch_promoted(client, cluster, &canary)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to fetch promoted workload: {}", e);
                Deployment::default()
            });
        let templates = self.referenced_templates(cluster, &canary).await;

        Ok(GetCanaryResponse {
            canary: convert::canary_summary(&canary, cluster, &target, &promoted, &templates),
            automation: convert::automation_for(&target),
        })
    }

    pub async fn list_metric_templates(
        &self,
        pagination: &Pagination,
    ) -> Result<ListMetricTemplatesResponse, FetchError> {
        let listing = self
            .flagger
            .list_metric_templates(self.client.as_ref(), pagination)
            .await?;

        let templates = listing
            .items
            .iter()
            .flat_map(|(cluster, items)| {
                items
                    .iter()
                    .map(move |t| convert::metric_template_summary(t, cluster))
            })
            .collect();

        Ok(ListMetricTemplatesResponse {
            templates,
            next_page_token: listing.next_page_token,
            errors: listing.errors,
        })
    }

    pub async fn get_metric_template(
        &self,
        request: &ObjectRequest,
    ) -> Result<GetMetricTemplateResponse, FetchError> {
        let template = self
            .flagger
            .get_metric_template(self.client.as_ref(), request)
            .await?;

        Ok(GetMetricTemplateResponse {
            template: convert::metric_template_summary(&template, &request.cluster_name),
        })
    }

    pub async fn list_canary_objects(
        &self,
        request: &ObjectRequest,
    ) -> Result<ListCanaryObjectsResponse, DiscoveryError> {
        let found =
            discovery::list_canary_objects(self.client.as_ref(), &self.flagger, request).await?;

        Ok(ListCanaryObjectsResponse {
            objects: found.objects,
            errors: found.errors,
        })
    }

    async fn workloads(&self, cluster: &str, canary: &Canary) -> (Deployment, Deployment) {
        let client = self.client.as_ref();
        let target = self
            .flagger
            .fetch_target_ref(client, cluster, canary)
            .await
            .unwrap_or_else(|e| {
                tracing::debug!("{}", e);
                Deployment::default()
            });
        let promoted = self
            .flagger
            .fetch_promoted(client, cluster, canary)
            .await
            .unwrap_or_else(|e| {
                tracing::debug!("{}", e);
                Deployment::default()
            });
        (target, promoted)
    }

    async fn referenced_templates(&self, cluster: &str, canary: &Canary) -> Vec<MetricTemplate> {
        let mut templates = Vec::new();
        for (namespace, name) in convert::metric_template_refs(canary) {
            let request = ObjectRequest {
                name,
                namespace,
                cluster_name: cluster.to_string(),
            };
            match self
                .flagger
                .get_metric_template(self.client.as_ref(), &request)
                .await
            {
                Ok(template) => templates.push(template),
                Err(e) => tracing::warn!("Unable to fetch metric template from reference: {}", e),
            }
        }
        templates
    }
}
