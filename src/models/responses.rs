//! Request and response records of the query service
//!
//! Field names serialize in camelCase so JSON and YAML output line up with
//! what dashboards built against the gRPC gateway expect.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::discovery::ObjectStatus;
use crate::kube::object::ObjectCondition;

/// Page request for list operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Maximum items per cluster; zero or absent means no limit
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub page_token: Option<String>,
}

/// Identity of a single namespaced object on one cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRequest {
    pub name: String,
    pub namespace: String,
    pub cluster_name: String,
}

/// Per-cluster failure carried alongside partial results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListError {
    pub cluster_name: String,
    pub namespace: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetVersionResponse {
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsFlaggerAvailableResponse {
    pub clusters: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCanariesResponse {
    pub canaries: Vec<CanarySummary>,
    pub next_page_token: String,
    pub errors: Vec<ListError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCanaryResponse {
    pub canary: CanarySummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation: Option<Automation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMetricTemplatesResponse {
    pub templates: Vec<MetricTemplateSummary>,
    pub next_page_token: String,
    pub errors: Vec<ListError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetMetricTemplateResponse {
    pub template: MetricTemplateSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListCanaryObjectsResponse {
    pub objects: Vec<DependentObject>,
    pub errors: Vec<ListError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanarySummary {
    pub namespace: String,
    pub name: String,
    pub cluster_name: String,
    pub provider: String,
    pub target_reference: TargetReference,
    pub target_deployment: TargetDeployment,
    pub status: CanaryStatusSummary,
    pub deployment_strategy: String,
    pub analysis: AnalysisSummary,
    pub yaml: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReference {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDeployment {
    pub uid: String,
    pub resource_version: String,
    pub flux_labels: FluxLabels,
    /// Container name to image on the target workload
    pub applied_image_versions: BTreeMap<String, String>,
    /// Container name to image on the promoted workload
    pub promoted_image_versions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxLabels {
    pub kustomize_namespace: String,
    pub kustomize_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryStatusSummary {
    pub phase: String,
    pub failed_checks: i32,
    pub canary_weight: i32,
    pub iterations: i32,
    pub last_transition_time: String,
    pub conditions: Vec<CanaryConditionSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryConditionSummary {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub last_update_time: String,
    pub last_transition_time: String,
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub interval: String,
    pub iterations: i32,
    pub mirror_weight: i32,
    pub max_weight: i32,
    pub step_weight: i32,
    pub step_weight_promotion: i32,
    pub threshold: i32,
    pub step_weights: Vec<i32>,
    pub mirror: bool,
    pub yaml: String,
    pub metrics: Vec<MetricSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub name: String,
    pub interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_range: Option<ThresholdRangeSummary>,
    /// Resolved template, when the metric references one that could be fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_template: Option<MetricTemplateSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRangeSummary {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTemplateSummary {
    pub cluster_name: String,
    pub name: String,
    pub namespace: String,
    pub provider: MetricProviderSummary,
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricProviderSummary {
    #[serde(rename = "type")]
    pub type_: String,
    pub address: String,
    /// Absent when the provider needs no credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    pub insecure_skip_verify: bool,
}

/// Flux object that manages a workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Automation {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionKindRef {
    pub group: String,
    pub version: String,
    pub kind: String,
}

/// An object owned or referenced by a canary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependentObject {
    pub group_version_kind: GroupVersionKindRef,
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub cluster_name: String,
    /// Container images, only populated for Deployments
    pub images: Vec<String>,
    pub status: ObjectStatus,
    pub conditions: Vec<ObjectCondition>,
}
