//! Flagger custom resources
//!
//! Only the fields read by the query layer are modelled; unknown fields are
//! ignored on deserialization so newer Flagger releases still parse.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

pub const CANARY_CRD_NAME: &str = "canaries.flagger.app";
pub const METRIC_TEMPLATE_CRD_NAME: &str = "metrictemplates.flagger.app";

/// Suffix Flagger appends to the target name for the promoted workload
pub const PRIMARY_SUFFIX: &str = "-primary";

#[derive(CustomResource, Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[kube(
    group = "flagger.app",
    version = "v1beta1",
    kind = "Canary",
    plural = "canaries",
    status = "CanaryStatus",
    derive = "Default",
    derive = "PartialEq",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct CanarySpec {
    /// Traffic management provider, e.g. "istio", "linkerd", "nginx"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    pub target_ref: LocalObjectReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_ref: Option<LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaler_ref: Option<LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<CanaryAnalysis>,

    #[serde(default)]
    pub skip_analysis: bool,
}

/// Reference to an object in the canary's namespace
#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectReference {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CanaryAnalysis {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub interval: String,
    #[serde(default)]
    pub iterations: i32,
    #[serde(default)]
    pub mirror: bool,
    #[serde(default)]
    pub mirror_weight: i32,
    #[serde(default)]
    pub max_weight: i32,
    #[serde(default)]
    pub step_weight: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_weights: Vec<i32>,
    #[serde(default)]
    pub step_weight_promotion: i32,
    #[serde(default)]
    pub threshold: i32,
    /// HTTP match conditions; kept untyped since only their presence matters
    #[serde(default, rename = "match", skip_serializing_if = "Vec::is_empty")]
    pub match_: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<CanaryMetric>,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CanaryMetric {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_range: Option<ThresholdRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_ref: Option<CrossNamespaceReference>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query: String,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
pub struct ThresholdRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug)]
pub struct CrossNamespaceReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CanaryStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phase: String,
    #[serde(default)]
    pub failed_checks: i32,
    #[serde(default)]
    pub canary_weight: i32,
    #[serde(default)]
    pub iterations: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_transition_time: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<CanaryCondition>,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CanaryCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_update_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_transition_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(CustomResource, Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[kube(
    group = "flagger.app",
    version = "v1beta1",
    kind = "MetricTemplate",
    plural = "metrictemplates",
    derive = "Default",
    derive = "PartialEq",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct MetricTemplateSpec {
    pub provider: MetricTemplateProvider,
    #[serde(default)]
    pub query: String,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MetricTemplateProvider {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
    /// Credentials are optional; some providers need none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretReference>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug)]
pub struct SecretReference {
    pub name: String,
}

impl Canary {
    /// Name of the promoted (primary) workload Flagger maintains for this canary
    pub fn primary_name(&self) -> String {
        format!("{}{}", self.spec.target_ref.name, PRIMARY_SUFFIX)
    }

    pub fn provider(&self) -> &str {
        self.spec.provider.as_deref().unwrap_or_default()
    }
}
