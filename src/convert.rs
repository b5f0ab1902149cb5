//! Conversion from Flagger resources to response records

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Container;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::flagger::{CanaryAnalysis, CanaryCondition};
use crate::models::responses::{
    AnalysisSummary, Automation, CanaryConditionSummary, CanaryStatusSummary, CanarySummary,
    FluxLabels, MetricProviderSummary, MetricSummary, MetricTemplateSummary, TargetDeployment,
    TargetReference, ThresholdRangeSummary,
};
use crate::models::{Canary, DeploymentStrategy, MetricTemplate};

pub const LABEL_KUSTOMIZE_NAME: &str = "kustomize.toolkit.fluxcd.io/name";
pub const LABEL_KUSTOMIZE_NAMESPACE: &str = "kustomize.toolkit.fluxcd.io/namespace";
pub const LABEL_HELM_RELEASE_NAME: &str = "helm.toolkit.fluxcd.io/name";
pub const LABEL_HELM_RELEASE_NAMESPACE: &str = "helm.toolkit.fluxcd.io/namespace";

/// Summarize a canary together with its target and promoted workloads
///
/// `templates` are the metric templates available for resolving the analysis
/// metrics' template references; unresolved references are left empty.
pub fn canary_summary(
    canary: &Canary,
    cluster: &str,
    deployment: &Deployment,
    promoted: &Deployment,
    templates: &[MetricTemplate],
) -> CanarySummary {
    let labels = deployment.metadata.labels.clone().unwrap_or_default();
    let label = |key: &str| labels.get(key).cloned().unwrap_or_default();
    let status = canary.status.clone().unwrap_or_default();
    let analysis = canary.spec.analysis.clone().unwrap_or_default();

    CanarySummary {
        name: canary.metadata.name.clone().unwrap_or_default(),
        namespace: canary.metadata.namespace.clone().unwrap_or_default(),
        cluster_name: cluster.to_string(),
        provider: canary.provider().to_string(),
        target_reference: TargetReference {
            kind: canary.spec.target_ref.kind.clone(),
            name: canary.spec.target_ref.name.clone(),
        },
        target_deployment: TargetDeployment {
            uid: deployment.metadata.uid.clone().unwrap_or_default(),
            resource_version: deployment.metadata.resource_version.clone().unwrap_or_default(),
            flux_labels: FluxLabels {
                kustomize_namespace: label(LABEL_KUSTOMIZE_NAMESPACE),
                kustomize_name: label(LABEL_KUSTOMIZE_NAME),
            },
            applied_image_versions: image_versions(deployment),
            promoted_image_versions: image_versions(promoted),
        },
        status: CanaryStatusSummary {
            phase: status.phase,
            failed_checks: status.failed_checks,
            canary_weight: status.canary_weight,
            iterations: status.iterations,
            last_transition_time: status.last_transition_time,
            conditions: status.conditions.into_iter().map(condition_summary).collect(),
        },
        deployment_strategy: DeploymentStrategy::for_canary(canary).to_string(),
        analysis: analysis_summary(&analysis, cluster, templates),
        yaml: to_yaml(canary),
    }
}

pub fn metric_template_summary(template: &MetricTemplate, cluster: &str) -> MetricTemplateSummary {
    let provider = &template.spec.provider;
    MetricTemplateSummary {
        cluster_name: cluster.to_string(),
        name: template.metadata.name.clone().unwrap_or_default(),
        namespace: template.metadata.namespace.clone().unwrap_or_default(),
        provider: MetricProviderSummary {
            type_: provider.type_.clone(),
            address: provider.address.clone(),
            secret_name: provider.secret_ref.as_ref().map(|s| s.name.clone()),
            insecure_skip_verify: provider.insecure_skip_verify,
        },
        query: template.spec.query.clone(),
    }
}

/// Flux object managing a workload, read from its labels
pub fn automation_for(deployment: &Deployment) -> Option<Automation> {
    let labels = deployment.metadata.labels.as_ref()?;
    let namespace = |key: &str| labels.get(key).cloned().unwrap_or_default();

    if let Some(name) = labels.get(LABEL_KUSTOMIZE_NAME) {
        return Some(Automation {
            kind: "Kustomization".to_string(),
            name: name.clone(),
            namespace: namespace(LABEL_KUSTOMIZE_NAMESPACE),
        });
    }

    labels.get(LABEL_HELM_RELEASE_NAME).map(|name| Automation {
        kind: "HelmRelease".to_string(),
        name: name.clone(),
        namespace: namespace(LABEL_HELM_RELEASE_NAMESPACE),
    })
}

/// Templates referenced by a canary's metrics as (namespace, name)
///
/// References without a namespace resolve in the canary's namespace.
pub fn metric_template_refs(canary: &Canary) -> Vec<(String, String)> {
    let canary_namespace = canary.metadata.namespace.clone().unwrap_or_default();
    canary
        .spec
        .analysis
        .iter()
        .flat_map(|a| a.metrics.iter())
        .filter_map(|m| m.template_ref.as_ref())
        .map(|r| {
            let namespace = if r.namespace.is_empty() {
                canary_namespace.clone()
            } else {
                r.namespace.clone()
            };
            (namespace, r.name.clone())
        })
        .collect()
}

fn analysis_summary(
    analysis: &CanaryAnalysis,
    cluster: &str,
    templates: &[MetricTemplate],
) -> AnalysisSummary {
    let metrics = analysis
        .metrics
        .iter()
        .map(|metric| {
            let metric_template = metric.template_ref.as_ref().and_then(|r| {
                templates
                    .iter()
                    .find(|t| {
                        t.metadata.name.as_deref() == Some(r.name.as_str())
                            && (r.namespace.is_empty()
                                || t.metadata.namespace.as_deref() == Some(r.namespace.as_str()))
                    })
                    .map(|t| metric_template_summary(t, cluster))
            });

            MetricSummary {
                name: metric.name.clone(),
                interval: metric.interval.clone(),
                threshold_range: metric.threshold_range.as_ref().map(|r| ThresholdRangeSummary {
                    min: r.min.unwrap_or_default(),
                    max: r.max.unwrap_or_default(),
                }),
                metric_template,
            }
        })
        .collect();

    AnalysisSummary {
        interval: analysis.interval.clone(),
        iterations: analysis.iterations,
        mirror_weight: analysis.mirror_weight,
        max_weight: analysis.max_weight,
        step_weight: analysis.step_weight,
        step_weight_promotion: analysis.step_weight_promotion,
        threshold: analysis.threshold,
        step_weights: analysis.step_weights.clone(),
        mirror: analysis.mirror,
        yaml: to_yaml(analysis),
        metrics,
    }
}

fn condition_summary(condition: CanaryCondition) -> CanaryConditionSummary {
    CanaryConditionSummary {
        type_: condition.type_,
        status: condition.status,
        last_update_time: condition.last_update_time,
        last_transition_time: condition.last_transition_time,
        reason: condition.reason,
        message: condition.message,
    }
}

fn image_versions(deployment: &Deployment) -> BTreeMap<String, String> {
    let containers: &[Container] = deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .map(|p| p.containers.as_slice())
        .unwrap_or_default();

    containers
        .iter()
        .map(|c| (c.name.clone(), c.image.clone().unwrap_or_default()))
        .collect()
}

fn to_yaml<T: Serialize>(value: &T) -> String {
    serde_yaml::to_string(value).unwrap_or_else(|e| {
        tracing::warn!("Failed to render YAML: {}", e);
        String::new()
    })
}
