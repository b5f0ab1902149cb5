//! In-memory fleet used by the integration tests
//!
//! Each cluster holds plain manifests. Lists honour `limit` and hand out
//! offset-based continuation tokens; failures can be injected per cluster or
//! per kind.

#![allow(dead_code)]

use async_trait::async_trait;
use canary_fleet::kube::{ClientError, ClusterClient, ListOptions, ListPage};
use kube::core::{DynamicObject, GroupVersionKind};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct FakeCluster {
    objects: Vec<DynamicObject>,
    kind_errors: HashMap<String, ClientError>,
    error: Option<ClientError>,
}

/// One recorded list call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCall {
    pub cluster: String,
    pub kind: String,
    pub options: ListOptions,
}

#[derive(Default)]
pub struct FakeFleet {
    clusters: BTreeMap<String, FakeCluster>,
    calls: Mutex<Vec<ListCall>>,
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cluster holding `manifests`
    pub fn cluster(mut self, name: &str, manifests: Vec<Value>) -> Self {
        let objects = manifests
            .into_iter()
            .map(|m| serde_json::from_value(m).expect("valid manifest"))
            .collect();
        self.clusters.insert(
            name.to_string(),
            FakeCluster {
                objects,
                ..Default::default()
            },
        );
        self
    }

    /// Every call against `cluster` fails with `error`
    pub fn unreachable(mut self, cluster: &str, error: ClientError) -> Self {
        self.clusters.entry(cluster.to_string()).or_default().error = Some(error);
        self
    }

    /// Calls for `kind` on `cluster` fail with `error`
    pub fn fail_kind(mut self, cluster: &str, kind: &str, error: ClientError) -> Self {
        self.clusters
            .entry(cluster.to_string())
            .or_default()
            .kind_errors
            .insert(kind.to_string(), error);
        self
    }

    pub fn list_calls(&self) -> Vec<ListCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn list_calls_for(&self, kind: &str) -> Vec<ListCall> {
        self.list_calls()
            .into_iter()
            .filter(|c| c.kind == kind)
            .collect()
    }

    fn lookup(&self, cluster: &str, gvk: &GroupVersionKind) -> Result<&FakeCluster, ClientError> {
        let state = self
            .clusters
            .get(cluster)
            .ok_or_else(|| ClientError::UnknownCluster(cluster.to_string()))?;
        if let Some(error) = &state.error {
            return Err(error.clone());
        }
        if let Some(error) = state.kind_errors.get(&gvk.kind) {
            return Err(error.clone());
        }
        Ok(state)
    }
}

fn api_version(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        gvk.version.clone()
    } else {
        format!("{}/{}", gvk.group, gvk.version)
    }
}

fn matches_kind(object: &DynamicObject, gvk: &GroupVersionKind) -> bool {
    object
        .types
        .as_ref()
        .is_some_and(|t| t.kind == gvk.kind && t.api_version == api_version(gvk))
}

#[async_trait]
impl ClusterClient for FakeFleet {
    fn cluster_names(&self) -> Vec<String> {
        self.clusters.keys().cloned().collect()
    }

    async fn get(
        &self,
        cluster: &str,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, ClientError> {
        let state = self.lookup(cluster, gvk)?;
        state
            .objects
            .iter()
            .find(|o| {
                matches_kind(o, gvk)
                    && o.metadata.name.as_deref() == Some(name)
                    && o.metadata.namespace.as_deref().unwrap_or_default() == namespace
            })
            .cloned()
            .ok_or_else(|| {
                ClientError::NotFound(format!("{} \"{}\" not found", gvk.kind.to_lowercase(), name))
            })
    }

    async fn list(
        &self,
        cluster: &str,
        gvk: &GroupVersionKind,
        options: &ListOptions,
    ) -> Result<ListPage, ClientError> {
        self.calls.lock().unwrap().push(ListCall {
            cluster: cluster.to_string(),
            kind: gvk.kind.clone(),
            options: options.clone(),
        });

        let state = self.lookup(cluster, gvk)?;
        let all: Vec<_> = state
            .objects
            .iter()
            .filter(|o| matches_kind(o, gvk))
            .cloned()
            .collect();

        let offset = match options.continue_token.as_deref() {
            Some(token) => token
                .strip_prefix("offset-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| ClientError::Transport(format!("bad continue token {}", token)))?,
            None => 0,
        };
        let limit = options.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let end = offset.saturating_add(limit).min(all.len());
        let items = all[offset.min(end)..end].to_vec();
        let continue_token = (end < all.len()).then(|| format!("offset-{}", end));

        Ok(ListPage {
            items,
            continue_token,
        })
    }
}

pub fn crd(name: &str) -> Value {
    json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": {"name": name},
        "spec": {
            "group": "flagger.app",
            "names": {"kind": "Canary", "plural": "canaries"},
            "scope": "Namespaced",
            "versions": []
        }
    })
}

/// Both Flagger CRDs
pub fn flagger_crds() -> Vec<Value> {
    vec![
        crd("canaries.flagger.app"),
        crd("metrictemplates.flagger.app"),
    ]
}

pub fn canary(name: &str, namespace: &str, uid: &str, provider: &str) -> Value {
    json!({
        "apiVersion": "flagger.app/v1beta1",
        "kind": "Canary",
        "metadata": {"name": name, "namespace": namespace, "uid": uid},
        "spec": {
            "provider": provider,
            "targetRef": {"apiVersion": "apps/v1", "kind": "Deployment", "name": name},
            "analysis": {
                "interval": "1m",
                "threshold": 5,
                "maxWeight": 50,
                "stepWeight": 10,
                "metrics": [
                    {
                        "name": "error-rate",
                        "interval": "1m",
                        "thresholdRange": {"max": 1.0},
                        "templateRef": {"name": "error-rate", "namespace": "flagger-system"}
                    }
                ]
            }
        },
        "status": {
            "phase": "Succeeded",
            "canaryWeight": 0,
            "failedChecks": 0,
            "iterations": 0,
            "lastTransitionTime": "2024-01-01T00:00:00Z",
            "conditions": [
                {
                    "type": "Promoted",
                    "status": "True",
                    "lastUpdateTime": "2024-01-01T00:00:00Z",
                    "lastTransitionTime": "2024-01-01T00:00:00Z",
                    "reason": "Succeeded",
                    "message": "Canary analysis completed successfully, promotion finished."
                }
            ]
        }
    })
}

pub fn deployment(name: &str, namespace: &str, uid: &str, image: &str) -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": name, "namespace": namespace, "uid": uid, "resourceVersion": "42"},
        "spec": {
            "replicas": 1,
            "selector": {"matchLabels": {"app": name}},
            "template": {
                "metadata": {"labels": {"app": name}},
                "spec": {"containers": [{"name": name, "image": image}]}
            }
        },
        "status": {
            "replicas": 1,
            "updatedReplicas": 1,
            "readyReplicas": 1,
            "availableReplicas": 1
        }
    })
}

/// Set `metadata.labels` on a manifest
pub fn with_labels(mut manifest: Value, labels: Value) -> Value {
    manifest["metadata"]["labels"] = labels;
    manifest
}

/// Add a controller owner reference pointing at `owner_uid`
pub fn owned_by(mut manifest: Value, owner_name: &str, owner_uid: &str) -> Value {
    let reference = json!({
        "apiVersion": "flagger.app/v1beta1",
        "kind": "Canary",
        "name": owner_name,
        "uid": owner_uid,
        "controller": true
    });
    match manifest["metadata"]["ownerReferences"].as_array_mut() {
        Some(refs) => refs.push(reference),
        None => manifest["metadata"]["ownerReferences"] = json!([reference]),
    }
    manifest
}

pub fn object(api_version: &str, kind: &str, name: &str, namespace: &str, uid: &str) -> Value {
    json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": {"name": name, "namespace": namespace, "uid": uid},
        "spec": {}
    })
}

pub fn metric_template(name: &str, namespace: &str, secret: Option<&str>) -> Value {
    let mut provider = json!({
        "type": "prometheus",
        "address": "http://prometheus.istio-system:9090"
    });
    if let Some(secret) = secret {
        provider["secretRef"] = json!({"name": secret});
    }
    json!({
        "apiVersion": "flagger.app/v1beta1",
        "kind": "MetricTemplate",
        "metadata": {"name": name, "namespace": namespace},
        "spec": {
            "provider": provider,
            "query": "sum(rate(http_requests_total{status!~\"5.*\"}[{{ interval }}]))"
        }
    })
}
