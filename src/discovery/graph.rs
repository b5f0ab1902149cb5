//! Canary object graph discovery

use kube::core::{DynamicObject, GroupVersionKind};
use std::collections::HashSet;

use super::providers::candidate_kinds;
use super::status::{compute_status, report_conditions};
use crate::kube::object::{container_images, is_owned_by, object_gvk, object_uid, split_api_version};
use crate::kube::{ClientError, ClusterClient, ListOptions};
use crate::models::flagger::LocalObjectReference;
use crate::models::responses::{DependentObject, GroupVersionKindRef, ListError, ObjectRequest};
use crate::services::flagger::{FetchError, FlaggerFetcher};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("unable to find canary: {0}")]
    Canary(#[source] FetchError),

    #[error("failed to fetch canary target {kind}/{name}: {source}")]
    TargetRef {
        kind: String,
        name: String,
        #[source]
        source: ClientError,
    },

    #[error("failed listing {kind} on cluster {cluster}: {source}")]
    List {
        kind: String,
        cluster: String,
        #[source]
        source: ClientError,
    },
}

/// Objects owned or referenced by a canary, in discovery order
#[derive(Debug, Clone, Default)]
pub struct CanaryObjects {
    pub objects: Vec<DependentObject>,
    /// Kinds skipped because listing them was forbidden
    pub errors: Vec<ListError>,
}

/// Objects collected so far, deduplicated by uid
#[derive(Default)]
struct Collected {
    seen: HashSet<String>,
    objects: Vec<(GroupVersionKind, DynamicObject)>,
}

impl Collected {
    fn push(&mut self, requested: &GroupVersionKind, object: DynamicObject) {
        if let Some(uid) = object_uid(&object) {
            if !self.seen.insert(uid.to_string()) {
                return;
            }
        }
        let gvk = object_gvk(&object).unwrap_or_else(|| requested.clone());
        self.objects.push((gvk, object));
    }
}

/// Discover every object a canary owns or references on one cluster
///
/// Order of the result: target, ingress and autoscaler references, then owned
/// objects per candidate kind with the list order preserved within a kind.
/// A failure to fetch the target reference aborts discovery; optional
/// references that cannot be fetched are skipped.
pub async fn list_canary_objects(
    client: &dyn ClusterClient,
    fetcher: &FlaggerFetcher,
    request: &ObjectRequest,
) -> Result<CanaryObjects, DiscoveryError> {
    let canary = fetcher
        .get_canary(client, request)
        .await
        .map_err(DiscoveryError::Canary)?;

    let cluster = request.cluster_name.as_str();
    let namespace = canary
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| request.namespace.clone());
    let canary_uid = canary.metadata.uid.clone().unwrap_or_default();

    let mut collected = Collected::default();
    let mut errors = Vec::new();

    let target = &canary.spec.target_ref;
    let gvk = reference_gvk(target);
    let object = client
        .get(cluster, &gvk, &namespace, &target.name)
        .await
        .map_err(|source| DiscoveryError::TargetRef {
            kind: target.kind.clone(),
            name: target.name.clone(),
            source,
        })?;
    collected.push(&gvk, object);

    let optional = [&canary.spec.ingress_ref, &canary.spec.autoscaler_ref];
    for reference in optional.into_iter().flatten() {
        let gvk = reference_gvk(reference);
        match client.get(cluster, &gvk, &namespace, &reference.name).await {
            Ok(object) => collected.push(&gvk, object),
            Err(e) => tracing::debug!(
                "Skipping {} {}/{}: {}",
                reference.kind,
                namespace,
                reference.name,
                e
            ),
        }
    }

    if canary_uid.is_empty() {
        tracing::warn!("Canary {}/{} has no uid, skipping owned objects", namespace, request.name);
    } else {
        for gvk in candidate_kinds(canary.provider()) {
            let items = match list_all(client, cluster, &gvk).await {
                Ok(items) => items,
                Err(e) if e.is_forbidden() => {
                    tracing::warn!("Not allowed to list {} on cluster '{}': {}", gvk.kind, cluster, e);
                    errors.push(ListError {
                        cluster_name: cluster.to_string(),
                        namespace: namespace.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
                Err(e) if e.is_no_kind_match() => {
                    tracing::debug!("{} is not served on cluster '{}'", gvk.kind, cluster);
                    continue;
                }
                Err(source) => {
                    return Err(DiscoveryError::List {
                        kind: gvk.kind.clone(),
                        cluster: cluster.to_string(),
                        source,
                    });
                }
            };

            for object in items {
                if is_owned_by(&object, &canary_uid) {
                    collected.push(&gvk, object);
                }
            }
        }
    }

    let objects = collected
        .objects
        .into_iter()
        .map(|(gvk, object)| describe(gvk, object, cluster))
        .collect();

    Ok(CanaryObjects { objects, errors })
}

/// Every object of a kind across all namespaces, following continuation tokens
async fn list_all(
    client: &dyn ClusterClient,
    cluster: &str,
    gvk: &GroupVersionKind,
) -> Result<Vec<DynamicObject>, ClientError> {
    let mut options = ListOptions::default();
    let mut items = Vec::new();

    loop {
        let page = client.list(cluster, gvk, &options).await?;
        items.extend(page.items);
        match page.continue_token {
            Some(token) => options.continue_token = Some(token),
            None => return Ok(items),
        }
    }
}

fn reference_gvk(reference: &LocalObjectReference) -> GroupVersionKind {
    let api_version = if reference.api_version.is_empty() {
        default_api_version(&reference.kind)
    } else {
        reference.api_version.as_str()
    };
    let (group, version) = split_api_version(api_version);
    GroupVersionKind::gvk(group, version, &reference.kind)
}

/// apiVersion Flagger assumes when a reference omits it
fn default_api_version(kind: &str) -> &'static str {
    match kind {
        "Deployment" | "DaemonSet" => "apps/v1",
        "HorizontalPodAutoscaler" => "autoscaling/v2",
        "Ingress" => "networking.k8s.io/v1",
        "ScaledObject" => "keda.sh/v1alpha1",
        _ => "v1",
    }
}

fn describe(gvk: GroupVersionKind, object: DynamicObject, cluster: &str) -> DependentObject {
    let status = compute_status(&object, &gvk.kind);
    let images = if gvk.kind == "Deployment" {
        container_images(&object)
    } else {
        Vec::new()
    };

    DependentObject {
        conditions: report_conditions(&object, &status),
        status: status.status,
        images,
        name: object.metadata.name.clone().unwrap_or_default(),
        namespace: object.metadata.namespace.clone().unwrap_or_default(),
        uid: object.metadata.uid.clone().unwrap_or_default(),
        cluster_name: cluster.to_string(),
        group_version_kind: GroupVersionKindRef {
            group: gvk.group,
            version: gvk.version,
            kind: gvk.kind,
        },
    }
}
