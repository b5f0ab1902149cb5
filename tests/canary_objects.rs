//! Canary object discovery tests

mod common;

use canary_fleet::discovery::{DiscoveryError, ObjectStatus};
use canary_fleet::kube::{ClientError, ClusterClient};
use canary_fleet::models::responses::{DependentObject, ObjectRequest};
use canary_fleet::services::{CrdCache, ProgressiveDelivery, RefreshPolicy};
use common::{FakeFleet, canary, deployment, flagger_crds, object, owned_by};
use serde_json::{Value, json};
use std::sync::Arc;

const CANARY_UID: &str = "uid-canary";

fn service(fleet: FakeFleet) -> ProgressiveDelivery {
    let client: Arc<dyn ClusterClient> = Arc::new(fleet);
    let crds = Arc::new(CrdCache::new(Arc::clone(&client), RefreshPolicy::OnDemand));
    ProgressiveDelivery::new(client, crds)
}

fn request() -> ObjectRequest {
    ObjectRequest {
        name: "podinfo".into(),
        namespace: "test".into(),
        cluster_name: "management".into(),
    }
}

fn owned(api_version: &str, kind: &str, name: &str, uid: &str) -> Value {
    owned_by(object(api_version, kind, name, "test", uid), "podinfo", CANARY_UID)
}

/// An istio canary with an autoscaler and everything Flagger generates for it
fn istio_fleet() -> Vec<Value> {
    let mut podinfo = canary("podinfo", "test", CANARY_UID, "istio");
    podinfo["spec"]["autoscalerRef"] = json!({
        "apiVersion": "autoscaling/v2",
        "kind": "HorizontalPodAutoscaler",
        "name": "podinfo"
    });

    // Owned by the canary through its second owner reference
    let shared = owned_by(
        owned_by(
            object("v1", "Service", "podinfo-primary", "test", "uid-svc-primary"),
            "other",
            "uid-someone-else",
        ),
        "podinfo",
        CANARY_UID,
    );

    let mut manifests = flagger_crds();
    manifests.extend([
        podinfo,
        deployment("podinfo", "test", "uid-target", "ghcr.io/podinfo:6.1.0"),
        owned_by(
            deployment("podinfo-primary", "test", "uid-primary", "ghcr.io/podinfo:6.0.0"),
            "podinfo",
            CANARY_UID,
        ),
        owned("autoscaling/v2", "HorizontalPodAutoscaler", "podinfo", "uid-hpa"),
        owned("v1", "Service", "podinfo-canary", "uid-svc-canary"),
        shared,
        object("v1", "Service", "unrelated", "test", "uid-unrelated"),
        owned("networking.istio.io/v1alpha3", "DestinationRule", "podinfo-canary", "uid-dr-canary"),
        owned("networking.istio.io/v1alpha3", "DestinationRule", "podinfo-primary", "uid-dr-primary"),
        owned("networking.istio.io/v1alpha3", "VirtualService", "podinfo", "uid-vs"),
    ]);
    manifests
}

fn names(objects: &[DependentObject]) -> Vec<String> {
    objects
        .iter()
        .map(|o| format!("{}/{}", o.group_version_kind.kind, o.name))
        .collect()
}

#[tokio::test]
async fn test_discovery_order_and_dedup() {
    let service = service(FakeFleet::new().cluster("management", istio_fleet()));

    let response = service.list_canary_objects(&request()).await.unwrap();

    assert_eq!(
        names(&response.objects),
        vec![
            "Deployment/podinfo",
            "HorizontalPodAutoscaler/podinfo",
            "Service/podinfo-canary",
            "Service/podinfo-primary",
            "Deployment/podinfo-primary",
            "DestinationRule/podinfo-canary",
            "DestinationRule/podinfo-primary",
            "VirtualService/podinfo",
        ]
    );
    assert!(response.errors.is_empty());

    for object in &response.objects {
        assert_eq!(object.cluster_name, "management");
        assert_eq!(object.namespace, "test");
    }
}

#[tokio::test]
async fn test_dependent_object_details() {
    let service = service(FakeFleet::new().cluster("management", istio_fleet()));

    let response = service.list_canary_objects(&request()).await.unwrap();

    let target = &response.objects[0];
    assert_eq!(target.uid, "uid-target");
    assert_eq!(target.group_version_kind.group, "apps");
    assert_eq!(target.group_version_kind.version, "v1");
    assert_eq!(target.images, vec!["ghcr.io/podinfo:6.1.0"]);
    assert_eq!(target.status, ObjectStatus::Ready);

    let service_obj = response
        .objects
        .iter()
        .find(|o| o.name == "podinfo-canary" && o.group_version_kind.kind == "Service")
        .unwrap();
    assert!(service_obj.images.is_empty());
    assert_eq!(service_obj.status, ObjectStatus::Ready);
    assert_eq!(service_obj.conditions.len(), 1);
    assert_eq!(service_obj.conditions[0].type_, "Ready");
    assert_eq!(service_obj.conditions[0].reason, "Current");
}

#[tokio::test]
async fn test_forbidden_kind_is_reported_and_skipped() {
    let service = service(
        FakeFleet::new()
            .cluster("management", istio_fleet())
            .fail_kind(
                "management",
                "DestinationRule",
                ClientError::Forbidden("destinationrules is forbidden".into()),
            ),
    );

    let response = service.list_canary_objects(&request()).await.unwrap();

    assert!(
        !response
            .objects
            .iter()
            .any(|o| o.group_version_kind.kind == "DestinationRule")
    );
    assert!(
        response
            .objects
            .iter()
            .any(|o| o.group_version_kind.kind == "VirtualService")
    );
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].cluster_name, "management");
    assert!(response.errors[0].message.contains("destinationrules is forbidden"));
}

#[tokio::test]
async fn test_unserved_kind_is_skipped_silently() {
    let service = service(
        FakeFleet::new()
            .cluster("management", istio_fleet())
            .fail_kind(
                "management",
                "VirtualService",
                ClientError::NoKindMatch {
                    kind: "VirtualService".into(),
                    api_version: "networking.istio.io/v1alpha3".into(),
                },
            ),
    );

    let response = service.list_canary_objects(&request()).await.unwrap();

    assert_eq!(response.objects.len(), 7);
    assert!(response.errors.is_empty());
}

#[tokio::test]
async fn test_other_list_failures_abort_discovery() {
    let service = service(
        FakeFleet::new()
            .cluster("management", istio_fleet())
            .fail_kind("management", "Service", ClientError::Transport("EOF".into())),
    );

    let err = service.list_canary_objects(&request()).await.unwrap_err();

    match err {
        DiscoveryError::List { kind, cluster, .. } => {
            assert_eq!(kind, "Service");
            assert_eq!(cluster, "management");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_target_aborts_discovery() {
    let mut manifests = flagger_crds();
    manifests.push(canary("podinfo", "test", CANARY_UID, "istio"));
    let service = service(FakeFleet::new().cluster("management", manifests));

    let err = service.list_canary_objects(&request()).await.unwrap_err();

    assert!(matches!(
        err,
        DiscoveryError::TargetRef { ref kind, ref name, .. } if kind == "Deployment" && name == "podinfo"
    ));
}

#[tokio::test]
async fn test_missing_canary() {
    let service = service(FakeFleet::new().cluster("management", flagger_crds()));

    let err = service.list_canary_objects(&request()).await.unwrap_err();

    match err {
        DiscoveryError::Canary(source) => assert!(source.is_not_found()),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_kubernetes_provider_lists_core_kinds_only() {
    let mut manifests = flagger_crds();
    manifests.extend([
        canary("podinfo", "test", CANARY_UID, "kubernetes"),
        deployment("podinfo", "test", "uid-target", "ghcr.io/podinfo:6.1.0"),
        // Would only be found through an istio provider
        owned("networking.istio.io/v1alpha3", "VirtualService", "podinfo", "uid-vs"),
    ]);
    let service = service(FakeFleet::new().cluster("management", manifests));

    let response = service.list_canary_objects(&request()).await.unwrap();

    assert_eq!(names(&response.objects), vec!["Deployment/podinfo"]);
}

/// An nginx canary with both optional references and two owned deployments
fn nginx_fleet(owned_deployments: [(&str, &str); 2]) -> Vec<Value> {
    let mut podinfo = canary("podinfo", "test", CANARY_UID, "nginx");
    podinfo["spec"]["ingressRef"] = json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "name": "podinfo"
    });
    podinfo["spec"]["autoscalerRef"] = json!({
        "apiVersion": "autoscaling/v2",
        "kind": "HorizontalPodAutoscaler",
        "name": "podinfo"
    });

    let mut manifests = flagger_crds();
    manifests.extend([
        podinfo,
        deployment("podinfo", "test", "uid-target", "ghcr.io/podinfo:6.1.0"),
        object("autoscaling/v2", "HorizontalPodAutoscaler", "podinfo", "test", "uid-hpa"),
        object("networking.k8s.io/v1", "Ingress", "podinfo", "test", "uid-ingress"),
    ]);
    for (name, uid) in owned_deployments {
        manifests.push(owned_by(
            deployment(name, "test", uid, "ghcr.io/podinfo:6.1.0"),
            "podinfo",
            CANARY_UID,
        ));
    }
    manifests
}

#[tokio::test]
async fn test_references_precede_owned_objects_in_list_order() {
    let forward = service(FakeFleet::new().cluster(
        "management",
        nginx_fleet([("a-dep", "uid-a"), ("b-dep", "uid-b")]),
    ));
    let response = forward.list_canary_objects(&request()).await.unwrap();
    assert_eq!(
        names(&response.objects),
        vec![
            "Deployment/podinfo",
            "Ingress/podinfo",
            "HorizontalPodAutoscaler/podinfo",
            "Deployment/a-dep",
            "Deployment/b-dep",
        ]
    );

    let reversed = service(FakeFleet::new().cluster(
        "management",
        nginx_fleet([("b-dep", "uid-b"), ("a-dep", "uid-a")]),
    ));
    let response = reversed.list_canary_objects(&request()).await.unwrap();
    assert_eq!(
        names(&response.objects),
        vec![
            "Deployment/podinfo",
            "Ingress/podinfo",
            "HorizontalPodAutoscaler/podinfo",
            "Deployment/b-dep",
            "Deployment/a-dep",
        ]
    );
    assert!(response.errors.is_empty());
}
