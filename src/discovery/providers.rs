//! Kinds searched for canary-owned objects
//!
//! Every canary gets the core workload kinds. The traffic provider adds the
//! kinds Flagger generates for that mesh or ingress controller. Providers that
//! route through plain Services resolve to no extra kinds.

use kube::core::GroupVersionKind;

/// A kind identified by API group, version and kind name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindRef {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
}

impl KindRef {
    const fn new(group: &'static str, version: &'static str, kind: &'static str) -> Self {
        Self {
            group,
            version,
            kind,
        }
    }

    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(self.group, self.version, self.kind)
    }
}

/// Listed for every canary, in this order
pub const CORE_KINDS: &[KindRef] = &[
    KindRef::new("", "v1", "Service"),
    KindRef::new("apps", "v1", "Deployment"),
    KindRef::new("autoscaling", "v2", "HorizontalPodAutoscaler"),
];

const ISTIO: &[KindRef] = &[
    KindRef::new("networking.istio.io", "v1alpha3", "DestinationRule"),
    KindRef::new("networking.istio.io", "v1alpha3", "VirtualService"),
];
const SMI_V1ALPHA1: &[KindRef] = &[KindRef::new("split.smi-spec.io", "v1alpha1", "TrafficSplit")];
const SMI_V1ALPHA2: &[KindRef] = &[KindRef::new("split.smi-spec.io", "v1alpha2", "TrafficSplit")];
const SMI_V1ALPHA3: &[KindRef] = &[KindRef::new("split.smi-spec.io", "v1alpha3", "TrafficSplit")];
const APPMESH_V1BETA1: &[KindRef] = &[
    KindRef::new("appmesh.k8s.aws", "v1beta1", "VirtualNode"),
    KindRef::new("appmesh.k8s.aws", "v1beta1", "VirtualService"),
];
const APPMESH_V1BETA2: &[KindRef] = &[
    KindRef::new("appmesh.k8s.aws", "v1beta2", "VirtualNode"),
    KindRef::new("appmesh.k8s.aws", "v1beta2", "VirtualRouter"),
    KindRef::new("appmesh.k8s.aws", "v1beta2", "VirtualService"),
];
const CONTOUR: &[KindRef] = &[KindRef::new("projectcontour.io", "v1", "HTTPProxy")];
const GLOO: &[KindRef] = &[
    KindRef::new("gateway.solo.io", "v1", "RouteTable"),
    KindRef::new("gloo.solo.io", "v1", "Upstream"),
];
const INGRESS: &[KindRef] = &[KindRef::new("networking.k8s.io", "v1", "Ingress")];
const TRAEFIK: &[KindRef] = &[KindRef::new("traefik.containo.us", "v1alpha1", "TraefikService")];
const KUMA: &[KindRef] = &[KindRef::new("kuma.io", "v1alpha1", "TrafficRoute")];
const GATEWAY_V1ALPHA2: &[KindRef] =
    &[KindRef::new("gateway.networking.k8s.io", "v1alpha2", "HTTPRoute")];
const GATEWAY_V1BETA1: &[KindRef] =
    &[KindRef::new("gateway.networking.k8s.io", "v1beta1", "HTTPRoute")];
const GATEWAY_V1: &[KindRef] = &[KindRef::new("gateway.networking.k8s.io", "v1", "HTTPRoute")];
const APISIX: &[KindRef] = &[KindRef::new("apisix.apache.org", "v2", "ApisixRoute")];

/// Provider name to the extra kinds it generates
pub const PROVIDER_KINDS: &[(&str, &[KindRef])] = &[
    ("kubernetes", &[]),
    ("istio", ISTIO),
    ("linkerd", SMI_V1ALPHA2),
    ("osm", SMI_V1ALPHA2),
    ("smi", SMI_V1ALPHA2),
    ("smi:v1alpha1", SMI_V1ALPHA1),
    ("smi:v1alpha2", SMI_V1ALPHA2),
    ("smi:v1alpha3", SMI_V1ALPHA3),
    ("appmesh", APPMESH_V1BETA1),
    ("appmesh:v1beta2", APPMESH_V1BETA2),
    ("contour", CONTOUR),
    ("gloo", GLOO),
    ("nginx", INGRESS),
    ("skipper", INGRESS),
    ("traefik", TRAEFIK),
    ("kuma", KUMA),
    ("gatewayapi", GATEWAY_V1BETA1),
    ("gatewayapi:v1alpha2", GATEWAY_V1ALPHA2),
    ("gatewayapi:v1beta1", GATEWAY_V1BETA1),
    ("gatewayapi:v1", GATEWAY_V1),
    ("apisix", APISIX),
];

/// Extra kinds for a provider; unknown and empty names resolve to none
pub fn provider_kinds(provider: &str) -> &'static [KindRef] {
    PROVIDER_KINDS
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, kinds)| *kinds)
        .unwrap_or_else(|| {
            if !provider.is_empty() {
                tracing::debug!("No extra kinds registered for provider '{}'", provider);
            }
            &[]
        })
}

/// Core kinds followed by the provider's kinds
pub fn candidate_kinds(provider: &str) -> Vec<GroupVersionKind> {
    CORE_KINDS
        .iter()
        .chain(provider_kinds(provider))
        .map(KindRef::gvk)
        .collect()
}
