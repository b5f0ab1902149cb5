//! Cluster client boundary
//!
//! Everything above this module talks to clusters through [`ClusterClient`],
//! which keeps the query logic independent of how connections, credentials and
//! impersonation are managed.

use async_trait::async_trait;
use kube::Resource;
use kube::core::{DynamicObject, GroupVersionKind};
use serde::de::DeserializeOwned;

/// Options for a single list call against one cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Maximum number of items to return
    pub limit: Option<u32>,
    /// Opaque continuation token from a previous page
    pub continue_token: Option<String>,
}

/// One page of objects returned by a list call
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub items: Vec<DynamicObject>,
    /// Present when the server has more items to return
    pub continue_token: Option<String>,
}

/// Classified failure of a single cluster call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("no matches for kind \"{kind}\" in version \"{api_version}\"")]
    NoKindMatch { kind: String, api_version: String },

    #[error("cluster not found: {0}")]
    UnknownCluster(String),

    #[error("failed to decode object: {0}")]
    Decode(String),

    #[error("{0}")]
    Transport(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, ClientError::Forbidden(_))
    }

    pub fn is_no_kind_match(&self) -> bool {
        matches!(self, ClientError::NoKindMatch { .. })
    }
}

/// Access to a pool of named clusters
///
/// Implementations own connection management. All calls are cluster-scoped by
/// name; `list` always spans every namespace.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Names of every cluster currently in the pool
    fn cluster_names(&self) -> Vec<String>;

    /// Fetch a single object
    async fn get(
        &self,
        cluster: &str,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, ClientError>;

    /// List objects of one kind across all namespaces
    async fn list(
        &self,
        cluster: &str,
        gvk: &GroupVersionKind,
        options: &ListOptions,
    ) -> Result<ListPage, ClientError>;
}

/// GroupVersionKind of a statically typed resource
pub fn resource_gvk<K>() -> GroupVersionKind
where
    K: Resource<DynamicType = ()>,
{
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}

/// Parse a dynamic object into a typed resource
pub fn parse_object<K: DeserializeOwned>(object: DynamicObject) -> Result<K, ClientError> {
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|e| ClientError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::Deployment;
    use serde_json::json;

    #[test]
    fn test_resource_gvk_for_deployment() {
        let gvk = resource_gvk::<Deployment>();
        assert_eq!(gvk.group, "apps");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.kind, "Deployment");
    }

    #[test]
    fn test_parse_object_into_deployment() {
        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "podinfo", "namespace": "test"},
            "spec": {
                "selector": {"matchLabels": {"app": "podinfo"}},
                "template": {"spec": {"containers": [{"name": "podinfo", "image": "podinfo:6.0.0"}]}}
            }
        }))
        .unwrap();

        let deployment: Deployment = parse_object(object).unwrap();
        assert_eq!(deployment.metadata.name.as_deref(), Some("podinfo"));
    }

    #[test]
    fn test_error_classification_helpers() {
        assert!(ClientError::NotFound("x".into()).is_not_found());
        assert!(ClientError::Forbidden("x".into()).is_forbidden());
        assert!(
            ClientError::NoKindMatch {
                kind: "TrafficSplit".into(),
                api_version: "split.smi-spec.io/v1alpha2".into(),
            }
            .is_no_kind_match()
        );
        assert!(!ClientError::Transport("x".into()).is_not_found());
    }
}
