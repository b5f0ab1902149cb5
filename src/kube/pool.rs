//! kube-rs backed cluster pool

use async_trait::async_trait;
use kube::api::{Api, ListParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::discovery::{self, Scope};
use kube::Client;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use super::client::{ClientError, ClusterClient, ListOptions, ListPage};

/// A pool of kube-rs clients keyed by cluster name
///
/// Kinds are resolved through API discovery the first time they are used on a
/// cluster, so the same GroupVersionKind may map to different plurals or
/// scopes on different clusters.
pub struct KubeClusterPool {
    clients: BTreeMap<String, Client>,
    resolved: Mutex<HashMap<String, (ApiResource, bool)>>,
}

impl KubeClusterPool {
    pub fn new(clients: BTreeMap<String, Client>) -> Self {
        Self {
            clients,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    fn client(&self, cluster: &str) -> Result<&Client, ClientError> {
        self.clients
            .get(cluster)
            .ok_or_else(|| ClientError::UnknownCluster(cluster.to_string()))
    }

    /// Resolve a kind to its API resource and whether it is namespaced
    async fn resolve(
        &self,
        cluster: &str,
        client: &Client,
        gvk: &GroupVersionKind,
    ) -> Result<(ApiResource, bool), ClientError> {
        let key = format!("{}/{}/{}", cluster, gvk.api_version(), gvk.kind);

        if let Some(hit) = self
            .resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
        {
            return Ok(hit);
        }

        let (resource, capabilities) = discovery::pinned_kind(client, gvk)
            .await
            .map_err(|e| classify_discovery_error(gvk, e))?;
        let namespaced = matches!(capabilities.scope, Scope::Namespaced);

        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, (resource.clone(), namespaced));

        Ok((resource, namespaced))
    }
}

#[async_trait]
impl ClusterClient for KubeClusterPool {
    fn cluster_names(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    async fn get(
        &self,
        cluster: &str,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, ClientError> {
        let client = self.client(cluster)?;
        let (resource, namespaced) = self.resolve(cluster, client, gvk).await?;

        let api: Api<DynamicObject> = if namespaced {
            Api::namespaced_with(client.clone(), namespace, &resource)
        } else {
            Api::all_with(client.clone(), &resource)
        };

        tracing::debug!("GET {}/{} {}/{} on {}", gvk.api_version(), gvk.kind, namespace, name, cluster);

        api.get(name).await.map_err(classify_error)
    }

    async fn list(
        &self,
        cluster: &str,
        gvk: &GroupVersionKind,
        options: &ListOptions,
    ) -> Result<ListPage, ClientError> {
        let client = self.client(cluster)?;
        let (resource, _) = self.resolve(cluster, client, gvk).await?;
        let api: Api<DynamicObject> = Api::all_with(client.clone(), &resource);

        let mut params = ListParams::default();
        if let Some(limit) = options.limit {
            params = params.limit(limit);
        }
        if let Some(token) = options.continue_token.as_deref() {
            params = params.continue_token(token);
        }

        tracing::debug!("LIST {}/{} on {}", gvk.api_version(), gvk.kind, cluster);

        let list = api.list(&params).await.map_err(classify_error)?;

        Ok(ListPage {
            continue_token: list.metadata.continue_.filter(|t| !t.is_empty()),
            items: list.items,
        })
    }
}

fn classify_error(err: kube::Error) -> ClientError {
    let message = err.to_string();
    match &err {
        kube::Error::Api(response) if response.code == 404 => ClientError::NotFound(message),
        kube::Error::Api(response) if response.code == 403 => ClientError::Forbidden(message),
        _ => ClientError::Transport(message),
    }
}

/// Discovery failures mean the cluster does not serve the kind at that version
fn classify_discovery_error(gvk: &GroupVersionKind, err: kube::Error) -> ClientError {
    match &err {
        kube::Error::Api(response) if response.code == 403 => {
            ClientError::Forbidden(err.to_string())
        }
        kube::Error::Api(response) if response.code == 404 => ClientError::NoKindMatch {
            kind: gvk.kind.clone(),
            api_version: gvk.api_version(),
        },
        kube::Error::Discovery(_) => ClientError::NoKindMatch {
            kind: gvk.kind.clone(),
            api_version: gvk.api_version(),
        },
        _ => ClientError::Transport(err.to_string()),
    }
}
