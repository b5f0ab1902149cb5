//! Kubernetes client module
//!
//! Builds the fleet of cluster clients used by every query. A cluster is a
//! kubeconfig context; the context name doubles as the cluster name reported
//! in responses and error records.

mod client;
pub mod object;
mod pool;

pub use client::{ClientError, ClusterClient, ListOptions, ListPage, parse_object, resource_gvk};
#[cfg(test)]
pub use client::MockClusterClient;
pub use pool::KubeClusterPool;

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::collections::BTreeMap;

/// Create a client bound to a specific kubeconfig context
pub async fn create_client_for_context(context: &str) -> Result<Client> {
    let kubeconfig = Kubeconfig::read().context("Failed to read kubeconfig")?;
    let options = KubeConfigOptions {
        context: Some(context.to_string()),
        ..Default::default()
    };

    let config = Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .with_context(|| format!("Failed to load kubeconfig context '{}'", context))?;

    Client::try_from(config).with_context(|| format!("Failed to build client for '{}'", context))
}

/// Get the current kubeconfig context name
///
/// Falls back to "default" when running in-cluster without a kubeconfig.
pub fn current_context() -> String {
    Kubeconfig::read()
        .ok()
        .and_then(|kubeconfig| kubeconfig.current_context)
        .unwrap_or_else(|| "default".to_string())
}

/// Connect to every context in `contexts`, or to the current context if empty
///
/// A context that cannot be loaded is logged and left out of the pool; the
/// call only fails when no cluster at all could be connected.
pub async fn connect_fleet(contexts: &[String]) -> Result<KubeClusterPool> {
    let mut clients = BTreeMap::new();

    if contexts.is_empty() {
        let name = current_context();
        let config = Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration")?;
        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
        tracing::debug!("Connected to current context '{}'", name);
        clients.insert(name, client);
    } else {
        for context in contexts {
            match create_client_for_context(context).await {
                Ok(client) => {
                    tracing::debug!("Connected to context '{}'", context);
                    clients.insert(context.clone(), client);
                }
                Err(e) => tracing::warn!("Skipping context '{}': {:#}", context, e),
            }
        }
    }

    if clients.is_empty() {
        anyhow::bail!("No cluster could be connected");
    }

    Ok(KubeClusterPool::new(clients))
}
