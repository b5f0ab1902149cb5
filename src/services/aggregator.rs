//! Fan-out list across every cluster in the pool
//!
//! The same list call is issued concurrently against each cluster and the
//! results are merged by cluster name. One cluster failing never affects the
//! items collected from the others.
//!
//! Pagination state is kept per cluster. The continuation token handed back to
//! callers is the URL-safe base64 of a JSON object mapping each cluster that
//! still has more items to its own server token. An empty map encodes as the
//! empty string, which means "no more pages".

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use futures::future::join_all;
use kube::Resource;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use crate::kube::{ClientError, ClusterClient, ListOptions, parse_object, resource_gvk};

/// Failure of one cluster's list call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterError {
    pub cluster: String,
    pub error: ClientError,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("invalid continue token: {0}")]
    InvalidContinueToken(String),

    #[error("list failed on {} cluster(s): {}", .0.len(), summarize(.0))]
    Clusters(Vec<ClusterError>),
}

fn summarize(errors: &[ClusterError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.cluster, e.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Merged result of a clustered list
#[derive(Debug, Clone)]
pub struct AggregatedList<K> {
    /// Items per cluster; every cluster in the pool has an entry
    pub items: BTreeMap<String, Vec<K>>,
    /// Opaque token to resume the query, empty when complete
    pub continue_token: String,
    pub errors: Vec<ClusterError>,
}

/// List `K` on every cluster
///
/// With `ignore_cluster_errors` the per-cluster failures are returned next to
/// the items. Without it, any failure turns the whole call into an error, but
/// only after every cluster has answered.
pub async fn clustered_list<K>(
    client: &dyn ClusterClient,
    options: &ListOptions,
    ignore_cluster_errors: bool,
) -> Result<AggregatedList<K>, AggregateError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let gvk = resource_gvk::<K>();
    let resume = match options.continue_token.as_deref() {
        Some(token) if !token.is_empty() => Some(decode_continue_token(token)?),
        _ => None,
    };

    let clusters = client.cluster_names();
    let calls = clusters.iter().map(|cluster| {
        let gvk = &gvk;
        let resume = &resume;
        async move {
            let continue_token = match resume {
                Some(tokens) => match tokens.get(cluster) {
                    Some(token) => Some(token.clone()),
                    // Cluster finished on an earlier page
                    None => return (cluster.clone(), None),
                },
                None => None,
            };
            let page_options = ListOptions {
                limit: options.limit,
                continue_token,
            };
            let result = client.list(cluster, gvk, &page_options).await;
            (cluster.clone(), Some(result))
        }
    });

    let mut items = BTreeMap::new();
    let mut next_tokens = BTreeMap::new();
    let mut errors = Vec::new();

    for (cluster, result) in join_all(calls).await {
        let page = match result {
            None => {
                items.insert(cluster, Vec::new());
                continue;
            }
            Some(Ok(page)) => page,
            Some(Err(error)) => {
                tracing::debug!("Listing {} failed on cluster '{}': {}", gvk.kind, cluster, error);
                errors.push(ClusterError {
                    cluster: cluster.clone(),
                    error,
                });
                items.insert(cluster, Vec::new());
                continue;
            }
        };

        let mut parsed = Vec::with_capacity(page.items.len());
        let mut decode_error = None;
        for object in page.items {
            match parse_object::<K>(object) {
                Ok(item) => parsed.push(item),
                Err(error) => {
                    decode_error = Some(error);
                    break;
                }
            }
        }

        if let Some(error) = decode_error {
            errors.push(ClusterError {
                cluster: cluster.clone(),
                error,
            });
            items.insert(cluster, Vec::new());
            continue;
        }

        if let Some(token) = page.continue_token {
            next_tokens.insert(cluster.clone(), token);
        }
        items.insert(cluster, parsed);
    }

    if !errors.is_empty() && !ignore_cluster_errors {
        return Err(AggregateError::Clusters(errors));
    }

    Ok(AggregatedList {
        items,
        continue_token: encode_continue_token(&next_tokens),
        errors,
    })
}

/// Encode per-cluster continuation tokens into one opaque string
pub fn encode_continue_token(tokens: &BTreeMap<String, String>) -> String {
    if tokens.is_empty() {
        return String::new();
    }
    // A map of strings always serializes
    let json = serde_json::to_vec(tokens).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a token produced by [`encode_continue_token`]
pub fn decode_continue_token(token: &str) -> Result<BTreeMap<String, String>, AggregateError> {
    if token.is_empty() {
        return Ok(BTreeMap::new());
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| AggregateError::InvalidContinueToken(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| AggregateError::InvalidContinueToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::{ListPage, MockClusterClient};
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::core::DynamicObject;
    use serde_json::json;

    fn config_map(name: &str) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": "default"}
        }))
        .unwrap()
    }

    #[test]
    fn test_continue_token_encoding() {
        assert_eq!(encode_continue_token(&BTreeMap::new()), "");
        assert!(decode_continue_token("").unwrap().is_empty());

        let tokens = BTreeMap::from([
            ("alpha".to_string(), "abc".to_string()),
            ("gamma".to_string(), "xyz".to_string()),
        ]);
        let encoded = encode_continue_token(&tokens);
        assert!(!encoded.contains('='));
        assert_eq!(decode_continue_token(&encoded).unwrap(), tokens);
    }

    #[test]
    fn test_malformed_continue_token() {
        assert!(matches!(
            decode_continue_token("not base64!"),
            Err(AggregateError::InvalidContinueToken(_))
        ));
        let not_json = URL_SAFE_NO_PAD.encode("[1,2,3]");
        assert!(decode_continue_token(&not_json).is_err());
    }

    #[tokio::test]
    async fn test_strict_mode_fails_after_collecting_everything() {
        let mut client = MockClusterClient::new();
        client
            .expect_cluster_names()
            .returning(|| vec!["a".to_string(), "b".to_string()]);
        client.expect_list().times(2).returning(|cluster, _, _| match cluster {
            "a" => Ok(ListPage {
                items: vec![config_map("one")],
                continue_token: None,
            }),
            _ => Err(ClientError::Transport("timeout".to_string())),
        });

        let result = clustered_list::<ConfigMap>(&client, &ListOptions::default(), false).await;
        match result {
            Err(AggregateError::Clusters(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].cluster, "b");
            }
            other => panic!("expected cluster errors, got {:?}", other.map(|l| l.items)),
        }
    }

    #[tokio::test]
    async fn test_resume_only_queries_unfinished_clusters() {
        let mut client = MockClusterClient::new();
        client
            .expect_cluster_names()
            .returning(|| vec!["a".to_string(), "b".to_string()]);
        client
            .expect_list()
            .times(1)
            .withf(|cluster, _, options| {
                cluster == "b" && options.continue_token.as_deref() == Some("b-2")
            })
            .returning(|_, _, _| {
                Ok(ListPage {
                    items: vec![config_map("last")],
                    continue_token: None,
                })
            });

        let token = encode_continue_token(&BTreeMap::from([("b".to_string(), "b-2".to_string())]));
        let options = ListOptions {
            limit: Some(1),
            continue_token: Some(token),
        };
        let list = clustered_list::<ConfigMap>(&client, &options, true).await.unwrap();

        assert_eq!(list.items.get("a").map(Vec::len), Some(0));
        assert_eq!(list.items.get("b").map(Vec::len), Some(1));
        assert_eq!(list.continue_token, "");
    }

    #[tokio::test]
    async fn test_undecodable_items_are_a_cluster_error() {
        let mut client = MockClusterClient::new();
        client.expect_cluster_names().returning(|| vec!["a".to_string()]);
        client.expect_list().returning(|_, _, _| {
            Ok(ListPage {
                items: vec![serde_json::from_value(json!({
                    "metadata": {"name": "weird"},
                    "data": "not-a-map"
                }))
                .unwrap()],
                continue_token: None,
            })
        });

        let list = clustered_list::<ConfigMap>(&client, &ListOptions::default(), true)
            .await
            .unwrap();
        assert_eq!(list.errors.len(), 1);
        assert!(matches!(list.errors[0].error, ClientError::Decode(_)));
        assert_eq!(list.items.get("a").map(Vec::len), Some(0));
    }
}
