//! Accessors for untyped Kubernetes objects
//!
//! Discovery works across arbitrary kinds, so ownership, identity, status and
//! container images are all read straight from the object JSON.

use kube::core::{DynamicObject, GroupVersionKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Split an apiVersion string into (group, version)
///
/// Core resources have no group: "v1" yields ("", "v1").
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// GroupVersionKind carried in the object's own type metadata
///
/// List responses for built-in kinds usually omit apiVersion and kind on the
/// items, so callers should fall back to the kind they asked for.
pub fn object_gvk(object: &DynamicObject) -> Option<GroupVersionKind> {
    let types = object.types.as_ref()?;
    if types.kind.is_empty() || types.api_version.is_empty() {
        return None;
    }
    let (group, version) = split_api_version(&types.api_version);
    Some(GroupVersionKind::gvk(group, version, &types.kind))
}

pub fn object_uid(object: &DynamicObject) -> Option<&str> {
    object.metadata.uid.as_deref().filter(|uid| !uid.is_empty())
}

/// True if any owner reference of the object points at `owner_uid`
pub fn is_owned_by(object: &DynamicObject, owner_uid: &str) -> bool {
    object
        .metadata
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.uid == owner_uid))
}

/// Walk a path of object keys
pub fn nested<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

pub fn nested_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    nested(value, path).and_then(|v| v.as_str())
}

pub fn nested_i64(value: &Value, path: &[&str]) -> Option<i64> {
    nested(value, path).and_then(|v| v.as_i64())
}

/// Images of every container in a pod template (`spec.template.spec.containers`)
pub fn container_images(object: &DynamicObject) -> Vec<String> {
    nested(&object.data, &["spec", "template", "spec", "containers"])
        .and_then(|containers| containers.as_array())
        .map(|containers| {
            containers
                .iter()
                .filter_map(|c| c.get("image").and_then(|i| i.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// A status condition as reported by the object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_transition_time: String,
}

/// Conditions listed under `status.conditions`, skipping malformed entries
pub fn object_conditions(object: &DynamicObject) -> Vec<ObjectCondition> {
    nested(&object.data, &["status", "conditions"])
        .and_then(|c| c.as_array())
        .map(|conditions| {
            conditions
                .iter()
                .filter_map(|c| serde_json::from_value(c.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Find a condition of the given type
pub fn find_condition<'a>(
    conditions: &'a [ObjectCondition],
    type_: &str,
) -> Option<&'a ObjectCondition> {
    conditions.iter().find(|c| c.type_ == type_)
}
