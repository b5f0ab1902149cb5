//! Readiness of arbitrary Kubernetes objects
//!
//! Reduces an object's status block to a single value. Workload kinds with
//! well-known status fields get dedicated rules; everything else is judged by
//! its conditions.

use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::kube::object::{
    ObjectCondition, find_condition, nested, nested_i64, nested_str, object_conditions,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectStatus {
    Ready,
    NotReady,
    InProgress,
    #[default]
    Unknown,
}

impl ObjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectStatus::Ready => "Ready",
            ObjectStatus::NotReady => "NotReady",
            ObjectStatus::InProgress => "InProgress",
            ObjectStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readiness plus a short human explanation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResult {
    pub status: ObjectStatus,
    pub message: String,
}

impl StatusResult {
    fn new(status: ObjectStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Compute readiness for `object` of kind `kind`
pub fn compute_status(object: &DynamicObject, kind: &str) -> StatusResult {
    if object.metadata.deletion_timestamp.is_some() {
        return StatusResult::new(ObjectStatus::InProgress, "Resource scheduled for deletion");
    }

    let status = object.data.get("status");

    if let (Some(generation), Some(observed)) = (
        object.metadata.generation,
        nested_i64(&object.data, &["status", "observedGeneration"]),
    ) {
        if observed < generation {
            return StatusResult::new(
                ObjectStatus::InProgress,
                format!("Generation {} not yet observed (at {})", generation, observed),
            );
        }
    }

    match kind {
        "Deployment" => deployment_status(object, status.is_some()),
        "Service" => service_status(object),
        _ => condition_status(&object_conditions(object)),
    }
}

fn deployment_status(object: &DynamicObject, has_status: bool) -> StatusResult {
    if !has_status {
        return StatusResult::new(ObjectStatus::Unknown, "Deployment has no status");
    }

    let conditions = object_conditions(object);
    let deadline_exceeded = find_condition(&conditions, "Progressing")
        .is_some_and(|c| c.reason == "ProgressDeadlineExceeded");
    if deadline_exceeded {
        return StatusResult::new(ObjectStatus::NotReady, "Progress deadline exceeded");
    }

    let data = &object.data;
    let desired = nested_i64(data, &["spec", "replicas"]).unwrap_or(1);
    let replicas = nested_i64(data, &["status", "replicas"]).unwrap_or(0);
    let updated = nested_i64(data, &["status", "updatedReplicas"]).unwrap_or(0);
    let ready = nested_i64(data, &["status", "readyReplicas"]).unwrap_or(0);
    let available = nested_i64(data, &["status", "availableReplicas"]).unwrap_or(0);

    if updated < desired {
        return StatusResult::new(
            ObjectStatus::InProgress,
            format!("Updated: {}/{}", updated, desired),
        );
    }
    if replicas > updated {
        return StatusResult::new(
            ObjectStatus::InProgress,
            format!("Pending termination: {}", replicas - updated),
        );
    }
    if available < updated || ready < updated {
        return StatusResult::new(
            ObjectStatus::InProgress,
            format!("Available: {}/{}", available, updated),
        );
    }

    if let Some(condition) = find_condition(&conditions, "Available") {
        if condition.status == "False" {
            return StatusResult::new(ObjectStatus::NotReady, condition.message.clone());
        }
    }

    StatusResult::new(
        ObjectStatus::Ready,
        format!("Deployment is available. Replicas: {}", replicas),
    )
}

fn service_status(object: &DynamicObject) -> StatusResult {
    let service_type = nested_str(&object.data, &["spec", "type"]).unwrap_or("ClusterIP");
    if service_type == "LoadBalancer" {
        let has_ingress = nested(&object.data, &["status", "loadBalancer", "ingress"])
            .and_then(|i| i.as_array())
            .is_some_and(|i| !i.is_empty());
        if !has_ingress {
            return StatusResult::new(ObjectStatus::InProgress, "Pending load balancer address");
        }
    }
    StatusResult::new(ObjectStatus::Ready, "Service is ready")
}

fn condition_status(conditions: &[ObjectCondition]) -> StatusResult {
    let is_true = |type_: &str| find_condition(conditions, type_).filter(|c| c.status == "True");

    if let Some(stalled) = is_true("Stalled") {
        return StatusResult::new(ObjectStatus::NotReady, stalled.message.clone());
    }
    if let Some(reconciling) = is_true("Reconciling") {
        return StatusResult::new(ObjectStatus::InProgress, reconciling.message.clone());
    }

    match find_condition(conditions, "Ready") {
        Some(ready) if ready.status == "True" => {
            StatusResult::new(ObjectStatus::Ready, ready.message.clone())
        }
        Some(ready) if ready.status == "False" => {
            StatusResult::new(ObjectStatus::NotReady, ready.message.clone())
        }
        Some(ready) => StatusResult::new(ObjectStatus::Unknown, ready.message.clone()),
        None => StatusResult::new(ObjectStatus::Ready, "Resource is current"),
    }
}

/// Conditions to report for an object
///
/// Objects without conditions of their own get a synthesized Ready condition
/// when they are ready, so consumers always have something to display.
pub fn report_conditions(object: &DynamicObject, result: &StatusResult) -> Vec<ObjectCondition> {
    let conditions = object_conditions(object);
    if !conditions.is_empty() || result.status != ObjectStatus::Ready {
        return conditions;
    }

    vec![ObjectCondition {
        type_: "Ready".to_string(),
        status: "True".to_string(),
        reason: "Current".to_string(),
        message: result.message.clone(),
        last_transition_time: String::new(),
    }]
}
