//! Resource models
//!
//! - `flagger` - Canary and MetricTemplate custom resources
//! - `strategy` - deployment strategy classification
//! - `responses` - records returned by the query service

pub mod flagger;
pub mod responses;
pub mod strategy;

pub use flagger::{Canary, CanarySpec, MetricTemplate, MetricTemplateSpec};
pub use strategy::DeploymentStrategy;
