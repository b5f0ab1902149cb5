//! Deployment strategy classification

use serde::{Deserialize, Serialize};
use std::fmt;

use super::flagger::Canary;

/// How a canary rolls out, derived from its analysis configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStrategy {
    /// Weighted traffic shifting
    Canary,
    BlueGreen,
    BlueGreenMirror,
    AbTesting,
    NoAnalysis,
}

impl DeploymentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStrategy::Canary => "canary",
            DeploymentStrategy::BlueGreen => "blue-green",
            DeploymentStrategy::BlueGreenMirror => "blue-green-mirror",
            DeploymentStrategy::AbTesting => "ab-testing",
            DeploymentStrategy::NoAnalysis => "no-analysis",
        }
    }

    /// Classify a canary. Rules are checked in order and the first match wins.
    pub fn for_canary(canary: &Canary) -> Self {
        if canary.spec.skip_analysis {
            return DeploymentStrategy::NoAnalysis;
        }

        let (iterations, mirror, has_match) = canary
            .spec
            .analysis
            .as_ref()
            .map(|a| (a.iterations, a.mirror, !a.match_.is_empty()))
            .unwrap_or_default();
        let has_iterations = iterations > 0;

        if mirror && has_iterations {
            DeploymentStrategy::BlueGreenMirror
        } else if has_iterations && !has_match {
            DeploymentStrategy::BlueGreen
        } else if has_iterations {
            DeploymentStrategy::AbTesting
        } else {
            DeploymentStrategy::Canary
        }
    }
}

impl fmt::Display for DeploymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
