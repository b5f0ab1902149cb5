//! Configuration schema definitions
//!
//! Defines the structure of configuration files using serde for serialization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Kubeconfig contexts forming the fleet; empty means the current context
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<String>,

    /// CRD availability refresh settings
    #[serde(default)]
    pub crd_refresh: CrdRefreshConfig,

    /// Items per cluster for list commands (0 = no limit)
    #[serde(default)]
    pub default_page_size: u32,

    /// Output format for command results
    #[serde(default)]
    pub output: OutputFormat,
}

/// CRD availability refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrdRefreshConfig {
    #[serde(default)]
    pub mode: RefreshMode,

    /// Poll interval (e.g., "30s", "1m", "500ms")
    #[serde(default = "default_interval")]
    pub interval: String,
}

impl Default for CrdRefreshConfig {
    fn default() -> Self {
        Self {
            mode: RefreshMode::default(),
            interval: default_interval(),
        }
    }
}

fn default_interval() -> String {
    "30s".to_string()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RefreshMode {
    /// Refresh in the background
    #[default]
    Poll,
    /// Refresh before every read
    OnDemand,
}

impl FromStr for RefreshMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "poll" => Ok(RefreshMode::Poll),
            "onDemand" | "on-demand" => Ok(RefreshMode::OnDemand),
            other => Err(anyhow::anyhow!(
                "Unknown refresh mode '{}' (expected 'poll' or 'onDemand')",
                other
            )),
        }
    }
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshMode::Poll => f.write_str("poll"),
            RefreshMode::OnDemand => f.write_str("onDemand"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            other => Err(anyhow::anyhow!(
                "Unknown output format '{}' (expected 'yaml' or 'json')",
                other
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Yaml => f.write_str("yaml"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}
