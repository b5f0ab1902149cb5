//! Configuration loading and merging logic
//!
//! Precedence (highest to lowest): environment variables, the root config file,
//! built-in defaults. Command-line flags are applied on top by the binary.

use super::{
    paths,
    schema::{Config, OutputFormat, RefreshMode},
};
use crate::services::RefreshPolicy;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

pub const CONTEXTS_ENV: &str = "CANARY_FLEET_CONTEXTS";
pub const CRD_REFRESH_ENV: &str = "CANARY_FLEET_CRD_REFRESH";
pub const OUTPUT_ENV: &str = "CANARY_FLEET_OUTPUT";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the root config file with env overrides
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load() -> Result<Config> {
        Self::load_from(&paths::root_config_path())
    }

    /// Load configuration from a specific file with env overrides
    pub fn load_from(path: &Path) -> Result<Config> {
        let config = if path.exists() {
            Self::load_file(path)?
        } else {
            Config::default()
        };

        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Load configuration from a file
    pub fn load_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check that a config file parses and its values are usable
    pub fn validate(path: &Path) -> Result<()> {
        let config = Self::load_from(path)?;
        let interval = parse_duration(&config.crd_refresh.interval)
            .with_context(|| format!("Invalid crdRefresh.interval '{}'", config.crd_refresh.interval))?;
        if interval.is_zero() {
            anyhow::bail!("crdRefresh.interval must be greater than zero");
        }
        if config.contexts.iter().any(|c| c.trim().is_empty()) {
            anyhow::bail!("contexts must not contain empty names");
        }
        Ok(())
    }

    /// Apply overrides read through `lookup` (the process environment in practice)
    pub fn apply_overrides(
        mut config: Config,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Config> {
        if let Some(contexts) = lookup(CONTEXTS_ENV) {
            config.contexts = split_list(&contexts);
        }

        if let Some(mode) = lookup(CRD_REFRESH_ENV) {
            config.crd_refresh.mode = mode
                .parse()
                .with_context(|| format!("Invalid {}", CRD_REFRESH_ENV))?;
        }

        if let Some(output) = lookup(OUTPUT_ENV) {
            config.output = output
                .parse::<OutputFormat>()
                .with_context(|| format!("Invalid {}", OUTPUT_ENV))?;
        }

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Save root configuration
    pub fn save_root(config: &Config) -> Result<()> {
        Self::save(config, &paths::root_config_path())
    }
}

/// Refresh policy described by the configuration
pub fn refresh_policy(config: &Config) -> Result<RefreshPolicy> {
    match config.crd_refresh.mode {
        RefreshMode::OnDemand => Ok(RefreshPolicy::OnDemand),
        RefreshMode::Poll => {
            let interval = parse_duration(&config.crd_refresh.interval)?;
            if interval.is_zero() {
                anyhow::bail!("crdRefresh.interval must be greater than zero");
            }
            Ok(RefreshPolicy::Poll(interval))
        }
    }
}

/// Parse duration string (e.g., "30s", "1m", "500ms")
pub fn parse_duration(s: &str) -> Result<Duration> {
    if let Some(ms) = s.strip_suffix("ms") {
        let ms: u64 = ms.parse().context("Invalid milliseconds in duration")?;
        Ok(Duration::from_millis(ms))
    } else if let Some(secs) = s.strip_suffix('s') {
        let secs: u64 = secs.parse().context("Invalid seconds in duration")?;
        Ok(Duration::from_secs(secs))
    } else if let Some(mins) = s.strip_suffix('m') {
        let mins: u64 = mins.parse().context("Invalid minutes in duration")?;
        let secs = mins
            .checked_mul(60)
            .with_context(|| format!("Duration out of range: {}", s))?;
        Ok(Duration::from_secs(secs))
    } else if let Some(hours) = s.strip_suffix('h') {
        let hours: u64 = hours.parse().context("Invalid hours in duration")?;
        let secs = hours
            .checked_mul(3600)
            .with_context(|| format!("Duration out of range: {}", s))?;
        Ok(Duration::from_secs(secs))
    } else {
        anyhow::bail!("Invalid duration format: {}", s)
    }
}

/// Comma separated list, ignoring blanks
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
