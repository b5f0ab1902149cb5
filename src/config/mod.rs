//! Configuration for canary-fleet
//!
//! A single YAML file in the platform config directory, overridable through
//! `CANARY_FLEET_*` environment variables and command-line flags.

pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::{ConfigLoader, parse_duration, refresh_policy};
pub use schema::{Config, CrdRefreshConfig, OutputFormat, RefreshMode};

use anyhow::Context;

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &Config, key: &str) -> anyhow::Result<String> {
    match key {
        "contexts" => Ok(config.contexts.join(",")),
        "crdRefresh.mode" => Ok(config.crd_refresh.mode.to_string()),
        "crdRefresh.interval" => Ok(config.crd_refresh.interval.clone()),
        "defaultPageSize" => Ok(config.default_page_size.to_string()),
        "output" => Ok(config.output.to_string()),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}

/// Set a configuration value by key (dot notation)
pub fn set_config_value(config: &mut Config, key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        "contexts" => {
            // YAML array or comma-separated list
            config.contexts = if value.trim_start().starts_with('[') {
                serde_yaml::from_str(value)
                    .context("contexts must be a YAML array (e.g., ['management', 'prod'])")?
            } else {
                loader::split_list(value)
            };
        }
        "crdRefresh.mode" => {
            config.crd_refresh.mode = value.parse()?;
        }
        "crdRefresh.interval" => {
            parse_duration(value).context("crdRefresh.interval must look like '30s' or '1m'")?;
            config.crd_refresh.interval = value.to_string();
        }
        "defaultPageSize" => {
            config.default_page_size = value
                .parse()
                .context("defaultPageSize must be a non-negative number")?;
        }
        "output" => {
            config.output = value.parse()?;
        }
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }

    Ok(())
}
