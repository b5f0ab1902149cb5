//! CLI command handlers

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::config::{ConfigLoader, OutputFormat, paths};
use crate::models::responses::{ObjectRequest, Pagination};
use crate::services::ProgressiveDelivery;

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Get configuration value
    Get {
        /// Configuration key (e.g., "contexts", "crdRefresh.mode")
        key: Option<String>,
    },
    /// Set configuration value
    Set {
        /// Configuration key (e.g., "contexts", "crdRefresh.mode")
        key: String,
        /// Configuration value
        value: String,
    },
    /// List all configuration
    List,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

/// Canary subcommands
#[derive(Subcommand, Debug)]
pub enum CanarySubcommand {
    /// List canaries across every cluster
    List(PageArgs),
    /// Show one canary with its automation and metric templates
    Get(ObjectArgs),
    /// List the objects a canary references or owns
    Objects(ObjectArgs),
}

/// MetricTemplate subcommands
#[derive(Subcommand, Debug)]
pub enum TemplateSubcommand {
    /// List metric templates across every cluster
    List(PageArgs),
    /// Show one metric template
    Get(ObjectArgs),
}

#[derive(Args, Debug)]
pub struct PageArgs {
    /// Maximum items per cluster (defaults to defaultPageSize)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Continuation token from a previous page
    #[arg(long)]
    pub page_token: Option<String>,
}

#[derive(Args, Debug)]
pub struct ObjectArgs {
    /// Object name
    pub name: String,

    /// Object namespace
    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,

    /// Cluster (kubeconfig context) holding the object
    ///
    /// May be omitted when the fleet has a single cluster.
    #[arg(long)]
    pub cluster: Option<String>,
}

impl PageArgs {
    fn pagination(self, default_page_size: u32) -> Pagination {
        Pagination {
            page_size: self.page_size.or(Some(default_page_size)).filter(|n| *n > 0),
            page_token: self.page_token.filter(|t| !t.is_empty()),
        }
    }
}

impl ObjectArgs {
    fn request(self, clusters: &[String]) -> Result<ObjectRequest> {
        let cluster_name = match self.cluster {
            Some(cluster) => cluster,
            None => match clusters {
                [only] => only.clone(),
                _ => anyhow::bail!(
                    "--cluster is required when more than one cluster is configured ({})",
                    clusters.join(", ")
                ),
            },
        };

        Ok(ObjectRequest {
            name: self.name,
            namespace: self.namespace,
            cluster_name,
        })
    }
}

/// Serialize a response in the requested output format
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).context("Failed to serialize response"),
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).context("Failed to serialize response")
        }
    }
}

fn print<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let output = render(value, format)?;
    println!("{}", output.trim_end());
    Ok(())
}

/// Handle canary subcommands
pub async fn handle_canary_command(
    service: &ProgressiveDelivery,
    cmd: CanarySubcommand,
    default_page_size: u32,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        CanarySubcommand::List(page) => {
            let response = service
                .list_canaries(&page.pagination(default_page_size))
                .await
                .context("Failed to list canaries")?;
            print(&response, format)
        }
        CanarySubcommand::Get(object) => {
            let request = object.request(&service.clusters())?;
            let response = service.get_canary(&request).await?;
            print(&response, format)
        }
        CanarySubcommand::Objects(object) => {
            let request = object.request(&service.clusters())?;
            let response = service.list_canary_objects(&request).await?;
            print(&response, format)
        }
    }
}

/// Handle metric template subcommands
pub async fn handle_template_command(
    service: &ProgressiveDelivery,
    cmd: TemplateSubcommand,
    default_page_size: u32,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        TemplateSubcommand::List(page) => {
            let response = service
                .list_metric_templates(&page.pagination(default_page_size))
                .await
                .context("Failed to list metric templates")?;
            print(&response, format)
        }
        TemplateSubcommand::Get(object) => {
            let request = object.request(&service.clusters())?;
            let response = service.get_metric_template(&request).await?;
            print(&response, format)
        }
    }
}

/// Handle configuration subcommands
pub fn handle_config_command(cmd: ConfigSubcommand) -> Result<()> {
    match cmd {
        ConfigSubcommand::Get { key } => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;

            if let Some(key) = key {
                let value = crate::config::get_config_value(&config, &key)?;
                println!("{}", value);
            } else {
                let yaml =
                    serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
                print!("{}", yaml);
            }
        }
        ConfigSubcommand::Set { key, value } => {
            // Only the file is rewritten, so env overrides must not leak into it
            let path = paths::root_config_path();
            let mut config = if path.exists() {
                ConfigLoader::load_file(&path)?
            } else {
                Default::default()
            };

            crate::config::set_config_value(&mut config, &key, &value)
                .with_context(|| format!("Failed to set {} = {}", key, value))?;

            ConfigLoader::save_root(&config).context("Failed to save configuration")?;
            println!("Configuration saved");
        }
        ConfigSubcommand::List => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            let yaml =
                serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
            print!("{}", yaml);
        }
        ConfigSubcommand::Path => {
            println!("{}", paths::root_config_path().display());
        }
        ConfigSubcommand::Validate => match ConfigLoader::validate(&paths::root_config_path()) {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => {
                eprintln!("Configuration validation failed: {:#}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
