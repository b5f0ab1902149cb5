//! canary-fleet - query Flagger canaries across a fleet of Kubernetes clusters
//!
//! Every kubeconfig context in the fleet is queried concurrently. Partial
//! failures are reported next to the results instead of aborting the command.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use canary_fleet::cli::{
    self, CanarySubcommand, ConfigSubcommand, TemplateSubcommand, handle_canary_command,
    handle_config_command, handle_template_command,
};
use canary_fleet::config::{self, ConfigLoader, OutputFormat};
use canary_fleet::services::{CrdCache, ProgressiveDelivery, RefreshPolicy};

/// Query Flagger canaries across a fleet of Kubernetes clusters
#[derive(Parser, Debug)]
#[command(name = "canary-fleet")]
#[command(about = "Query Flagger canaries across a fleet of Kubernetes clusters", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    /// Kubeconfig context to include (repeatable; overrides configured contexts)
    #[arg(long = "context", global = true)]
    contexts: Vec<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum)]
    output: Option<OutputFormat>,

    #[command(subcommand)]
    command: Command,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Show which clusters have Flagger installed
    FlaggerStatus,
    /// Canary queries
    Canaries {
        #[command(subcommand)]
        subcommand: CanarySubcommand,
    },
    /// MetricTemplate queries
    Templates {
        #[command(subcommand)]
        subcommand: TemplateSubcommand,
    },
    /// Show version information
    Version,
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        debug,
        contexts,
        output,
        command,
    } = Args::parse();
    cli::init_logging(debug);

    let command = match command {
        Command::Config { subcommand } => return handle_config_command(subcommand),
        Command::Version => {
            cli::display_version();
            return Ok(());
        }
        command => command,
    };

    let mut config = ConfigLoader::load().context("Failed to load configuration")?;
    if !contexts.is_empty() {
        config.contexts = contexts;
    }
    let format = output.unwrap_or(config.output);
    let policy = config::refresh_policy(&config)?;
    tracing::debug!(
        "Configuration loaded: contexts={:?}, policy={:?}",
        config.contexts,
        policy
    );

    let pool = canary_fleet::kube::connect_fleet(&config.contexts).await?;
    let client: Arc<dyn canary_fleet::ClusterClient> = Arc::new(pool);

    let crds = Arc::new(CrdCache::new(Arc::clone(&client), policy));
    if matches!(policy, RefreshPolicy::Poll(_)) {
        crds.refresh().await;
    }
    let poller = crds.spawn_poller();

    let service = ProgressiveDelivery::new(client, crds);
    let page_size = config.default_page_size;

    let request = async move {
        match command {
            Command::FlaggerStatus => {
                let response = service.is_flagger_available().await;
                cli::render(&response, format).map(|out| println!("{}", out.trim_end()))
            }
            Command::Canaries { subcommand } => {
                handle_canary_command(&service, subcommand, page_size, format).await
            }
            Command::Templates { subcommand } => {
                handle_template_command(&service, subcommand, page_size, format).await
            }
            Command::Version | Command::Config { .. } => Ok(()),
        }
    };

    let result = tokio::select! {
        result = request => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, cancelling outstanding requests");
            Err(anyhow::anyhow!("Interrupted"))
        }
    };

    if let Some(handle) = poller {
        handle.abort();
    }

    result
}
