mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solcloud_topology::{CloudRouter, SourceConfig, TopologyConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "solcloud")]
#[command(about = "Solcloud CLI - cluster topology and endpoint resolution")]
#[command(version)]
struct Cli {
    /// Topology configuration file (TOML)
    #[arg(short, long, global = true, env = "SOLCLOUD_CONFIG")]
    config: Option<PathBuf>,

    /// Cluster member base URL, e.g. http://localhost:8983/solr (repeatable)
    #[arg(long = "solr-url", global = true, conflicts_with = "config")]
    solr_urls: Vec<String>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show collections, shards, replicas, live nodes and aliases
    Status,

    /// Resolve a collection or alias to one endpoint
    Resolve {
        /// Collection or alias name
        name: String,

        /// Only pick shard leaders
        #[arg(long)]
        leader: bool,
    },

    /// List the leader URI of every shard
    Leaders {
        /// Collection or alias name
        name: String,
    },

    /// List active replica URIs per shard
    Active {
        /// Collection or alias name
        name: String,
    },
}

fn load_config(cli: &Cli) -> Result<TopologyConfig> {
    if let Some(path) = &cli.config {
        return TopologyConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    let mut config = TopologyConfig::default();
    if !cli.solr_urls.is_empty() {
        config.source = SourceConfig::http(cli.solr_urls.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    tracing::debug!(backend = config.source.backend_name(), "Loaded topology config");

    // The coordination backend needs a store from an embedding application
    let router =
        CloudRouter::from_config(&config, None).context("Failed to set up topology source")?;

    match cli.command {
        Commands::Status => commands::run_status(&router, cli.json).await?,
        Commands::Resolve { name, leader } => {
            commands::run_resolve(&router, &name, leader, cli.json).await?
        }
        Commands::Leaders { name } => commands::run_leaders(&router, &name, cli.json).await?,
        Commands::Active { name } => commands::run_active(&router, &name, cli.json).await?,
    }

    Ok(())
}
