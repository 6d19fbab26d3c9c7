//! CLI command definitions and handlers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use topograph_graph::Neo4jStore;

use crate::config::{AppConfig, SourceConfig};

pub mod schema;
pub mod status;
pub mod sync;

/// Topograph - mirror a network topology into Neo4j
#[derive(Parser)]
#[command(name = "topograph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file (defaults to ./topograph.toml when present)
    #[arg(short, long, global = true, env = "TOPOGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Read the topology from a JSON snapshot instead of the configured source
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize the topology into the graph
    Sync(sync::SyncArgs),

    /// Show graph node and relationship counts
    Status,

    /// Create graph constraints and indexes
    Schema,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(path) = self.snapshot {
            config.source = SourceConfig::File { path };
        }

        match self.command {
            Commands::Sync(args) => sync::execute(args, config).await,
            Commands::Status => status::execute(&config).await,
            Commands::Schema => schema::execute(&config).await,
        }
    }
}

/// Connect to the configured Neo4j instance.
pub async fn connect(config: &AppConfig) -> Result<Neo4jStore> {
    Neo4jStore::connect(&config.graph)
        .await
        .with_context(|| format!("Neo4j at {} is not available", config.graph.uri))
}
