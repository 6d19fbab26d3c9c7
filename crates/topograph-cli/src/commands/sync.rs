//! Topology sync command.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use topograph_core::TopologySource;
use topograph_graph::schema::initialize_schema;
use topograph_graph::{
    GraphSession, GraphStore, MemoryGraph, SyncError, SyncOptions, SyncResult, TopologySynchronizer,
};

use crate::config::AppConfig;
use crate::output;

#[derive(Args)]
pub struct SyncArgs {
    /// Sync into an in-memory graph instead of Neo4j
    #[arg(long)]
    pub dry_run: bool,

    /// Repeat the pass every N seconds until Ctrl+C
    #[arg(long, value_name = "SECS")]
    pub every: Option<u64>,

    /// Upsert on top of the existing graph instead of rebuilding it
    #[arg(long)]
    pub no_clear: bool,

    /// Entities applied concurrently within a phase
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: SyncArgs, config: AppConfig) -> Result<()> {
    let mut options = config.sync.clone();
    if args.no_clear {
        options.clear_before_sync = false;
    }
    if let Some(concurrency) = args.concurrency {
        options.concurrency = concurrency.max(1);
    }

    let source = config
        .source
        .build()
        .context("Failed to set up topology source")?;
    if !args.json {
        println!("{} {}", "Reading topology from".bold(), config.source.describe().cyan());
    }

    if args.dry_run {
        let graph = MemoryGraph::new();
        run(graph.clone(), source.as_ref(), options, &args).await?;
        if !args.json {
            output::print_counts(&graph.counts().await);
        }
        return Ok(());
    }

    let store = super::connect(&config).await?;
    let mut session = store.open().await?;
    initialize_schema(&mut session).await?;
    session.close().await;

    run(store, source.as_ref(), options, &args).await
}

/// Run one pass, or one per interval until Ctrl+C.
async fn run<S: GraphStore>(
    store: S,
    source: &dyn TopologySource,
    options: SyncOptions,
    args: &SyncArgs,
) -> Result<()> {
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current phase");
            let _ = cancel_tx.send(true);
        }
    });

    let synchronizer = TopologySynchronizer::new(store, options).with_cancellation(cancel_rx.clone());

    loop {
        match sync_once(&synchronizer, source, args.json).await {
            Ok(()) => {}
            Err(e) if args.every.is_none() || *cancel_rx.borrow() => return Err(e),
            Err(e) => error!(error = %e, "Sync pass failed, retrying at next interval"),
        }

        let Some(every) = args.every else {
            return Ok(());
        };

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(every)) => {}
            Ok(_) = cancel_rx.wait_for(|cancelled| *cancelled) => {
                info!("Stopped periodic sync");
                return Ok(());
            }
        }
    }
}

async fn sync_once<S: GraphStore>(
    synchronizer: &TopologySynchronizer<S>,
    source: &dyn TopologySource,
    json: bool,
) -> Result<()> {
    let topology = source
        .snapshot()
        .await
        .context("Failed to read topology snapshot")?;
    if topology.is_empty() {
        warn!("Topology snapshot is empty");
    }

    let result = match synchronizer.sync_all(&topology).await {
        Ok(result) => result,
        Err(e @ SyncError::Cancelled { .. }) if !e.is_partial() => {
            eprintln!("{}", "Sync cancelled before it started".yellow());
            return Ok(());
        }
        Err(SyncError::Cancelled { next, result }) => {
            eprintln!("{} before {}", "Sync cancelled".yellow(), next);
            report(&result, json)?;
            anyhow::bail!("Sync cancelled before {}, graph is incomplete", next);
        }
        Err(e) => return Err(e.into()),
    };

    report(&result, json)?;

    if !result.is_success() {
        anyhow::bail!(
            "{} entities failed to sync: {}",
            result.failures.len(),
            result.failed_ids().join(", ")
        );
    }
    Ok(())
}

fn report(result: &SyncResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        output::print_sync_result(result);
    }
    Ok(())
}
