//! Schema bootstrap command.

use anyhow::Result;
use colored::Colorize;

use topograph_graph::schema::initialize_schema;
use topograph_graph::{GraphSession, GraphStore};

use crate::config::AppConfig;

pub async fn execute(config: &AppConfig) -> Result<()> {
    let store = super::connect(config).await?;
    let mut session = store.open().await?;
    let applied = initialize_schema(&mut session).await;
    session.close().await;

    println!("{} ({} statements)", "Schema ready".green().bold(), applied?);
    Ok(())
}
