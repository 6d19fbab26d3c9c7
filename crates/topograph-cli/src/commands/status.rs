//! Graph status command.

use anyhow::Result;

use topograph_graph::{GraphSession, GraphStore};

use crate::config::AppConfig;
use crate::output;

/// Show node and relationship counts.
pub async fn execute(config: &AppConfig) -> Result<()> {
    let store = super::connect(config).await?;
    let mut session = store.open().await?;
    let counts = session.counts().await;
    session.close().await;

    output::print_counts(&counts?);
    Ok(())
}
