//! JSON snapshot file source.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::TopologySource;
use crate::error::TopologyResult;
use crate::model::{DeviceRef, HostRef, LinkRef, Topology};

/// A topology snapshot stored as JSON on disk.
///
/// The file is re-read on every call so that a long-running process picks
/// up edits between passes.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> TopologyResult<Topology> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let topology: Topology = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), "Loaded topology snapshot file");
        Ok(topology)
    }
}

#[async_trait]
impl TopologySource for SnapshotFile {
    async fn list_devices(&self) -> TopologyResult<Vec<DeviceRef>> {
        Ok(self.load().await?.devices)
    }

    async fn list_links(&self) -> TopologyResult<Vec<LinkRef>> {
        Ok(self.load().await?.links)
    }

    async fn list_hosts(&self) -> TopologyResult<Vec<HostRef>> {
        Ok(self.load().await?.hosts)
    }

    async fn snapshot(&self) -> TopologyResult<Topology> {
        // One read, so the three lists come from the same file contents.
        let topology = self.load().await?;
        topology.validate()?;
        Ok(topology)
    }
}
