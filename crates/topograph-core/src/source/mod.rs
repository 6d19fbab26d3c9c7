//! Topology sources.
//!
//! The synchronizer only needs to list the current devices, links and
//! hosts. How the source obtains them (controller REST API, a snapshot
//! file) is its own business.

pub mod file;
pub mod onos;

use async_trait::async_trait;
use tracing::info;

use crate::error::TopologyResult;
use crate::model::{DeviceRef, HostRef, LinkRef, Topology};

pub use file::SnapshotFile;
pub use onos::{OnosConfig, OnosSource};

/// Read access to the current topology.
#[async_trait]
pub trait TopologySource: Send + Sync {
    async fn list_devices(&self) -> TopologyResult<Vec<DeviceRef>>;

    async fn list_links(&self) -> TopologyResult<Vec<LinkRef>>;

    async fn list_hosts(&self) -> TopologyResult<Vec<HostRef>>;

    /// Read all three lists into one validated snapshot.
    async fn snapshot(&self) -> TopologyResult<Topology> {
        let topology = Topology {
            devices: self.list_devices().await?,
            links: self.list_links().await?,
            hosts: self.list_hosts().await?,
        };
        topology.validate()?;

        info!(
            devices = topology.devices.len(),
            links = topology.links.len(),
            hosts = topology.hosts.len(),
            "Read topology snapshot"
        );
        Ok(topology)
    }
}

#[async_trait]
impl TopologySource for Topology {
    async fn list_devices(&self) -> TopologyResult<Vec<DeviceRef>> {
        Ok(self.devices.clone())
    }

    async fn list_links(&self) -> TopologyResult<Vec<LinkRef>> {
        Ok(self.links.clone())
    }

    async fn list_hosts(&self) -> TopologyResult<Vec<HostRef>> {
        Ok(self.hosts.clone())
    }
}
