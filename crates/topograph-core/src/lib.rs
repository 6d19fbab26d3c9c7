//! Topograph Core Library
//!
//! Topology model (devices, links, hosts) and the sources a snapshot
//! can be read from.

pub mod error;
pub mod model;
pub mod source;

pub use error::{TopologyError, TopologyResult};
pub use model::{DeviceRef, HostRef, LinkKind, LinkRef, Topology};
pub use source::{OnosSource, SnapshotFile, TopologySource};
