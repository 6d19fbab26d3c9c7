//! Topology domain models.
//!
//! These are read-only snapshots of what the control plane reports. The
//! synchronizer never mutates them; a [`Topology`] stays fixed for the
//! duration of one pass.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TopologyError, TopologyResult};

/// A network device (switch, router, ...), identified by an opaque id
/// such as `of:0000000000000001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceRef {
    pub id: String,
}

impl DeviceRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Link type as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkKind {
    Direct,
    Indirect,
    Edge,
    Tunnel,
    Optical,
    Virtual,
}

impl LinkKind {
    /// Wire label, stored as the `type` property of the LINK relationship.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::Indirect => "INDIRECT",
            Self::Edge => "EDGE",
            Self::Tunnel => "TUNNEL",
            Self::Optical => "OPTICAL",
            Self::Virtual => "VIRTUAL",
        }
    }
}

impl FromStr for LinkKind {
    type Err = TopologyError;

    fn from_str(s: &str) -> TopologyResult<Self> {
        match s.trim().to_uppercase().as_str() {
            "DIRECT" => Ok(Self::Direct),
            "INDIRECT" => Ok(Self::Indirect),
            "EDGE" => Ok(Self::Edge),
            "TUNNEL" => Ok(Self::Tunnel),
            "OPTICAL" => Ok(Self::Optical),
            "VIRTUAL" => Ok(Self::Virtual),
            _ => Err(TopologyError::UnknownLinkKind(s.to_string())),
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A link between two devices. Direction is kept as reported, but the
/// graph treats the pair as unordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkRef {
    pub src: String,
    pub dst: String,
    #[serde(rename = "type")]
    pub kind: LinkKind,
}

impl LinkRef {
    pub fn new(src: impl Into<String>, dst: impl Into<String>, kind: LinkKind) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            kind,
        }
    }
}

/// An end host attached to a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostRef {
    pub id: String,
    /// Device at the host's point of attachment.
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<String>,
}

impl HostRef {
    pub fn new(id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            device_id: device_id.into(),
            mac: None,
            vlan: None,
        }
    }
}

/// One full snapshot of the topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub devices: Vec<DeviceRef>,
    #[serde(default)]
    pub links: Vec<LinkRef>,
    #[serde(default)]
    pub hosts: Vec<HostRef>,
}

impl Topology {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.links.is_empty() && self.hosts.is_empty()
    }

    /// Reject entities with blank identifiers. Everything else (unknown
    /// endpoints, duplicates) is left to the synchronizer.
    pub fn validate(&self) -> TopologyResult<()> {
        for device in &self.devices {
            if device.id.trim().is_empty() {
                return Err(TopologyError::invalid("device", &device.id, "empty id"));
            }
        }
        for link in &self.links {
            if link.src.trim().is_empty() || link.dst.trim().is_empty() {
                return Err(TopologyError::invalid(
                    "link",
                    format!("{}->{}", link.src, link.dst),
                    "empty endpoint",
                ));
            }
        }
        for host in &self.hosts {
            if host.id.trim().is_empty() {
                return Err(TopologyError::invalid("host", &host.id, "empty id"));
            }
            if host.device_id.trim().is_empty() {
                return Err(TopologyError::invalid("host", &host.id, "no point of attachment"));
            }
        }
        Ok(())
    }
}
