//! ONOS controller REST source.
//!
//! Reads `/devices`, `/links` and `/hosts` from the ONOS northbound API
//! (`http://<controller>:8181/onos/v1` by default).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::TopologySource;
use crate::error::{TopologyError, TopologyResult};
use crate::model::{DeviceRef, HostRef, LinkRef};

/// Default ONOS REST API URL.
pub const DEFAULT_ONOS_URL: &str = "http://127.0.0.1:8181/onos/v1";

/// Connection settings for the ONOS REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OnosConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl Default for OnosConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ONOS_URL.to_string(),
            user: "onos".to_string(),
            password: "rocks".to_string(),
            timeout_secs: 10,
        }
    }
}

/// ONOS REST client.
#[derive(Clone)]
pub struct OnosSource {
    base_url: String,
    user: String,
    password: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<OnosDevice>,
}

#[derive(Deserialize)]
struct OnosDevice {
    id: String,
}

#[derive(Deserialize)]
struct LinksResponse {
    #[serde(default)]
    links: Vec<OnosLink>,
}

#[derive(Deserialize)]
struct OnosLink {
    src: ConnectPoint,
    dst: ConnectPoint,
    #[serde(rename = "type")]
    link_type: String,
}

#[derive(Deserialize)]
struct ConnectPoint {
    device: String,
}

#[derive(Deserialize)]
struct HostsResponse {
    #[serde(default)]
    hosts: Vec<OnosHost>,
}

#[derive(Deserialize)]
struct OnosHost {
    id: String,
    #[serde(default)]
    mac: Option<String>,
    #[serde(default)]
    vlan: Option<String>,
    #[serde(default)]
    locations: Vec<HostLocation>,
    /// Pre-1.12 controllers report a single location.
    #[serde(default)]
    location: Option<HostLocation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostLocation {
    element_id: String,
}

impl OnosSource {
    /// Create a new ONOS client from config.
    pub fn new(config: &OnosConfig) -> TopologyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            password: config.password.clone(),
            client,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> TopologyResult<T> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| TopologyError::Unavailable(format!("{}: {}", self.base_url, e)))?;

        if !response.status().is_success() {
            return Err(TopologyError::BadStatus {
                status: response.status().as_u16(),
                path: path.to_string(),
            });
        }

        let body = response.json().await?;
        debug!(path, "Fetched from ONOS");
        Ok(body)
    }
}

fn devices_from(response: DevicesResponse) -> Vec<DeviceRef> {
    response
        .devices
        .into_iter()
        .map(|d| DeviceRef { id: d.id })
        .collect()
}

fn links_from(response: LinksResponse) -> TopologyResult<Vec<LinkRef>> {
    response
        .links
        .into_iter()
        .map(|l| {
            Ok(LinkRef {
                src: l.src.device,
                dst: l.dst.device,
                kind: l.link_type.parse()?,
            })
        })
        .collect()
}

/// Hosts without any location are skipped; they have nothing to attach to.
fn hosts_from(response: HostsResponse) -> Vec<HostRef> {
    response
        .hosts
        .into_iter()
        .filter_map(|h| {
            // Multi-homed hosts are attached at their first location only.
            let Some(location) = h.locations.into_iter().next().or(h.location) else {
                warn!(host = %h.id, "Host reported without location, skipping");
                return None;
            };

            Some(HostRef {
                id: h.id,
                device_id: location.element_id,
                mac: h.mac,
                vlan: h.vlan.filter(|v| v != "None"),
            })
        })
        .collect()
}

#[async_trait]
impl TopologySource for OnosSource {
    async fn list_devices(&self) -> TopologyResult<Vec<DeviceRef>> {
        Ok(devices_from(self.get("devices").await?))
    }

    async fn list_links(&self) -> TopologyResult<Vec<LinkRef>> {
        links_from(self.get("links").await?)
    }

    async fn list_hosts(&self) -> TopologyResult<Vec<HostRef>> {
        Ok(hosts_from(self.get("hosts").await?))
    }
}
