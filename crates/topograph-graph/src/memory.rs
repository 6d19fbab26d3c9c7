//! In-process graph store.
//!
//! Interprets [`Mutation`] intents against a small in-memory property
//! graph with the same semantics as the Cypher statements: upserts never
//! duplicate, relationship upserts report missing endpoints instead of
//! creating anything, and a write transaction is applied to a copy that replaces
//! the live graph only on commit. Backs `--dry-run` and the tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::session::{GraphCounts, GraphSession, GraphStore, Row, RowSet, SessionResult};
use crate::upsert::{Mutation, CREATED, DEVICE_FOUND, DST_FOUND, HOST_EDGE_TYPE, REMOVED, SRC_FOUND};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct HostNode {
    mac: Option<String>,
    vlan: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct GraphState {
    devices: BTreeSet<String>,
    hosts: BTreeMap<String, HostNode>,
    /// Undirected device links, endpoints stored in sorted order.
    links: BTreeSet<(String, String, String)>,
    /// Directed host -> device relationships.
    attachments: BTreeSet<(String, String)>,
}

fn created(was_absent: bool) -> RowSet {
    RowSet::single(Row::new().with(CREATED, i64::from(was_absent)))
}

fn link_key(a: &str, b: &str, kind: &str) -> (String, String, String) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    (lo.to_string(), hi.to_string(), kind.to_string())
}

impl GraphState {
    fn apply(&mut self, mutation: &Mutation) -> RowSet {
        match mutation {
            Mutation::ClearAll => {
                let removed = self.devices.len() + self.hosts.len();
                *self = GraphState::default();
                RowSet::single(Row::new().with(REMOVED, removed as i64))
            }
            Mutation::UpsertDevice { id } => created(self.devices.insert(id.clone())),
            Mutation::UpsertLink { src, dst, kind } => {
                let src_found = self.devices.contains(src);
                let dst_found = self.devices.contains(dst);
                let was_absent = src_found && dst_found && self.links.insert(link_key(src, dst, kind));
                RowSet::single(
                    Row::new()
                        .with(CREATED, i64::from(was_absent))
                        .with(SRC_FOUND, i64::from(src_found))
                        .with(DST_FOUND, i64::from(dst_found)),
                )
            }
            Mutation::UpsertHost { id, mac, vlan } => {
                let node = HostNode {
                    mac: mac.clone(),
                    vlan: vlan.clone(),
                };
                created(self.hosts.insert(id.clone(), node).is_none())
            }
            Mutation::AttachHost { host_id, device_id } => {
                let device_found = self.devices.contains(device_id);
                let was_absent = device_found
                    && self.hosts.contains_key(host_id)
                    && self.attachments.insert((host_id.clone(), device_id.clone()));
                RowSet::single(
                    Row::new()
                        .with(CREATED, i64::from(was_absent))
                        .with(DEVICE_FOUND, i64::from(device_found)),
                )
            }
            Mutation::Schema(_) => RowSet::empty(),
        }
    }

    fn counts(&self) -> GraphCounts {
        GraphCounts {
            nodes: self.devices.len() + self.hosts.len(),
            relationships: self.links.len() + self.attachments.len(),
        }
    }
}

/// Shared in-memory graph. Clones share the same graph.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    state: Arc<Mutex<GraphState>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn counts(&self) -> GraphCounts {
        self.state.lock().await.counts()
    }

    pub async fn has_device(&self, id: &str) -> bool {
        self.state.lock().await.devices.contains(id)
    }

    pub async fn has_host(&self, id: &str) -> bool {
        self.state.lock().await.hosts.contains_key(id)
    }

    /// MAC and VLAN stored on a Host node.
    pub async fn host_attributes(&self, id: &str) -> Option<(Option<String>, Option<String>)> {
        self.state
            .lock()
            .await
            .hosts
            .get(id)
            .map(|h| (h.mac.clone(), h.vlan.clone()))
    }

    /// Whether a LINK of `kind` joins the two devices, in either direction.
    pub async fn has_link(&self, a: &str, b: &str, kind: &str) -> bool {
        self.state.lock().await.links.contains(&link_key(a, b, kind))
    }

    pub async fn link_count(&self) -> usize {
        self.state.lock().await.links.len()
    }

    /// Whether the host has an EDGE relationship to the device.
    pub async fn has_attachment(&self, host_id: &str, device_id: &str) -> bool {
        self.state
            .lock()
            .await
            .attachments
            .contains(&(host_id.to_string(), device_id.to_string()))
    }

    pub async fn attachment_count(&self) -> usize {
        self.state.lock().await.attachments.len()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    type Session = MemorySession;

    async fn open(&self) -> SessionResult<MemorySession> {
        Ok(MemorySession {
            state: Arc::clone(&self.state),
        })
    }
}

/// Session on a [`MemoryGraph`].
pub struct MemorySession {
    state: Arc<Mutex<GraphState>>,
}

#[async_trait]
impl GraphSession for MemorySession {
    async fn run(&mut self, mutation: &Mutation) -> SessionResult<RowSet> {
        Ok(self.state.lock().await.apply(mutation))
    }

    async fn write_transaction(&mut self, mutations: &[Mutation]) -> SessionResult<Vec<RowSet>> {
        let mut live = self.state.lock().await;
        let mut txn = live.clone();
        let rows = mutations.iter().map(|m| txn.apply(m)).collect();
        *live = txn;
        Ok(rows)
    }

    async fn counts(&mut self) -> SessionResult<GraphCounts> {
        Ok(self.state.lock().await.counts())
    }

    async fn close(self) {
        debug!("Closed in-memory graph session");
    }
}
