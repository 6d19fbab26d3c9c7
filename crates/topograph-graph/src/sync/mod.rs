//! Topology to graph synchronization pipeline.
//!
//! One pass clears the graph, then upserts every device, every link and
//! every host, in that order. Each phase is a full barrier: all of its
//! entities are attempted before the next phase starts, because links
//! and host attachments MATCH the device nodes written before them.
//!
//! Entity failures are recorded and the pass continues; only failing to
//! open a session or to clear the graph aborts it.

pub mod result;

use std::fmt;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use topograph_core::{DeviceRef, HostRef, LinkRef, Topology};

use crate::session::{GraphSession, GraphStore, RowSet, SessionError, SessionResult};
use crate::upsert::{self, HostAttributes, Mutation, CREATED, REMOVED};

pub use result::{DanglingSkip, EntityFailure, EntityKey, FailureKind, SyncResult};

/// Where a synchronizer is in its pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Clearing,
    SyncingDevices,
    SyncingLinks,
    SyncingHosts,
    /// Last pass aborted or recorded entity failures.
    Failed,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Clearing => "clearing",
            Self::SyncingDevices => "syncing_devices",
            Self::SyncingLinks => "syncing_links",
            Self::SyncingHosts => "syncing_hosts",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pass-level failures. Entity-level failures are reported in
/// [`SyncResult`] instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Cannot open graph session: {0}")]
    Connection(#[source] SessionError),

    #[error("Failed to clear graph: {0}")]
    Clear(#[source] SessionError),

    /// Carries what the pass had already written. Everything up to `next`
    /// is applied; nothing after it is.
    #[error("Sync cancelled before {next}")]
    Cancelled {
        next: SyncPhase,
        result: Box<SyncResult>,
    },
}

impl SyncError {
    /// Whether the pass was stopped after it started writing, leaving the
    /// graph cleared or partially rebuilt.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Cancelled { next, .. } if *next != SyncPhase::Clearing)
    }
}

/// Tuning for a synchronization pass.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Delete everything before rebuilding. Disabling it turns a pass into
    /// an additive upsert of the snapshot.
    pub clear_before_sync: bool,
    /// Entities applied concurrently within one phase, each on its own
    /// session.
    pub concurrency: usize,
    /// Store host MAC and VLAN on Host nodes.
    pub persist_host_attributes: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            clear_before_sync: true,
            concurrency: 1,
            persist_host_attributes: false,
        }
    }
}

impl SyncOptions {
    fn host_attributes(&self) -> HostAttributes {
        if self.persist_host_attributes {
            HostAttributes::Descriptive
        } else {
            HostAttributes::IdOnly
        }
    }
}

/// Mutations of one entity, applied as one transaction.
struct EntityWork {
    entity: EntityKey,
    mutations: Vec<Mutation>,
}

fn device_work(device: &DeviceRef) -> EntityWork {
    EntityWork {
        entity: EntityKey::Device {
            id: device.id.clone(),
        },
        mutations: upsert::upsert_device(device),
    }
}

fn link_work(link: &LinkRef) -> EntityWork {
    EntityWork {
        entity: EntityKey::Link {
            src: link.src.clone(),
            dst: link.dst.clone(),
            link_type: link.kind.as_str().to_string(),
        },
        mutations: upsert::upsert_link(link),
    }
}

fn host_work(host: &HostRef, attributes: HostAttributes) -> EntityWork {
    EntityWork {
        entity: EntityKey::Host { id: host.id.clone() },
        mutations: upsert::upsert_host(host, attributes),
    }
}

/// Fold the outcome of one entity's transaction into the pass result.
fn record(result: &mut SyncResult, work: EntityWork, outcome: SessionResult<Vec<RowSet>>) {
    let rowsets = match outcome {
        Ok(rowsets) => rowsets,
        Err(e) => {
            if matches!(e, SessionError::Statement { .. }) {
                let statements: Vec<String> = work.mutations.iter().map(ToString::to_string).collect();
                error!(entity = %work.entity, error = %e, ?statements, "Graph store rejected statement");
            } else {
                warn!(entity = %work.entity, error = %e, "Failed to sync entity");
            }
            result.failures.push(EntityFailure {
                entity: work.entity,
                kind: FailureKind::from(&e),
                cause: e.to_string(),
            });
            return;
        }
    };

    for (mutation, rows) in work.mutations.iter().zip(&rowsets) {
        let created = rows.first_value(CREATED) == Some(1);
        if !mutation.is_relationship() {
            result.record_node(created);
        } else {
            let missing: Vec<String> = mutation
                .missing_devices(rows)
                .into_iter()
                .map(String::from)
                .collect();
            if missing.is_empty() {
                result.record_relationship(created);
            } else {
                warn!(entity = %work.entity, ?missing, "Device not in graph, relationship not recorded");
                result.skips.push(DanglingSkip {
                    entity: work.entity.clone(),
                    missing_devices: missing,
                });
            }
        }
    }

    debug!(entity = %work.entity, "Synced entity");
}

/// Runs synchronization passes against a graph store.
pub struct TopologySynchronizer<S: GraphStore> {
    store: S,
    options: SyncOptions,
    phase: watch::Sender<SyncPhase>,
    cancel: Option<watch::Receiver<bool>>,
}

impl<S: GraphStore> TopologySynchronizer<S> {
    pub fn new(store: S, options: SyncOptions) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            store,
            options,
            phase,
            cancel: None,
        }
    }

    /// Stop passes at the next phase boundary once `cancel` turns true.
    /// The phase in flight always finishes its entity transactions first.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: SyncPhase) {
        self.phase.send_replace(phase);
        debug!(%phase, "Entered sync phase");
    }

    fn checkpoint(&self, next: SyncPhase, result: &SyncResult) -> Result<(), SyncError> {
        let cancelled = self.cancel.as_ref().is_some_and(|rx| *rx.borrow());
        if !cancelled {
            return Ok(());
        }

        let mut partial = result.clone();
        partial.finish();
        if next == SyncPhase::Clearing {
            info!(%next, "Sync cancelled");
        } else {
            warn!(
                %next,
                nodes_removed = partial.nodes_removed,
                nodes_created = partial.nodes_created,
                relationships_created = partial.relationships_created,
                "Sync cancelled mid-pass, graph is incomplete"
            );
        }
        self.enter(SyncPhase::Idle);
        Err(SyncError::Cancelled {
            next,
            result: Box::new(partial),
        })
    }

    /// Run one full pass over `topology`.
    ///
    /// Returns `Err` only for pass-level failures (session, clear,
    /// cancellation). Entity failures and dangling references are in the
    /// returned [`SyncResult`]; a cancelled pass returns its partial one.
    pub async fn sync_all(&self, topology: &Topology) -> Result<SyncResult, SyncError> {
        let pass_id = Uuid::new_v4();
        self.run_pass(pass_id, topology)
            .instrument(info_span!("sync_pass", pass = %pass_id))
            .await
    }

    async fn run_pass(&self, pass_id: Uuid, topology: &Topology) -> Result<SyncResult, SyncError> {
        info!(
            devices = topology.devices.len(),
            links = topology.links.len(),
            hosts = topology.hosts.len(),
            "Starting topology sync"
        );

        let mut result = SyncResult::new(pass_id);
        self.checkpoint(SyncPhase::Clearing, &result)?;

        let mut session = match self.store.open().await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Cannot open graph session");
                self.enter(SyncPhase::Failed);
                return Err(SyncError::Connection(e));
            }
        };

        if self.options.clear_before_sync {
            self.enter(SyncPhase::Clearing);
            match session.write_transaction(&upsert::clear_all()).await {
                Ok(rowsets) => {
                    let removed = rowsets
                        .first()
                        .and_then(|rows| rows.first_value(REMOVED))
                        .unwrap_or(0);
                    result.nodes_removed = removed as usize;
                    info!(removed, "Deleted all nodes and relationships");
                }
                Err(e) => {
                    error!(error = %e, "Failed to clear graph");
                    session.close().await;
                    self.enter(SyncPhase::Failed);
                    return Err(SyncError::Clear(e));
                }
            }
        }

        let attributes = self.options.host_attributes();
        let phases = [
            (
                SyncPhase::SyncingDevices,
                topology.devices.iter().map(device_work).collect::<Vec<_>>(),
            ),
            (
                SyncPhase::SyncingLinks,
                topology.links.iter().map(link_work).collect(),
            ),
            (
                SyncPhase::SyncingHosts,
                topology.hosts.iter().map(|h| host_work(h, attributes)).collect(),
            ),
        ];

        for (phase, work) in phases {
            if let Err(e) = self.checkpoint(phase, &result) {
                session.close().await;
                return Err(e);
            }
            self.enter(phase);

            let attempted = work.len();
            let failed_before = result.failures.len();
            let skipped_before = result.skips.len();
            self.apply_phase(&mut session, work, &mut result).await;

            info!(
                %phase,
                attempted,
                failed = result.failures.len() - failed_before,
                skipped = result.skips.len() - skipped_before,
                "Phase complete"
            );
        }

        session.close().await;
        result.finish();

        if result.is_success() {
            self.enter(SyncPhase::Idle);
            info!(
                nodes_created = result.nodes_created,
                nodes_matched = result.nodes_matched,
                relationships_created = result.relationships_created,
                skipped = result.skips.len(),
                "Full sync complete"
            );
        } else {
            self.enter(SyncPhase::Failed);
            warn!(
                failed = ?result.failed_ids(),
                nodes_created = result.nodes_created,
                relationships_created = result.relationships_created,
                "Sync finished with failures"
            );
        }

        Ok(result)
    }

    /// Apply every entity of one phase. Returns only after all of them
    /// have been attempted.
    async fn apply_phase(
        &self,
        session: &mut S::Session,
        work: Vec<EntityWork>,
        result: &mut SyncResult,
    ) {
        if self.options.concurrency <= 1 {
            for item in work {
                let outcome = session.write_transaction(&item.mutations).await;
                record(result, item, outcome);
            }
            return;
        }

        let outcomes: Vec<_> = stream::iter(work)
            .map(|item| async move {
                let outcome = match self.store.open().await {
                    Ok(mut own) => {
                        let outcome = own.write_transaction(&item.mutations).await;
                        own.close().await;
                        outcome
                    }
                    Err(e) => Err(e),
                };
                (item, outcome)
            })
            .buffer_unordered(self.options.concurrency)
            .collect()
            .await;

        for (item, outcome) in outcomes {
            record(result, item, outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use topograph_core::LinkKind;

    use crate::memory::{MemoryGraph, MemorySession};
    use crate::session::GraphCounts;

    /// Memory graph that fails chosen units of work.
    #[derive(Clone, Default)]
    struct FlakyStore {
        graph: MemoryGraph,
        fail_devices: Vec<String>,
        fail_clear: bool,
        unreachable: bool,
        /// Raise the cancel signal while applying this mutation.
        cancel_on: Option<(Mutation, Arc<watch::Sender<bool>>)>,
    }

    struct FlakySession {
        inner: MemorySession,
        fail_devices: Vec<String>,
        fail_clear: bool,
        cancel_on: Option<(Mutation, Arc<watch::Sender<bool>>)>,
    }

    #[async_trait]
    impl GraphStore for FlakyStore {
        type Session = FlakySession;

        async fn open(&self) -> SessionResult<FlakySession> {
            if self.unreachable {
                return Err(SessionError::Connection("connection refused".to_string()));
            }
            Ok(FlakySession {
                inner: self.graph.open().await?,
                fail_devices: self.fail_devices.clone(),
                fail_clear: self.fail_clear,
                cancel_on: self.cancel_on.clone(),
            })
        }
    }

    #[async_trait]
    impl GraphSession for FlakySession {
        async fn run(&mut self, mutation: &Mutation) -> SessionResult<RowSet> {
            self.inner.run(mutation).await
        }

        async fn write_transaction(&mut self, mutations: &[Mutation]) -> SessionResult<Vec<RowSet>> {
            if let Some((trigger, cancel)) = &self.cancel_on {
                if mutations.contains(trigger) {
                    cancel.send_replace(true);
                }
            }
            for mutation in mutations {
                match mutation {
                    Mutation::UpsertDevice { id } if self.fail_devices.contains(id) => {
                        return Err(SessionError::store(format!("injected failure for {}", id), true));
                    }
                    Mutation::ClearAll if self.fail_clear => {
                        return Err(SessionError::store("injected clear failure", false));
                    }
                    _ => {}
                }
            }
            self.inner.write_transaction(mutations).await
        }

        async fn counts(&mut self) -> SessionResult<GraphCounts> {
            self.inner.counts().await
        }

        async fn close(self) {
            self.inner.close().await
        }
    }

    fn topology(devices: &[&str], links: &[(&str, &str)], hosts: &[(&str, &str)]) -> Topology {
        Topology {
            devices: devices.iter().map(|d| DeviceRef::new(*d)).collect(),
            links: links
                .iter()
                .map(|(s, d)| LinkRef::new(*s, *d, LinkKind::Direct))
                .collect(),
            hosts: hosts.iter().map(|(h, d)| HostRef::new(*h, *d)).collect(),
        }
    }

    async fn seed(graph: &MemoryGraph, mutations: Vec<Mutation>) {
        let mut session = graph.open().await.unwrap();
        session.write_transaction(&mutations).await.unwrap();
    }

    #[tokio::test]
    async fn test_full_pass() {
        let graph = MemoryGraph::new();
        let sync = TopologySynchronizer::new(graph.clone(), SyncOptions::default());
        let snapshot = topology(&["a", "b", "c"], &[("a", "b"), ("b", "c")], &[("h1", "a")]);

        let result = sync.sync_all(&snapshot).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.nodes_created, 4);
        assert_eq!(result.relationships_created, 3);
        assert!(result.skips.is_empty());
        assert!(result.finished_at.is_some());
        assert_eq!(graph.counts().await, GraphCounts { nodes: 4, relationships: 3 });
        assert_eq!(sync.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_idempotent_passes() {
        let graph = MemoryGraph::new();
        let sync = TopologySynchronizer::new(graph.clone(), SyncOptions::default());
        let snapshot = topology(&["a", "b"], &[("a", "b"), ("b", "a")], &[("h1", "a"), ("h2", "b")]);

        sync.sync_all(&snapshot).await.unwrap();
        let first = graph.counts().await;
        let second_result = sync.sync_all(&snapshot).await.unwrap();
        let second = graph.counts().await;

        assert_eq!(first, second);
        assert_eq!(second, GraphCounts { nodes: 4, relationships: 3 });
        assert_eq!(second_result.nodes_removed, 4);
    }

    #[tokio::test]
    async fn test_idempotent_without_clearing() {
        let graph = MemoryGraph::new();
        let options = SyncOptions {
            clear_before_sync: false,
            ..Default::default()
        };
        let sync = TopologySynchronizer::new(graph.clone(), options);
        let snapshot = topology(&["a", "b"], &[("a", "b")], &[("h1", "b")]);

        sync.sync_all(&snapshot).await.unwrap();
        let second = sync.sync_all(&snapshot).await.unwrap();

        assert_eq!(graph.counts().await, GraphCounts { nodes: 3, relationships: 2 });
        assert_eq!(second.nodes_created, 0);
        assert_eq!(second.nodes_matched, 3);
        assert_eq!(second.relationships_matched, 2);
    }

    #[tokio::test]
    async fn test_dangling_link_creates_nothing() {
        let graph = MemoryGraph::new();
        let sync = TopologySynchronizer::new(graph.clone(), SyncOptions::default());
        let snapshot = topology(&["a"], &[("a", "ghost")], &[]);

        let result = sync.sync_all(&snapshot).await.unwrap();

        assert!(result.is_success());
        assert_eq!(graph.link_count().await, 0);
        assert!(!graph.has_device("ghost").await);
        assert_eq!(graph.counts().await.nodes, 1);
        assert_eq!(
            result.skips,
            vec![DanglingSkip {
                entity: EntityKey::Link {
                    src: "a".to_string(),
                    dst: "ghost".to_string(),
                    link_type: "DIRECT".to_string(),
                },
                missing_devices: vec!["ghost".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn test_duplicate_devices_yield_one_node() {
        let graph = MemoryGraph::new();
        let sync = TopologySynchronizer::new(graph.clone(), SyncOptions::default());

        let result = sync.sync_all(&topology(&["d1", "d1"], &[], &[])).await.unwrap();

        assert_eq!(graph.counts().await.nodes, 1);
        assert_eq!(result.nodes_created, 1);
        assert_eq!(result.nodes_matched, 1);
    }

    #[tokio::test]
    async fn test_device_failure_does_not_block_links() {
        let store = FlakyStore {
            fail_devices: vec!["B".to_string()],
            ..Default::default()
        };
        let graph = store.graph.clone();
        let sync = TopologySynchronizer::new(store, SyncOptions::default());
        let snapshot = Topology {
            devices: vec![DeviceRef::new("A"), DeviceRef::new("B"), DeviceRef::new("C")],
            links: vec![LinkRef::new("A", "C", LinkKind::Edge)],
            hosts: Vec::new(),
        };

        let result = sync.sync_all(&snapshot).await.unwrap();

        assert!(graph.has_device("A").await);
        assert!(!graph.has_device("B").await);
        assert!(graph.has_device("C").await);
        assert!(graph.has_link("A", "C", "EDGE").await);
        assert_eq!(result.failed_ids(), vec!["B".to_string()]);
        assert_eq!(result.failures[0].kind, FailureKind::Store);
        assert!(!result.is_success());
        assert_eq!(sync.phase(), SyncPhase::Failed);
    }

    #[tokio::test]
    async fn test_host_attachment() {
        let graph = MemoryGraph::new();
        let sync = TopologySynchronizer::new(graph.clone(), SyncOptions::default());

        let result = sync
            .sync_all(&topology(&["d1"], &[], &[("h1", "d1")]))
            .await
            .unwrap();

        assert!(graph.has_host("h1").await);
        assert!(graph.has_attachment("h1", "d1").await);
        assert_eq!(graph.attachment_count().await, 1);
        assert!(result.skips.is_empty());
    }

    #[tokio::test]
    async fn test_host_without_device() {
        let graph = MemoryGraph::new();
        let sync = TopologySynchronizer::new(graph.clone(), SyncOptions::default());

        let result = sync.sync_all(&topology(&[], &[], &[("h1", "d1")])).await.unwrap();

        assert!(graph.has_host("h1").await);
        assert!(!graph.has_device("d1").await);
        assert_eq!(graph.attachment_count().await, 0);
        assert!(result.is_success());
        assert!(result.is_skipped(&EntityKey::Host { id: "h1".to_string() }));
        assert_eq!(result.skips[0].missing_devices, vec!["d1".to_string()]);
        assert_eq!(result.nodes_created, 1);
    }

    #[tokio::test]
    async fn test_clear_removes_stale_nodes() {
        let graph = MemoryGraph::new();
        seed(&graph, upsert::upsert_device(&DeviceRef::new("zzz"))).await;

        let sync = TopologySynchronizer::new(graph.clone(), SyncOptions::default());
        let result = sync.sync_all(&topology(&["a"], &[], &[])).await.unwrap();

        assert!(!graph.has_device("zzz").await);
        assert!(graph.has_device("a").await);
        assert_eq!(result.nodes_removed, 1);
    }

    #[tokio::test]
    async fn test_clear_failure_aborts_pass() {
        let store = FlakyStore {
            fail_clear: true,
            ..Default::default()
        };
        let graph = store.graph.clone();
        seed(&graph, upsert::upsert_device(&DeviceRef::new("old"))).await;
        let sync = TopologySynchronizer::new(store, SyncOptions::default());

        let err = sync.sync_all(&topology(&["a"], &[], &[])).await.unwrap_err();

        assert!(matches!(err, SyncError::Clear(_)));
        assert!(graph.has_device("old").await);
        assert!(!graph.has_device("a").await);
        assert_eq!(sync.phase(), SyncPhase::Failed);
    }

    #[tokio::test]
    async fn test_unreachable_store() {
        let store = FlakyStore {
            unreachable: true,
            ..Default::default()
        };
        let sync = TopologySynchronizer::new(store, SyncOptions::default());

        let err = sync.sync_all(&topology(&["a"], &[], &[])).await.unwrap_err();
        assert!(matches!(err, SyncError::Connection(SessionError::Connection(_))));
        assert_eq!(sync.phase(), SyncPhase::Failed);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let graph = MemoryGraph::new();
        seed(&graph, upsert::upsert_device(&DeviceRef::new("keep"))).await;
        let (cancel_tx, cancel_rx) = watch::channel(true);
        let sync = TopologySynchronizer::new(graph.clone(), SyncOptions::default())
            .with_cancellation(cancel_rx);

        let err = sync.sync_all(&topology(&["a"], &[], &[])).await.unwrap_err();

        assert!(matches!(err, SyncError::Cancelled { next: SyncPhase::Clearing, .. }));
        assert!(!err.is_partial());
        assert!(graph.has_device("keep").await);
        assert_eq!(sync.phase(), SyncPhase::Idle);
        drop(cancel_tx);
    }

    fn cancelling_store(trigger: Mutation) -> (FlakyStore, watch::Receiver<bool>) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let store = FlakyStore {
            cancel_on: Some((trigger, Arc::new(cancel_tx))),
            ..Default::default()
        };
        (store, cancel_rx)
    }

    #[tokio::test]
    async fn test_cancelled_after_clear_reports_partial_pass() {
        let (store, cancel_rx) = cancelling_store(Mutation::ClearAll);
        let graph = store.graph.clone();
        seed(&graph, upsert::upsert_device(&DeviceRef::new("keep"))).await;
        let sync = TopologySynchronizer::new(store, SyncOptions::default()).with_cancellation(cancel_rx);

        let err = sync
            .sync_all(&topology(&["a", "b"], &[("a", "b")], &[]))
            .await
            .unwrap_err();

        assert!(err.is_partial());
        match err {
            SyncError::Cancelled { next, result } => {
                assert_eq!(next, SyncPhase::SyncingDevices);
                assert_eq!(result.nodes_removed, 1);
                assert_eq!(result.nodes_created, 0);
                assert!(result.finished_at.is_some());
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(graph.counts().await, GraphCounts::default());
        assert_eq!(sync.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_cancel_finishes_current_phase() {
        let trigger = Mutation::UpsertDevice { id: "a".to_string() };
        let (store, cancel_rx) = cancelling_store(trigger);
        let graph = store.graph.clone();
        let sync = TopologySynchronizer::new(store, SyncOptions::default()).with_cancellation(cancel_rx);

        let err = sync
            .sync_all(&topology(&["a", "b"], &[("a", "b")], &[("h1", "a")]))
            .await
            .unwrap_err();

        match err {
            SyncError::Cancelled { next, result } => {
                assert_eq!(next, SyncPhase::SyncingLinks);
                assert_eq!(result.nodes_created, 2);
                assert_eq!(result.relationships_created, 0);
            }
            other => panic!("unexpected error {:?}", other),
        }
        // Both devices of the in-flight phase land, nothing after them.
        assert!(graph.has_device("a").await);
        assert!(graph.has_device("b").await);
        assert_eq!(graph.link_count().await, 0);
        assert!(!graph.has_host("h1").await);
        assert_eq!(sync.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_concurrent_phases_match_sequential() {
        let snapshot = topology(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("d", "x")],
            &[("h1", "a"), ("h2", "d"), ("h3", "y")],
        );

        let sequential = MemoryGraph::new();
        TopologySynchronizer::new(sequential.clone(), SyncOptions::default())
            .sync_all(&snapshot)
            .await
            .unwrap();

        let concurrent = MemoryGraph::new();
        let options = SyncOptions {
            concurrency: 4,
            ..Default::default()
        };
        let result = TopologySynchronizer::new(concurrent.clone(), options)
            .sync_all(&snapshot)
            .await
            .unwrap();

        assert_eq!(sequential.counts().await, concurrent.counts().await);
        assert_eq!(result.skips.len(), 2);
        assert!(concurrent.has_link("c", "d", "DIRECT").await);
    }

    #[tokio::test]
    async fn test_host_attributes_persisted_on_request() {
        let graph = MemoryGraph::new();
        let options = SyncOptions {
            persist_host_attributes: true,
            ..Default::default()
        };
        let sync = TopologySynchronizer::new(graph.clone(), options);
        let snapshot = Topology {
            devices: vec![DeviceRef::new("d1")],
            links: Vec::new(),
            hosts: vec![HostRef {
                mac: Some("00:00:00:00:00:01".to_string()),
                vlan: Some("10".to_string()),
                ..HostRef::new("h1", "d1")
            }],
        };

        sync.sync_all(&snapshot).await.unwrap();

        assert_eq!(
            graph.host_attributes("h1").await,
            Some((Some("00:00:00:00:00:01".to_string()), Some("10".to_string())))
        );
    }

    #[tokio::test]
    async fn test_phase_transitions_are_observable() {
        let graph = MemoryGraph::new();
        let sync = TopologySynchronizer::new(graph, SyncOptions::default());
        let mut phases = sync.subscribe();

        sync.sync_all(&topology(&["a"], &[], &[])).await.unwrap();

        assert!(phases.has_changed().unwrap());
        assert_eq!(*phases.borrow_and_update(), SyncPhase::Idle);
    }
}
