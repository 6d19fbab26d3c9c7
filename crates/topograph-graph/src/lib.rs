//! # Topograph Graph
//!
//! Neo4j property-graph mirror of a network topology.
//!
//! Provides translation of topology entities into idempotent graph
//! mutations, transactional sessions on Neo4j (or an in-memory graph),
//! and the synchronizer that applies a full snapshot in dependency order.

pub mod client;
pub mod memory;
pub mod schema;
pub mod session;
pub mod sync;
pub mod upsert;

pub use client::{GraphConfig, Neo4jSession, Neo4jStore};
pub use memory::{MemoryGraph, MemorySession};
pub use session::{GraphCounts, GraphSession, GraphStore, RetryPolicy, RowSet, SessionError, SessionResult};
pub use sync::{SyncError, SyncOptions, SyncPhase, SyncResult, TopologySynchronizer};
pub use upsert::{HostAttributes, Mutation};
