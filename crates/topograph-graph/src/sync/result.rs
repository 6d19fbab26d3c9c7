//! Outcome of a synchronization pass.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::session::SessionError;

/// Identifies one topology entity in a pass report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityKey {
    Device { id: String },
    Link { src: String, dst: String, link_type: String },
    Host { id: String },
}

impl EntityKey {
    /// The entity's own identifier. Links are named by their endpoints.
    pub fn id(&self) -> String {
        match self {
            Self::Device { id } | Self::Host { id } => id.clone(),
            Self::Link { src, dst, link_type } => format!("{}-{}/{}", src, dst, link_type),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device { id } => write!(f, "device {}", id),
            Self::Link { src, dst, link_type } => write!(f, "link {} -> {} ({})", src, dst, link_type),
            Self::Host { id } => write!(f, "host {}", id),
        }
    }
}

/// Why an entity could not be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The store rejected the statement. Indicates a translation bug.
    Statement,
    /// Store-side failure, after retries where applicable.
    Store,
    /// The session dropped mid-pass.
    Connection,
}

impl From<&SessionError> for FailureKind {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::Statement { .. } => Self::Statement,
            SessionError::Store { .. } => Self::Store,
            SessionError::Connection(_) => Self::Connection,
        }
    }
}

/// An entity whose mutations were rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFailure {
    pub entity: EntityKey,
    pub kind: FailureKind,
    pub cause: String,
}

/// A relationship that was not recorded because a device it references
/// is not in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingSkip {
    pub entity: EntityKey,
    /// Referenced device ids that were absent.
    pub missing_devices: Vec<String>,
}

/// Result of a sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub nodes_removed: usize,
    pub nodes_created: usize,
    pub nodes_matched: usize,
    pub relationships_created: usize,
    pub relationships_matched: usize,
    pub failures: Vec<EntityFailure>,
    pub skips: Vec<DanglingSkip>,
}

impl SyncResult {
    pub fn new(pass_id: Uuid) -> Self {
        Self {
            pass_id,
            started_at: Utc::now(),
            finished_at: None,
            nodes_removed: 0,
            nodes_created: 0,
            nodes_matched: 0,
            relationships_created: 0,
            relationships_matched: 0,
            failures: Vec::new(),
            skips: Vec::new(),
        }
    }

    /// True when every entity was written. Dangling skips do not count as
    /// failures.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Ids of the entities that failed, in the order they were reported.
    pub fn failed_ids(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.entity.id()).collect()
    }

    pub fn is_skipped(&self, entity: &EntityKey) -> bool {
        self.skips.iter().any(|s| &s.entity == entity)
    }

    pub(crate) fn record_node(&mut self, created: bool) {
        if created {
            self.nodes_created += 1;
        } else {
            self.nodes_matched += 1;
        }
    }

    pub(crate) fn record_relationship(&mut self, created: bool) {
        if created {
            self.relationships_created += 1;
        } else {
            self.relationships_matched += 1;
        }
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration of the pass, once finished.
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}
