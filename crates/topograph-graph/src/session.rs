//! Transactional access to the graph store.
//!
//! [`GraphStore`] hands out sessions; a [`GraphSession`] runs
//! [`Mutation`]s either one at a time in auto-commit mode or as a unit
//! of work inside one explicit transaction. Two implementations exist:
//! the Neo4j one in [`crate::client`] and the in-process
//! [`crate::memory::MemoryGraph`].

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::upsert::Mutation;

/// Errors surfaced by a graph session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Store unreachable or credentials rejected.
    #[error("Cannot connect to graph store: {0}")]
    Connection(String),

    /// The store rejected the statement itself.
    #[error("Statement rejected ({code}): {message}")]
    Statement { code: String, message: String },

    #[error("Graph store error: {message}")]
    Store { message: String, transient: bool },
}

impl SessionError {
    pub fn store(message: impl Into<String>, transient: bool) -> Self {
        Self::Store {
            message: message.into(),
            transient,
        }
    }

    /// Whether retrying the same unit of work may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store { transient: true, .. })
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// One result row: named integer columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(BTreeMap<String, i64>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: i64) -> Self {
        self.0.insert(column.to_string(), value);
        self
    }

    pub fn get(&self, column: &str) -> Option<i64> {
        self.0.get(column).copied()
    }
}

/// Rows returned by one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    rows: Vec<Row>,
}

impl RowSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(row: Row) -> Self {
        Self { rows: vec![row] }
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Value of `column` in the first row.
    pub fn first_value(&self, column: &str) -> Option<i64> {
        self.rows.first().and_then(|row| row.get(column))
    }
}

/// Node and relationship counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub nodes: usize,
    pub relationships: usize,
}

/// Retry policy for units of work hitting transient store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. `1` disables retries.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before retry number `retry` (1-based), doubling each time.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> SessionResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SessionResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient graph store error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}

/// Hands out sessions on a graph store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    type Session: GraphSession;

    /// Acquire a session. Fails with [`SessionError::Connection`] when the
    /// store cannot be reached.
    async fn open(&self) -> SessionResult<Self::Session>;
}

/// A session on the graph store. Not shared between concurrent units of
/// work.
#[async_trait]
pub trait GraphSession: Send {
    /// Run one statement in an auto-commit transaction.
    async fn run(&mut self, mutation: &Mutation) -> SessionResult<RowSet>;

    /// Run all `mutations` in order inside one explicit transaction,
    /// retrying the whole unit on transient errors. Either every mutation
    /// is committed or none is.
    async fn write_transaction(&mut self, mutations: &[Mutation]) -> SessionResult<Vec<RowSet>>;

    async fn counts(&mut self) -> SessionResult<GraphCounts>;

    /// Release the session.
    async fn close(self);
}
