//! Neo4j connection client.

use async_trait::async_trait;
use neo4rs::{BoltNull, BoltType, ConfigBuilder, Graph, Query};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::session::{
    GraphCounts, GraphSession, GraphStore, RetryPolicy, Row, RowSet, SessionError, SessionResult,
};
use crate::upsert::{Mutation, ParamValue};

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: usize,
    pub fetch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://127.0.0.1:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            database: "neo4j".to_string(),
            max_connections: 4,
            fetch_size: 200,
            retry: RetryPolicy::default(),
        }
    }
}

/// Map a Neo4j status code (`Neo.<Classification>.<Category>.<Title>`)
/// onto the session error taxonomy.
fn classify_status(code: &str, message: &str) -> SessionError {
    if code.starts_with("Neo.TransientError.") {
        SessionError::store(format!("{}: {}", code, message), true)
    } else if code.starts_with("Neo.ClientError.Statement.") {
        SessionError::Statement {
            code: code.to_string(),
            message: message.to_string(),
        }
    } else if code.starts_with("Neo.ClientError.Security.") {
        SessionError::Connection(format!("{}: {}", code, message))
    } else {
        SessionError::store(format!("{}: {}", code, message), false)
    }
}

/// Map a driver error onto the session error taxonomy.
fn classify(err: neo4rs::Error) -> SessionError {
    match err {
        neo4rs::Error::Neo4j(e) => classify_status(e.code(), e.message()),
        neo4rs::Error::AuthenticationError(msg) => SessionError::Connection(msg),
        e @ (neo4rs::Error::ConnectionError | neo4rs::Error::IOError { .. }) => {
            SessionError::store(e.to_string(), true)
        }
        e => SessionError::store(e.to_string(), false),
    }
}

/// Any failure while establishing a session means the store is unusable.
fn as_connection_error(err: neo4rs::Error) -> SessionError {
    match classify(err) {
        SessionError::Statement { code, message } => {
            SessionError::Connection(format!("{}: {}", code, message))
        }
        SessionError::Store { message, .. } => SessionError::Connection(message),
        e => e,
    }
}

fn to_query(mutation: &Mutation) -> Query {
    mutation
        .params()
        .into_iter()
        .fold(Query::new(mutation.statement().to_string()), |q, (key, value)| {
            match value {
                ParamValue::Str(s) => q.param(key, s),
                ParamValue::Null => q.param(key, BoltType::Null(BoltNull)),
            }
        })
}

fn to_row(row: &neo4rs::Row, columns: &[&str]) -> SessionResult<Row> {
    columns.iter().try_fold(Row::new(), |acc, column| {
        let value: i64 = row.get(column).map_err(|e| {
            SessionError::store(format!("Failed to get field '{}': {:?}", column, e), false)
        })?;
        Ok(acc.with(column, value))
    })
}

/// Neo4j graph store.
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
    retry: RetryPolicy,
}

impl Neo4jStore {
    /// Create a new store from config.
    ///
    /// Note: neo4rs uses a lazy pool. `Graph::connect` only creates the pool
    /// object and does NOT establish a real bolt connection yet, so we run a
    /// `RETURN 1` ping to get a fast failure when Neo4j is unreachable or
    /// rejects the credentials.
    pub async fn connect(config: &GraphConfig) -> SessionResult<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| SessionError::Connection(format!("Invalid Neo4j config: {}", e)))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(as_connection_error)?;

        let store = Self {
            graph,
            retry: config.retry,
        };
        store.ping().await?;

        info!(uri = %config.uri, database = %config.database, "Connected to Neo4j");
        Ok(store)
    }

    async fn ping(&self) -> SessionResult<()> {
        self.graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .map_err(as_connection_error)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    type Session = Neo4jSession;

    async fn open(&self) -> SessionResult<Neo4jSession> {
        self.ping().await?;
        Ok(Neo4jSession {
            graph: self.graph.clone(),
            retry: self.retry,
        })
    }
}

/// Session on a [`Neo4jStore`]. Pooled connections go back to the pool
/// when the session is dropped, on every exit path.
pub struct Neo4jSession {
    graph: Graph,
    retry: RetryPolicy,
}

impl Neo4jSession {
    /// Execute a query and return a single scalar value.
    async fn query_scalar(&self, cypher: &str, field: &str) -> SessionResult<Option<i64>> {
        let mut result = self
            .graph
            .execute(Query::new(cypher.to_string()))
            .await
            .map_err(classify)?;

        match result.next().await.map_err(classify)? {
            Some(row) => Ok(Some(to_row(&row, &[field])?.get(field).unwrap_or(0))),
            None => Ok(None),
        }
    }
}

/// Run every mutation inside one transaction, rolling back on failure.
async fn run_in_transaction(graph: &Graph, mutations: &[Mutation]) -> SessionResult<Vec<RowSet>> {
    let mut txn = graph.start_txn().await.map_err(classify)?;
    let mut results = Vec::with_capacity(mutations.len());

    for mutation in mutations {
        let outcome = async {
            let mut stream = txn.execute(to_query(mutation)).await.map_err(classify)?;
            let mut rows = RowSet::empty();
            while let Some(row) = stream.next(txn.handle()).await.map_err(classify)? {
                rows.push(to_row(&row, mutation.columns())?);
            }
            Ok::<_, SessionError>(rows)
        }
        .await;

        match outcome {
            Ok(rows) => results.push(rows),
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                return Err(e);
            }
        }
    }

    txn.commit().await.map_err(classify)?;
    Ok(results)
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn run(&mut self, mutation: &Mutation) -> SessionResult<RowSet> {
        let mut result = self.graph.execute(to_query(mutation)).await.map_err(classify)?;

        let mut rows = RowSet::empty();
        while let Some(row) = result.next().await.map_err(classify)? {
            rows.push(to_row(&row, mutation.columns())?);
        }
        Ok(rows)
    }

    async fn write_transaction(&mut self, mutations: &[Mutation]) -> SessionResult<Vec<RowSet>> {
        let graph = &self.graph;
        self.retry
            .run("write transaction", || run_in_transaction(graph, mutations))
            .await
    }

    /// Node and relationship counts for status display.
    async fn counts(&mut self) -> SessionResult<GraphCounts> {
        let nodes = self
            .query_scalar("MATCH (n) RETURN count(n) as count", "count")
            .await?
            .unwrap_or(0);
        let relationships = self
            .query_scalar("MATCH ()-[r]->() RETURN count(r) as count", "count")
            .await?
            .unwrap_or(0);

        Ok(GraphCounts {
            nodes: nodes as usize,
            relationships: relationships as usize,
        })
    }

    async fn close(self) {
        debug!("Closed Neo4j session");
    }
}
