//! Neo4j schema initialization (constraints and indexes).

use tracing::info;

use crate::session::{GraphSession, SessionResult};
use crate::upsert::Mutation;

/// Cypher statements for schema initialization.
const SCHEMA_STATEMENTS: &[&str] = &[
    // Uniqueness constraints, one node per topology id
    "CREATE CONSTRAINT device_id IF NOT EXISTS FOR (d:Device) REQUIRE d.id IS UNIQUE",
    "CREATE CONSTRAINT host_id IF NOT EXISTS FOR (h:Host) REQUIRE h.id IS UNIQUE",
    // Lookups by link type
    "CREATE INDEX link_type IF NOT EXISTS FOR ()-[l:LINK]-() ON (l.type)",
];

/// Schema statements as mutations.
pub fn schema_mutations() -> Vec<Mutation> {
    SCHEMA_STATEMENTS.iter().copied().map(Mutation::Schema).collect()
}

/// Initialize Neo4j schema with constraints and indexes.
///
/// Safe to run multiple times - uses IF NOT EXISTS clauses. Each statement
/// runs in its own auto-commit transaction since schema changes cannot
/// share a transaction with data writes.
pub async fn initialize_schema<S: GraphSession>(session: &mut S) -> SessionResult<usize> {
    info!("Initializing Neo4j schema...");

    let statements = schema_mutations();
    for statement in &statements {
        session.run(statement).await?;
    }

    info!("Neo4j schema initialized ({} statements)", statements.len());
    Ok(statements.len())
}
