//! Centralized error types for topology sources.

use thiserror::Error;

/// Error type for reading a topology snapshot.
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Unknown link type: {0}")]
    UnknownLinkKind(String),

    #[error("Invalid {entity} '{id}': {reason}")]
    InvalidEntity {
        entity: &'static str,
        id: String,
        reason: String,
    },

    #[error("Topology source unavailable: {0}")]
    Unavailable(String),

    #[error("Topology source returned {status} for {path}")]
    BadStatus { status: u16, path: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

impl TopologyError {
    /// Create an invalid entity error.
    pub fn invalid(entity: &'static str, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntity {
            entity,
            id: id.into(),
            reason: reason.into(),
        }
    }
}
