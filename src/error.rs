//! Typed error taxonomy shared by the content store and the entity graph.
//!
//! Every core operation returns [`GraphResult`]. Callers match on the variant
//! (or on [`GraphError::kind`]) to decide whether to retry; the core itself
//! never retries.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    /// A referenced entity or stored payload does not exist.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Illegal state change (e.g. reassigning an artifact's represented thing).
    #[error("invalid transition for {id}: {reason}")]
    InvalidTransition { id: String, reason: String },

    /// Extensional/intensional operation mismatch on a collection.
    #[error("collection {id} is {mode}: {operation} is not allowed")]
    WrongMode {
        id: String,
        mode: &'static str,
        operation: &'static str,
    },

    /// The write would make a note transitively about itself.
    #[error("aboutness cycle: {note_id} would be about itself via {subject_id}")]
    CycleDetected { note_id: String, subject_id: String },

    /// Delete blocked because dependents exist and cascade was not requested.
    #[error("{id} has {count} dependent {dependents}; pass cascade to delete them")]
    HasDependents {
        id: String,
        count: usize,
        dependents: &'static str,
    },

    /// The caller-supplied deadline passed before the operation could apply.
    #[error("deadline exceeded during {operation}")]
    Timeout { operation: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;

impl GraphError {
    /// Stable snake_case code for surfacing the error kind to CLI/MCP callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::WrongMode { .. } => "wrong_mode",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::HasDependents { .. } => "has_dependents",
            Self::Timeout { .. } => "timeout",
            Self::InvalidInput(_) => "invalid_input",
            Self::Database(_) => "database",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }

    pub(crate) fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

// SQLite lock contention only surfaces once busy_timeout (bounded by the
// operation deadline) has elapsed, so it is reported as a timeout.
impl From<rusqlite::Error> for GraphError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => Self::Timeout {
                operation: format!("database lock wait ({err})"),
            },
            _ => Self::Database(err),
        }
    }
}
