//! The typed research graph: things, artifacts, fragments, notes and
//! collections, plus tags, aboutness and provenance. Agents and the
//! operations they record sit beside the registry.
//!
//! Functions here take a `&Connection` and do not open transactions of their
//! own; the caller wraps them with [`txn::write`] or [`txn::read`] so that each
//! public operation applies atomically.

pub mod agent;
pub mod artifact;
pub mod collection;
pub mod entity;
pub mod fragment;
pub mod index;
pub mod note;
pub mod provenance;
pub mod query;
pub mod stats;
pub mod tags;
pub mod thing;
pub mod txn;
pub mod types;

pub use types::{
    Agent, AgentType, Artifact, ArtifactStatus, ArtifactStorage, Collection, Entity, EntityKind,
    Fragment, Membership, Note, NoteSubject, ProvenanceRecord, Thing,
};

use rusqlite::{params, Connection};

use crate::error::GraphResult;

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Append an entry to the graph audit log.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    entity_id: &str,
    details: Option<&serde_json::Value>,
) -> GraphResult<()> {
    conn.execute(
        "INSERT INTO graph_log (operation, entity_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            operation,
            entity_id,
            details.map(|d| d.to_string()),
            now()
        ],
    )?;
    Ok(())
}
