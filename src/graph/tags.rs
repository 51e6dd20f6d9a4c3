//! Tag labels attached to entities. Labels are created on first use and,
//! when pruning is enabled, dropped once nothing carries them.

use rusqlite::{params, Connection};

use super::entity;
use super::write_audit_log;
use crate::error::{GraphError, GraphResult};

/// Trim a label and reject empty or control-character labels. Case is kept.
pub fn normalize_label(label: &str) -> GraphResult<String> {
    let label = label.trim();
    if label.is_empty() {
        return Err(GraphError::invalid("tag label must not be empty"));
    }
    if label.chars().any(char::is_control) {
        return Err(GraphError::invalid(format!("tag label has control characters: {label:?}")));
    }
    Ok(label.to_string())
}

/// Attach `label` to `entity_id`. Returns `false` if it was already attached.
pub fn tag(conn: &Connection, entity_id: &str, label: &str) -> GraphResult<bool> {
    let label = normalize_label(label)?;
    entity::require(conn, entity_id)?;

    conn.execute("INSERT OR IGNORE INTO tags (label) VALUES (?1)", [&label])?;
    let attached = conn.execute(
        "INSERT OR IGNORE INTO entity_tags (entity_id, tag_id)
         SELECT ?1, id FROM tags WHERE label = ?2",
        params![entity_id, label],
    )?;
    if attached == 0 {
        return Ok(false);
    }

    entity::touch(conn, entity_id)?;
    write_audit_log(
        conn,
        "tag",
        entity_id,
        Some(&serde_json::json!({ "label": label })),
    )?;
    Ok(true)
}

/// Detach `label` from `entity_id`. Returns `false` if it was not attached.
pub fn untag(conn: &Connection, entity_id: &str, label: &str) -> GraphResult<bool> {
    let label = normalize_label(label)?;
    entity::require(conn, entity_id)?;

    let detached = conn.execute(
        "DELETE FROM entity_tags
         WHERE entity_id = ?1 AND tag_id = (SELECT id FROM tags WHERE label = ?2)",
        params![entity_id, label],
    )?;
    if detached == 0 {
        return Ok(false);
    }

    entity::touch(conn, entity_id)?;
    write_audit_log(
        conn,
        "untag",
        entity_id,
        Some(&serde_json::json!({ "label": label })),
    )?;
    Ok(true)
}

/// Labels on `entity_id`, sorted.
pub fn tags_for(conn: &Connection, entity_id: &str) -> GraphResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.label FROM entity_tags et JOIN tags t ON t.id = et.tag_id
         WHERE et.entity_id = ?1 ORDER BY t.label",
    )?;
    let labels = stmt
        .query_map([entity_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(labels)
}

/// Delete labels no entity carries. Returns how many were removed.
pub fn prune_orphan_tags(conn: &Connection) -> GraphResult<usize> {
    let removed = conn.execute(
        "DELETE FROM tags WHERE id NOT IN (SELECT DISTINCT tag_id FROM entity_tags)",
        [],
    )?;
    if removed > 0 {
        tracing::debug!(removed, "pruned orphan tags");
    }
    Ok(removed)
}
