//! Collections group entities either explicitly (extensional) or by a stored
//! logical query re-evaluated on every read (intensional). The mode is fixed
//! at creation and each mode rejects the other's writes with `WrongMode`.

use rusqlite::{params, Connection, OptionalExtension};

use super::entity::{self, DeleteResult};
use super::query;
use super::tags::tags_for;
use super::types::{Collection, EntityKind, Membership};
use super::{now, write_audit_log};
use crate::error::{GraphError, GraphResult};

/// Input for [`create_collection`]. A `query` makes the collection intensional.
#[derive(Debug, Clone, Default)]
pub struct NewCollection {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub query: Option<String>,
}

pub fn create_collection(conn: &Connection, new: &NewCollection) -> GraphResult<String> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(GraphError::invalid("collection name must not be empty"));
    }
    let query = match new.query.as_deref().map(str::trim) {
        Some(q) => {
            query::parse(q)?;
            Some(q)
        }
        None => None,
    };
    let mode = if query.is_some() { "intensional" } else { "extensional" };

    let id = entity::resolve_id(conn, EntityKind::Collection, new.id.as_deref())?;
    let ts = now();
    entity::register(conn, &id, EntityKind::Collection, &ts)?;
    conn.execute(
        "INSERT INTO collections (id, name, description, mode, logical_query)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, name, new.description, mode, query],
    )?;

    write_audit_log(
        conn,
        "create",
        &id,
        Some(&serde_json::json!({ "kind": "collection", "mode": mode, "query": query })),
    )?;
    tracing::info!(id = %id, name, mode, "collection created");
    Ok(id)
}

pub fn get_collection(conn: &Connection, id: &str) -> GraphResult<Collection> {
    let (name, description, logical_query, created_at, updated_at) = conn
        .query_row(
            "SELECT c.name, c.description, c.logical_query, e.created_at, e.updated_at
             FROM collections c JOIN entities e ON e.id = c.id WHERE c.id = ?1",
            [id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| GraphError::not_found("collection", id))?;

    Ok(Collection {
        id: id.to_string(),
        name,
        description,
        membership: match logical_query {
            Some(query) => Membership::Intensional { query },
            None => Membership::Extensional,
        },
        tags: tags_for(conn, id)?,
        created_at,
        updated_at,
    })
}

fn membership(conn: &Connection, id: &str) -> GraphResult<Membership> {
    let query: Option<Option<String>> = conn
        .query_row(
            "SELECT logical_query FROM collections WHERE id = ?1",
            [id],
            |row| row.get(0),
        )
        .optional()?;
    match query {
        None => Err(GraphError::not_found("collection", id)),
        Some(Some(query)) => Ok(Membership::Intensional { query }),
        Some(None) => Ok(Membership::Extensional),
    }
}

fn require_extensional(conn: &Connection, id: &str, operation: &'static str) -> GraphResult<()> {
    match membership(conn, id)? {
        Membership::Extensional => Ok(()),
        other => Err(GraphError::WrongMode {
            id: id.to_string(),
            mode: other.mode_str(),
            operation,
        }),
    }
}

/// Add `member_id` at the end of an extensional collection. Returns `false`
/// if it was already a member.
pub fn add_member(conn: &Connection, collection_id: &str, member_id: &str) -> GraphResult<bool> {
    require_extensional(conn, collection_id, "add_member")?;
    if collection_id == member_id {
        return Err(GraphError::invalid("a collection cannot contain itself"));
    }
    entity::require(conn, member_id)?;

    let added = conn.execute(
        "INSERT OR IGNORE INTO collection_members (collection_id, member_id, position)
         SELECT ?1, ?2, COALESCE(MAX(position), 0) + 1
         FROM collection_members WHERE collection_id = ?1",
        params![collection_id, member_id],
    )?;
    if added == 0 {
        return Ok(false);
    }

    entity::touch(conn, collection_id)?;
    write_audit_log(
        conn,
        "member_add",
        collection_id,
        Some(&serde_json::json!({ "member_id": member_id })),
    )?;
    Ok(true)
}

/// Remove `member_id` from an extensional collection. Returns `false` if it
/// was not a member.
pub fn remove_member(conn: &Connection, collection_id: &str, member_id: &str) -> GraphResult<bool> {
    require_extensional(conn, collection_id, "remove_member")?;

    let removed = conn.execute(
        "DELETE FROM collection_members WHERE collection_id = ?1 AND member_id = ?2",
        params![collection_id, member_id],
    )?;
    if removed == 0 {
        return Ok(false);
    }

    entity::touch(conn, collection_id)?;
    write_audit_log(
        conn,
        "member_remove",
        collection_id,
        Some(&serde_json::json!({ "member_id": member_id })),
    )?;
    Ok(true)
}

/// Replace the stored query of an intensional collection.
pub fn set_query(conn: &Connection, collection_id: &str, query_text: &str) -> GraphResult<()> {
    let current = membership(conn, collection_id)?;
    if current == Membership::Extensional {
        return Err(GraphError::WrongMode {
            id: collection_id.to_string(),
            mode: current.mode_str(),
            operation: "set_query",
        });
    }
    let query_text = query_text.trim();
    query::parse(query_text)?;

    conn.execute(
        "UPDATE collections SET logical_query = ?1 WHERE id = ?2",
        params![query_text, collection_id],
    )?;
    entity::touch(conn, collection_id)?;
    write_audit_log(
        conn,
        "query",
        collection_id,
        Some(&serde_json::json!({ "query": query_text })),
    )?;
    Ok(())
}

/// Current members. Extensional collections list stored members in insertion
/// order; intensional collections evaluate their query now, sorted by id.
/// A collection never lists itself.
pub fn resolve_members(conn: &Connection, collection_id: &str) -> GraphResult<Vec<String>> {
    match membership(conn, collection_id)? {
        Membership::Extensional => {
            let mut stmt = conn.prepare(
                "SELECT member_id FROM collection_members
                 WHERE collection_id = ?1 ORDER BY position",
            )?;
            let ids = stmt
                .query_map([collection_id], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(ids)
        }
        Membership::Intensional { query: text } => {
            let expr = query::parse(&text)?;
            query::evaluate(conn, &expr, Some(collection_id))
        }
    }
}

/// Extensional collections that list `member_id`.
pub fn collections_containing(conn: &Connection, member_id: &str) -> GraphResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT collection_id FROM collection_members WHERE member_id = ?1 ORDER BY collection_id",
    )?;
    let ids = stmt
        .query_map([member_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn delete_collection(conn: &Connection, id: &str) -> GraphResult<DeleteResult> {
    entity::require_kind(conn, id, EntityKind::Collection)?;
    let mut result = DeleteResult {
        id: id.to_string(),
        ..DeleteResult::default()
    };
    entity::remove(conn, id, &mut result)?;
    Ok(result)
}
