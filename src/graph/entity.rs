//! The id registry shared by all kinds: existence checks, typed `get`, and the
//! delete path that tombstones notes and detaches tags and memberships.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::types::{Entity, EntityKind};
use super::{artifact, collection, fragment, note, thing, write_audit_log};
use crate::error::{GraphError, GraphResult};

/// What a delete removed and which notes it left tombstoned.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteResult {
    pub id: String,
    /// Every entity removed, the target last.
    pub removed: Vec<String>,
    /// Notes whose subject was removed by this delete.
    pub tombstoned_notes: Vec<String>,
}

/// Kind of the registered entity `id`, or `None` if no such entity exists.
pub fn kind_of(conn: &Connection, id: &str) -> GraphResult<Option<EntityKind>> {
    let kind: Option<String> = conn
        .query_row("SELECT kind FROM entities WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    kind.map(|k| k.parse().map_err(GraphError::InvalidInput))
        .transpose()
}

pub fn exists(conn: &Connection, id: &str) -> GraphResult<bool> {
    Ok(kind_of(conn, id)?.is_some())
}

/// Kind of `id`, or `NotFound`.
pub(crate) fn require(conn: &Connection, id: &str) -> GraphResult<EntityKind> {
    kind_of(conn, id)?.ok_or_else(|| GraphError::not_found("entity", id))
}

/// Succeeds only if `id` is a registered entity of `kind`.
pub(crate) fn require_kind(conn: &Connection, id: &str, kind: EntityKind) -> GraphResult<()> {
    match kind_of(conn, id)? {
        Some(k) if k == kind => Ok(()),
        _ => Err(GraphError::not_found(kind.as_str(), id)),
    }
}

/// Use `explicit` if given (validated and never used), otherwise mint a fresh id.
///
/// A deleted id stays retired: tombstoned notes and the audit log still refer
/// to it, so handing it to a new entity would silently change their meaning.
pub(crate) fn resolve_id(
    conn: &Connection,
    kind: EntityKind,
    explicit: Option<&str>,
) -> GraphResult<String> {
    match explicit {
        Some(id) => {
            kind.check_id(id)?;
            if exists(conn, id)? {
                return Err(GraphError::invalid(format!("id already in use: {id}")));
            }
            if retired(conn, id)? {
                return Err(GraphError::invalid(format!(
                    "id belonged to a deleted entity and cannot be reused: {id}"
                )));
            }
            Ok(id.to_string())
        }
        None => Ok(kind.new_id()),
    }
}

fn retired(conn: &Connection, id: &str) -> GraphResult<bool> {
    let retired: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM graph_log WHERE entity_id = ?1 AND operation = 'delete')
             OR EXISTS(SELECT 1 FROM notes WHERE subject_id = ?1 AND subject_live = 0)",
        [id],
        |row| row.get(0),
    )?;
    Ok(retired)
}

/// Insert the registry row. Typed rows are inserted by the caller afterwards.
pub(crate) fn register(conn: &Connection, id: &str, kind: EntityKind, now: &str) -> GraphResult<()> {
    conn.execute(
        "INSERT INTO entities (id, kind, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![id, kind.as_str(), now],
    )?;
    Ok(())
}

pub(crate) fn touch(conn: &Connection, id: &str) -> GraphResult<()> {
    conn.execute(
        "UPDATE entities SET updated_at = ?1 WHERE id = ?2",
        params![super::now(), id],
    )?;
    Ok(())
}

pub(crate) fn timestamps(conn: &Connection, id: &str) -> GraphResult<(String, String)> {
    conn.query_row(
        "SELECT created_at, updated_at FROM entities WHERE id = ?1",
        [id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or_else(|| GraphError::not_found("entity", id))
}

/// Typed record for any id.
pub fn get(conn: &Connection, id: &str) -> GraphResult<Entity> {
    Ok(match require(conn, id)? {
        EntityKind::Thing => Entity::Thing(thing::get_thing(conn, id)?),
        EntityKind::Artifact => Entity::Artifact(artifact::get_artifact(conn, id)?),
        EntityKind::Fragment => Entity::Fragment(fragment::get_fragment(conn, id)?),
        EntityKind::Note => Entity::Note(note::get_note(conn, id)?),
        EntityKind::Collection => Entity::Collection(collection::get_collection(conn, id)?),
    })
}

/// Ids of every entity of `kind`, oldest first.
pub fn list_ids(conn: &Connection, kind: EntityKind) -> GraphResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT id FROM entities WHERE kind = ?1 ORDER BY created_at, id")?;
    let ids = stmt
        .query_map([kind.as_str()], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Delete any entity by id, dispatching on its kind.
///
/// Fragments cannot be deleted on their own; they go with their artifact.
pub fn delete(conn: &Connection, id: &str, cascade: bool) -> GraphResult<DeleteResult> {
    match require(conn, id)? {
        EntityKind::Thing => thing::delete_thing(conn, id),
        EntityKind::Artifact => artifact::delete_artifact(conn, id, cascade),
        EntityKind::Note => note::delete_note(conn, id),
        EntityKind::Collection => collection::delete_collection(conn, id),
        EntityKind::Fragment => Err(GraphError::InvalidTransition {
            id: id.to_string(),
            reason: "fragments are deleted together with their artifact".into(),
        }),
    }
}

/// Remove one entity: tombstone notes about it, then drop the registry row,
/// which cascades to its typed row, tag links and memberships (and clears
/// `represents` on artifacts pointing at a deleted thing).
pub(crate) fn remove(conn: &Connection, id: &str, result: &mut DeleteResult) -> GraphResult<()> {
    let tombstoned = tombstone_notes_about(conn, id)?;
    for note_id in &tombstoned {
        tracing::warn!(note_id = %note_id, subject_id = %id, "note subject deleted; tombstoned");
        write_audit_log(
            conn,
            "tombstone",
            note_id,
            Some(&serde_json::json!({ "subject_id": id })),
        )?;
    }
    result.tombstoned_notes.extend(tombstoned);

    let deleted = conn.execute("DELETE FROM entities WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(GraphError::not_found("entity", id));
    }
    write_audit_log(conn, "delete", id, None)?;
    result.removed.push(id.to_string());
    Ok(())
}

fn tombstone_notes_about(conn: &Connection, subject_id: &str) -> GraphResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "UPDATE notes SET subject_live = 0 WHERE subject_id = ?1 AND subject_live = 1 RETURNING id",
    )?;
    let mut ids = stmt
        .query_map([subject_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    ids.sort();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::graph::note::NewNote;
    use crate::graph::thing::NewThing;
    use crate::graph::types::NoteSubject;

    #[test]
    fn kind_of_unknown_is_none() {
        let conn = open_memory_database().unwrap();
        assert_eq!(kind_of(&conn, "thing-missing").unwrap(), None);
        let err = require(&conn, "thing-missing").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn resolve_id_rejects_reuse() {
        let conn = open_memory_database().unwrap();
        let id = thing::create_thing(&conn, &NewThing::named("x")).unwrap();
        let err = resolve_id(&conn, EntityKind::Thing, Some(&id)).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert_eq!(
            resolve_id(&conn, EntityKind::Thing, Some("thing-custom")).unwrap(),
            "thing-custom"
        );
    }

    #[test]
    fn get_dispatches_on_kind() {
        let conn = open_memory_database().unwrap();
        let id = thing::create_thing(&conn, &NewThing::named("Paper")).unwrap();
        match get(&conn, &id).unwrap() {
            Entity::Thing(t) => assert_eq!(t.name, "Paper"),
            other => panic!("expected thing, got {:?}", other.kind()),
        }
    }

    #[test]
    fn delete_tombstones_notes_and_keeps_them() {
        let conn = open_memory_database().unwrap();
        let thing_id = thing::create_thing(&conn, &NewThing::named("Paper")).unwrap();
        let note_id = note::create_note(&conn, &NewNote::about(&thing_id, "interesting")).unwrap();

        let result = delete(&conn, &thing_id, false).unwrap();
        assert_eq!(result.removed, vec![thing_id.clone()]);
        assert_eq!(result.tombstoned_notes, vec![note_id.clone()]);

        let note = note::get_note(&conn, &note_id).unwrap();
        assert_eq!(note.subject, NoteSubject::Tombstone { id: thing_id });
    }

    #[test]
    fn fragments_cannot_be_deleted_alone() {
        let conn = open_memory_database().unwrap();
        let artifact_id = artifact::tests::inline_artifact(&conn, b"hello");
        let frag =
            fragment::create_fragment(&conn, &fragment::NewFragment::of(&artifact_id, "hello"))
                .unwrap();
        let err = delete(&conn, &frag, true).unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
    }
}
