//! Notes: annotations that are *about* exactly one other entity.
//!
//! The aboutness relation must stay acyclic. Only notes have outgoing
//! aboutness edges, so a cycle can only form through a chain of notes; every
//! write that sets a subject walks that chain first.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

use super::agent;
use super::entity::{self, DeleteResult};
use super::tags::{self, tags_for};
use super::types::{EntityKind, Note, NoteSubject};
use super::{now, write_audit_log};
use crate::error::{GraphError, GraphResult};

/// Input for [`create_note`].
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub id: Option<String>,
    pub subject_id: String,
    pub content: String,
    pub name: Option<String>,
    pub confidence: Option<f64>,
    pub tags: Vec<String>,
    /// Agent writing the note; must already exist.
    pub author_id: Option<String>,
}

impl NewNote {
    pub fn about(subject_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Changes applied by [`update_note`]. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub name: Option<String>,
    pub confidence: Option<f64>,
}

fn check_confidence(confidence: Option<f64>) -> GraphResult<()> {
    match confidence {
        Some(c) if !(0.0..=1.0).contains(&c) => Err(GraphError::invalid(format!(
            "confidence must be between 0.0 and 1.0, got {c}"
        ))),
        _ => Ok(()),
    }
}

pub fn create_note(conn: &Connection, new: &NewNote) -> GraphResult<String> {
    if new.content.trim().is_empty() {
        return Err(GraphError::invalid("note content must not be empty"));
    }
    check_confidence(new.confidence)?;
    if new.id.as_deref() == Some(new.subject_id.as_str()) {
        return Err(GraphError::CycleDetected {
            note_id: new.subject_id.clone(),
            subject_id: new.subject_id.clone(),
        });
    }
    entity::require(conn, &new.subject_id)?;
    if let Some(author) = &new.author_id {
        agent::require_agent(conn, author)?;
    }
    let labels = new
        .tags
        .iter()
        .map(|t| tags::normalize_label(t))
        .collect::<GraphResult<Vec<_>>>()?;

    let id = entity::resolve_id(conn, EntityKind::Note, new.id.as_deref())?;
    ensure_acyclic(conn, &id, &new.subject_id)?;

    let ts = now();
    entity::register(conn, &id, EntityKind::Note, &ts)?;
    conn.execute(
        "INSERT INTO notes (id, name, content, confidence, subject_id, subject_live, author_id)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
        params![id, new.name, new.content, new.confidence, new.subject_id, new.author_id],
    )?;
    for label in &labels {
        tags::tag(conn, &id, label)?;
    }

    write_audit_log(
        conn,
        "create",
        &id,
        Some(&serde_json::json!({
            "kind": "note",
            "subject_id": new.subject_id,
            "author_id": new.author_id,
        })),
    )?;
    tracing::info!(id = %id, subject_id = %new.subject_id, "note created");
    Ok(id)
}

pub fn get_note(conn: &Connection, id: &str) -> GraphResult<Note> {
    let row = conn
        .query_row(
            "SELECT n.name, n.content, n.confidence, n.subject_id, n.subject_live,
                    e.created_at, e.updated_at, n.author_id
             FROM notes n JOIN entities e ON e.id = n.id WHERE n.id = ?1",
            [id],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| GraphError::not_found("note", id))?;

    let (name, content, confidence, subject_id, live, created_at, updated_at, author_id) = row;
    Ok(Note {
        id: id.to_string(),
        name,
        content,
        confidence,
        subject: if live {
            NoteSubject::Live { id: subject_id }
        } else {
            NoteSubject::Tombstone { id: subject_id }
        },
        author_id,
        tags: tags_for(conn, id)?,
        created_at,
        updated_at,
    })
}

/// Append a paragraph to the note body.
pub fn append_note_content(conn: &Connection, id: &str, text: &str) -> GraphResult<Note> {
    if text.trim().is_empty() {
        return Err(GraphError::invalid("appended text must not be empty"));
    }
    let updated = conn.execute(
        "UPDATE notes SET content = content || char(10) || ?1 WHERE id = ?2",
        params![text, id],
    )?;
    if updated == 0 {
        return Err(GraphError::not_found("note", id));
    }
    entity::touch(conn, id)?;
    write_audit_log(
        conn,
        "update",
        id,
        Some(&serde_json::json!({ "appended_chars": text.chars().count() })),
    )?;
    get_note(conn, id)
}

pub fn update_note(conn: &Connection, id: &str, changes: &NoteUpdate) -> GraphResult<Note> {
    check_confidence(changes.confidence)?;
    entity::require_kind(conn, id, EntityKind::Note)?;

    if let Some(name) = &changes.name {
        conn.execute("UPDATE notes SET name = ?1 WHERE id = ?2", params![name, id])?;
    }
    if let Some(confidence) = changes.confidence {
        conn.execute(
            "UPDATE notes SET confidence = ?1 WHERE id = ?2",
            params![confidence, id],
        )?;
    }
    if changes.name.is_some() || changes.confidence.is_some() {
        entity::touch(conn, id)?;
        write_audit_log(
            conn,
            "update",
            id,
            Some(&serde_json::json!({ "name": changes.name, "confidence": changes.confidence })),
        )?;
    }
    get_note(conn, id)
}

/// Point a note at a new subject. Also revives a tombstoned note.
pub fn retarget_note(conn: &Connection, id: &str, subject_id: &str) -> GraphResult<()> {
    entity::require_kind(conn, id, EntityKind::Note)?;
    entity::require(conn, subject_id)?;
    ensure_acyclic(conn, id, subject_id)?;

    conn.execute(
        "UPDATE notes SET subject_id = ?1, subject_live = 1 WHERE id = ?2",
        params![subject_id, id],
    )?;
    entity::touch(conn, id)?;
    write_audit_log(
        conn,
        "update",
        id,
        Some(&serde_json::json!({ "subject_id": subject_id })),
    )?;
    Ok(())
}

pub fn delete_note(conn: &Connection, id: &str) -> GraphResult<DeleteResult> {
    entity::require_kind(conn, id, EntityKind::Note)?;
    let mut result = DeleteResult {
        id: id.to_string(),
        ..DeleteResult::default()
    };
    entity::remove(conn, id, &mut result)?;
    Ok(result)
}

/// Fail with `CycleDetected` if making `note_id` about `subject_id` would let
/// `note_id` reach itself along live aboutness edges.
pub(crate) fn ensure_acyclic(conn: &Connection, note_id: &str, subject_id: &str) -> GraphResult<()> {
    let mut seen = HashSet::new();
    let mut current = subject_id.to_string();

    loop {
        if current == note_id {
            return Err(GraphError::CycleDetected {
                note_id: note_id.to_string(),
                subject_id: subject_id.to_string(),
            });
        }
        if !seen.insert(current.clone()) {
            // pre-existing loop not involving note_id
            return Ok(());
        }
        match live_subject_of(conn, &current)? {
            Some(next) => current = next,
            None => return Ok(()),
        }
    }
}

pub(crate) fn live_subject_of(conn: &Connection, note_id: &str) -> GraphResult<Option<String>> {
    let subject = conn
        .query_row(
            "SELECT subject_id FROM notes WHERE id = ?1 AND subject_live = 1",
            [note_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::graph::thing::{create_thing, NewThing};

    fn setup() -> (Connection, String) {
        let conn = open_memory_database().unwrap();
        let thing = create_thing(&conn, &NewThing::named("subject")).unwrap();
        (conn, thing)
    }

    #[test]
    fn create_note_with_metadata() {
        let (conn, thing) = setup();
        let id = create_note(
            &conn,
            &NewNote {
                name: Some("summary".into()),
                confidence: Some(0.8),
                tags: vec!["draft".into()],
                ..NewNote::about(&thing, "looks promising")
            },
        )
        .unwrap();

        let note = get_note(&conn, &id).unwrap();
        assert_eq!(note.name.as_deref(), Some("summary"));
        assert_eq!(note.confidence, Some(0.8));
        assert_eq!(note.subject, NoteSubject::Live { id: thing });
        assert_eq!(note.tags, vec!["draft"]);
    }

    #[test]
    fn confidence_out_of_range_rejected() {
        let (conn, thing) = setup();
        for bad in [-0.1, 1.5, f64::NAN] {
            let err = create_note(
                &conn,
                &NewNote {
                    confidence: Some(bad),
                    ..NewNote::about(&thing, "x")
                },
            )
            .unwrap_err();
            assert_eq!(err.kind(), "invalid_input");
        }
    }

    #[test]
    fn missing_subject_is_not_found() {
        let (conn, _) = setup();
        let err = create_note(&conn, &NewNote::about("thing-ghost", "x")).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn note_about_itself_is_a_cycle() {
        let (conn, _) = setup();
        let err = create_note(
            &conn,
            &NewNote {
                id: Some("note-self".into()),
                ..NewNote::about("note-self", "x")
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "cycle_detected");
    }

    #[test]
    fn retarget_into_cycle_rejected() {
        let (conn, thing) = setup();
        let n1 = create_note(&conn, &NewNote::about(&thing, "first")).unwrap();
        let n2 = create_note(&conn, &NewNote::about(&n1, "second")).unwrap();
        let n3 = create_note(&conn, &NewNote::about(&n2, "third")).unwrap();

        let err = retarget_note(&conn, &n1, &n3).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
        assert_eq!(get_note(&conn, &n1).unwrap().subject, NoteSubject::Live { id: thing });

        let err = retarget_note(&conn, &n1, &n1).unwrap_err();
        assert_eq!(err.kind(), "cycle_detected");
    }

    #[test]
    fn retarget_revives_tombstone() {
        let (conn, thing) = setup();
        let other = create_thing(&conn, &NewThing::named("other")).unwrap();
        let note = create_note(&conn, &NewNote::about(&thing, "x")).unwrap();

        crate::graph::thing::delete_thing(&conn, &thing).unwrap();
        assert!(!get_note(&conn, &note).unwrap().subject.is_live());

        retarget_note(&conn, &note, &other).unwrap();
        assert_eq!(get_note(&conn, &note).unwrap().subject, NoteSubject::Live { id: other });
    }

    #[test]
    fn append_and_update() {
        let (conn, thing) = setup();
        let id = create_note(&conn, &NewNote::about(&thing, "line one")).unwrap();

        let note = append_note_content(&conn, &id, "line two").unwrap();
        assert_eq!(note.content, "line one\nline two");

        let note = update_note(
            &conn,
            &id,
            &NoteUpdate {
                name: Some("renamed".into()),
                confidence: Some(0.25),
            },
        )
        .unwrap();
        assert_eq!(note.name.as_deref(), Some("renamed"));
        assert_eq!(note.confidence, Some(0.25));
    }

    #[test]
    fn deleting_a_note_tombstones_notes_about_it() {
        let (conn, thing) = setup();
        let n1 = create_note(&conn, &NewNote::about(&thing, "first")).unwrap();
        let n2 = create_note(&conn, &NewNote::about(&n1, "meta")).unwrap();

        let result = delete_note(&conn, &n1).unwrap();
        assert_eq!(result.tombstoned_notes, vec![n2.clone()]);
        assert_eq!(get_note(&conn, &n2).unwrap().subject, NoteSubject::Tombstone { id: n1 });
    }

    #[test]
    fn author_is_recorded_and_must_exist() {
        use crate::graph::agent::{create_agent, NewAgent};
        use crate::graph::AgentType;

        let (conn, thing) = setup();
        let err = create_note(
            &conn,
            &NewNote {
                author_id: Some("agent-ghost".into()),
                ..NewNote::about(&thing, "x")
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let author = create_agent(&conn, &NewAgent::named("Ada", AgentType::Human)).unwrap();
        let id = create_note(
            &conn,
            &NewNote {
                author_id: Some(author.clone()),
                ..NewNote::about(&thing, "signed")
            },
        )
        .unwrap();
        assert_eq!(get_note(&conn, &id).unwrap().author_id, Some(author));
    }
}
