use rusqlite::{params, Connection, OptionalExtension};

use super::agent;
use super::entity;
use super::tags::tags_for;
use super::types::{EntityKind, Fragment};
use super::{now, write_audit_log};
use crate::error::{GraphError, GraphResult};

/// Input for [`create_fragment`].
#[derive(Debug, Clone, Default)]
pub struct NewFragment {
    pub id: Option<String>,
    pub artifact_id: String,
    pub content: String,
    /// Byte span of the passage in the artifact body. `length` needs `offset`.
    pub offset: Option<u64>,
    pub length: Option<u64>,
    /// Agent that did the extraction.
    pub author_id: Option<String>,
}

impl NewFragment {
    pub fn of(artifact_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Extract a fragment from an existing artifact.
pub fn create_fragment(conn: &Connection, new: &NewFragment) -> GraphResult<String> {
    if new.content.trim().is_empty() {
        return Err(GraphError::invalid("fragment content must not be empty"));
    }
    entity::require_kind(conn, &new.artifact_id, EntityKind::Artifact)?;
    check_span(conn, &new.artifact_id, new.offset, new.length)?;
    if let Some(author) = &new.author_id {
        agent::require_agent(conn, author)?;
    }

    let id = entity::resolve_id(conn, EntityKind::Fragment, new.id.as_deref())?;
    let ts = now();
    entity::register(conn, &id, EntityKind::Fragment, &ts)?;
    conn.execute(
        "INSERT INTO fragments (id, artifact_id, content, start_offset, length, author_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            new.artifact_id,
            new.content,
            new.offset.map(|o| o as i64),
            new.length.map(|l| l as i64),
            new.author_id
        ],
    )?;

    write_audit_log(
        conn,
        "create",
        &id,
        Some(&serde_json::json!({
            "kind": "fragment",
            "artifact_id": new.artifact_id,
            "author_id": new.author_id,
        })),
    )?;
    tracing::debug!(id = %id, artifact_id = %new.artifact_id, "fragment created");
    Ok(id)
}

/// The span must lie inside the artifact body.
fn check_span(
    conn: &Connection,
    artifact_id: &str,
    offset: Option<u64>,
    length: Option<u64>,
) -> GraphResult<()> {
    let (offset, length) = match (offset, length) {
        (None, None) => return Ok(()),
        (None, Some(_)) => return Err(GraphError::invalid("fragment length given without offset")),
        (Some(offset), length) => (offset, length.unwrap_or(0)),
    };
    let size: i64 = conn.query_row(
        "SELECT size FROM artifacts WHERE id = ?1",
        [artifact_id],
        |row| row.get(0),
    )?;
    let end = offset
        .checked_add(length)
        .ok_or_else(|| GraphError::invalid("fragment span overflows"))?;
    if end > size as u64 {
        return Err(GraphError::invalid(format!(
            "fragment span {offset}..{end} exceeds artifact size {size}"
        )));
    }
    Ok(())
}

pub fn get_fragment(conn: &Connection, id: &str) -> GraphResult<Fragment> {
    let (artifact_id, content, offset, length, author_id, created_at, updated_at) = conn
        .query_row(
            "SELECT f.artifact_id, f.content, f.start_offset, f.length, f.author_id,
                    e.created_at, e.updated_at
             FROM fragments f JOIN entities e ON e.id = f.id WHERE f.id = ?1",
            [id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| GraphError::not_found("fragment", id))?;

    Ok(Fragment {
        id: id.to_string(),
        artifact_id,
        content,
        offset: offset.map(|o| o as u64),
        length: length.map(|l| l as u64),
        author_id,
        tags: tags_for(conn, id)?,
        created_at,
        updated_at,
    })
}

/// Fragment ids extracted from `artifact_id`, oldest first.
pub fn fragment_ids_of(conn: &Connection, artifact_id: &str) -> GraphResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT f.id FROM fragments f JOIN entities e ON e.id = f.id
         WHERE f.artifact_id = ?1 ORDER BY e.created_at, f.id",
    )?;
    let ids = stmt
        .query_map([artifact_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::graph::agent::{create_agent, NewAgent};
    use crate::graph::artifact::tests::inline_artifact;
    use crate::graph::AgentType;

    #[test]
    fn fragment_links_to_artifact() {
        let conn = open_memory_database().unwrap();
        let artifact = inline_artifact(&conn, b"hello world");
        let id = create_fragment(&conn, &NewFragment::of(&artifact, "hello")).unwrap();

        let fragment = get_fragment(&conn, &id).unwrap();
        assert_eq!(fragment.artifact_id, artifact);
        assert_eq!(fragment.content, "hello");
        assert_eq!(fragment_ids_of(&conn, &artifact).unwrap(), vec![id]);
    }

    #[test]
    fn fragment_of_missing_artifact_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = create_fragment(&conn, &NewFragment::of("artifact-ghost", "text")).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn fragment_of_non_artifact_is_not_found() {
        let conn = open_memory_database().unwrap();
        let thing = crate::graph::thing::create_thing(
            &conn,
            &crate::graph::thing::NewThing::named("t"),
        )
        .unwrap();
        let err = create_fragment(&conn, &NewFragment::of(&thing, "text")).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn explicit_fragment_id_is_used() {
        let conn = open_memory_database().unwrap();
        let artifact = inline_artifact(&conn, b"abc");
        let new = NewFragment {
            id: Some("fragment-intro".into()),
            ..NewFragment::of(&artifact, "abc")
        };
        assert_eq!(create_fragment(&conn, &new).unwrap(), "fragment-intro");
    }

    #[test]
    fn span_and_author_are_stored() {
        let conn = open_memory_database().unwrap();
        let artifact = inline_artifact(&conn, b"hello world");
        let author = create_agent(&conn, &NewAgent::named("extractor", AgentType::Automated)).unwrap();
        let id = create_fragment(
            &conn,
            &NewFragment {
                offset: Some(6),
                length: Some(5),
                author_id: Some(author.clone()),
                ..NewFragment::of(&artifact, "world")
            },
        )
        .unwrap();

        let fragment = get_fragment(&conn, &id).unwrap();
        assert_eq!(fragment.offset, Some(6));
        assert_eq!(fragment.length, Some(5));
        assert_eq!(fragment.author_id, Some(author));
    }

    #[test]
    fn span_outside_artifact_is_rejected() {
        let conn = open_memory_database().unwrap();
        let artifact = inline_artifact(&conn, b"hello");
        for (offset, length) in [(Some(3), Some(10)), (Some(6), None), (None, Some(2))] {
            let err = create_fragment(
                &conn,
                &NewFragment {
                    offset,
                    length,
                    ..NewFragment::of(&artifact, "lo")
                },
            )
            .unwrap_err();
            assert_eq!(err.kind(), "invalid_input", "span {offset:?}+{length:?}");
        }
        assert!(fragment_ids_of(&conn, &artifact).unwrap().is_empty());
    }

    #[test]
    fn unknown_author_is_not_found() {
        let conn = open_memory_database().unwrap();
        let artifact = inline_artifact(&conn, b"hello");
        let err = create_fragment(
            &conn,
            &NewFragment {
                author_id: Some("agent-ghost".into()),
                ..NewFragment::of(&artifact, "hello")
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
