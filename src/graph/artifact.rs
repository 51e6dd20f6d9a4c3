//! Artifacts: immutable captured content with provenance metadata.
//!
//! Small bodies stay inline in the graph record; large ones go to the
//! content-addressed store and the record keeps only the relative path.

use rusqlite::{params, Connection, OptionalExtension};

use super::entity::{self, DeleteResult};
use super::tags::tags_for;
use super::types::{Artifact, ArtifactStatus, ArtifactStorage, EntityKind};
use super::{now, write_audit_log};
use crate::content::{content_hash, mime, ContentStore};
use crate::error::{GraphError, GraphResult};

/// Where the caller wants the body stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placement {
    /// Inline below the store's threshold, cached at or above it.
    #[default]
    Auto,
    /// Inline if small enough; oversized bodies are cached regardless.
    Inline,
    /// Always cached.
    Cached,
}

impl std::str::FromStr for Placement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "inline" => Ok(Self::Inline),
            "cached" => Ok(Self::Cached),
            _ => Err(format!("unknown placement: {s}")),
        }
    }
}

/// Metadata for [`create_artifact`]; the body is passed separately.
#[derive(Debug, Clone, Default)]
pub struct NewArtifact {
    pub id: Option<String>,
    pub source_uri: String,
    /// Declared MIME type. Empty means guess from the URI and the bytes.
    pub mime_type: Option<String>,
    /// RFC 3339 capture time; defaults to now.
    pub retrieved_at: Option<String>,
    /// Thing this artifact represents, if known at capture time.
    pub represents: Option<String>,
    pub placement: Placement,
}

impl NewArtifact {
    pub fn from_uri(source_uri: impl Into<String>) -> Self {
        Self {
            source_uri: source_uri.into(),
            ..Self::default()
        }
    }
}

/// Capture `content` as a new raw artifact.
///
/// A cached body is written to the store before the record; if the surrounding
/// transaction rolls back the payload stays behind unreferenced, which is
/// harmless since payloads are immutable and shared by hash.
pub fn create_artifact(
    conn: &Connection,
    store: &ContentStore,
    new: &NewArtifact,
    content: &[u8],
) -> GraphResult<String> {
    if new.source_uri.trim().is_empty() {
        return Err(GraphError::invalid("artifact source_uri must not be empty"));
    }
    let retrieved_at = match &new.retrieved_at {
        Some(ts) => chrono::DateTime::parse_from_rfc3339(ts)
            .map_err(|e| GraphError::invalid(format!("retrieved_at is not RFC 3339: {e}")))?
            .to_rfc3339(),
        None => now(),
    };
    if let Some(thing_id) = &new.represents {
        entity::require_kind(conn, thing_id, EntityKind::Thing)?;
    }
    let mime_type = match new.mime_type.as_deref().map(str::trim) {
        Some(declared) if !declared.is_empty() => declared.to_string(),
        _ => mime::guess_mime_type(Some(new.source_uri.as_str()), Some(content)).to_string(),
    };

    let id = entity::resolve_id(conn, EntityKind::Artifact, new.id.as_deref())?;

    let inline = new.placement != Placement::Cached && store.inline_eligible(content.len());
    let (hash, inline_content, cache_path) = if inline {
        (content_hash(content), Some(content), None)
    } else {
        let stored = store.put(content, &mime_type)?;
        (stored.hash, None, Some(stored.path))
    };

    let ts = now();
    entity::register(conn, &id, EntityKind::Artifact, &ts)?;
    conn.execute(
        "INSERT INTO artifacts (id, source_uri, retrieved_at, mime_type, content_hash, size,
                                inline_content, cache_path, status, represents)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'raw', ?9)",
        params![
            id,
            new.source_uri,
            retrieved_at,
            mime_type,
            hash,
            content.len() as i64,
            inline_content,
            cache_path,
            new.represents,
        ],
    )?;

    write_audit_log(
        conn,
        "create",
        &id,
        Some(&serde_json::json!({
            "kind": "artifact",
            "source_uri": new.source_uri,
            "content_hash": hash,
            "placement": if inline { "inline" } else { "cached" },
        })),
    )?;
    tracing::info!(id = %id, size = content.len(), mime_type = %mime_type, inline, "artifact created");
    Ok(id)
}

pub fn get_artifact(conn: &Connection, id: &str) -> GraphResult<Artifact> {
    let row = conn
        .query_row(
            "SELECT a.source_uri, a.retrieved_at, a.mime_type, a.content_hash, a.size,
                    a.cache_path, a.status, a.represents, e.created_at, e.updated_at
             FROM artifacts a JOIN entities e ON e.id = a.id WHERE a.id = ?1",
            [id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, String>(9)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| GraphError::not_found("artifact", id))?;

    let (source_uri, retrieved_at, mime_type, content_hash, size, cache_path, status, represents, created_at, updated_at) =
        row;
    Ok(Artifact {
        id: id.to_string(),
        source_uri,
        retrieved_at,
        mime_type,
        content_hash,
        size: size as u64,
        storage: match cache_path {
            Some(path) => ArtifactStorage::Cached { path },
            None => ArtifactStorage::Inline,
        },
        status: status.parse().map_err(GraphError::InvalidInput)?,
        represents,
        tags: tags_for(conn, id)?,
        created_at,
        updated_at,
    })
}

/// The artifact's bytes, from the record or the content store.
pub fn read_artifact_content(
    conn: &Connection,
    store: &ContentStore,
    id: &str,
) -> GraphResult<Vec<u8>> {
    let (inline, cache_path): (Option<Vec<u8>>, Option<String>) = conn
        .query_row(
            "SELECT inline_content, cache_path FROM artifacts WHERE id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| GraphError::not_found("artifact", id))?;

    match (inline, cache_path) {
        (Some(bytes), _) => Ok(bytes),
        (None, Some(path)) => store.get(&path),
        (None, None) => Err(GraphError::not_found("content", id)),
    }
}

/// Move a raw artifact to `analyzed`. Returns `false` if it already was.
pub fn mark_analyzed(conn: &Connection, id: &str) -> GraphResult<bool> {
    let status: Option<String> = conn
        .query_row("SELECT status FROM artifacts WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    let status = status.ok_or_else(|| GraphError::InvalidTransition {
        id: id.to_string(),
        reason: "no such artifact to mark analyzed".into(),
    })?;

    if status == ArtifactStatus::Analyzed.as_str() {
        return Ok(false);
    }

    conn.execute(
        "UPDATE artifacts SET status = 'analyzed' WHERE id = ?1",
        [id],
    )?;
    entity::touch(conn, id)?;
    write_audit_log(
        conn,
        "status",
        id,
        Some(&serde_json::json!({ "from": "raw", "to": "analyzed" })),
    )?;
    tracing::info!(id = %id, "artifact marked analyzed");
    Ok(true)
}

/// Record which thing the artifact represents. Set once: repeating the same
/// thing is a no-op, naming a different thing is an invalid transition.
pub fn set_representation(conn: &Connection, artifact_id: &str, thing_id: &str) -> GraphResult<()> {
    let current: Option<Option<String>> = conn
        .query_row(
            "SELECT represents FROM artifacts WHERE id = ?1",
            [artifact_id],
            |row| row.get(0),
        )
        .optional()?;
    let current = current.ok_or_else(|| GraphError::not_found("artifact", artifact_id))?;
    entity::require_kind(conn, thing_id, EntityKind::Thing)?;

    match current.as_deref() {
        Some(existing) if existing == thing_id => return Ok(()),
        Some(existing) => {
            return Err(GraphError::InvalidTransition {
                id: artifact_id.to_string(),
                reason: format!("already represents {existing}"),
            })
        }
        None => {}
    }

    conn.execute(
        "UPDATE artifacts SET represents = ?1 WHERE id = ?2",
        params![thing_id, artifact_id],
    )?;
    entity::touch(conn, artifact_id)?;
    write_audit_log(
        conn,
        "update",
        artifact_id,
        Some(&serde_json::json!({ "represents": thing_id })),
    )?;
    Ok(())
}

/// Artifacts representing `thing_id`, oldest first.
pub fn representations_of(conn: &Connection, thing_id: &str) -> GraphResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT a.id FROM artifacts a JOIN entities e ON e.id = a.id
         WHERE a.represents = ?1 ORDER BY e.created_at, a.id",
    )?;
    let ids = stmt
        .query_map([thing_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// `(artifact id, cache path, content hash)` for every cached artifact.
pub fn cached_artifacts(conn: &Connection) -> GraphResult<Vec<(String, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT id, cache_path, content_hash FROM artifacts WHERE cache_path IS NOT NULL ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Delete an artifact. With fragments present this needs `cascade`, which
/// deletes them too (tombstoning notes about any of them). The stored
/// payload is left in place; other artifacts may share it.
pub fn delete_artifact(conn: &Connection, id: &str, cascade: bool) -> GraphResult<DeleteResult> {
    entity::require_kind(conn, id, EntityKind::Artifact)?;
    let fragments = super::fragment::fragment_ids_of(conn, id)?;

    if !fragments.is_empty() && !cascade {
        return Err(GraphError::HasDependents {
            id: id.to_string(),
            count: fragments.len(),
            dependents: "fragments",
        });
    }

    let mut result = DeleteResult {
        id: id.to_string(),
        ..DeleteResult::default()
    };
    for fragment_id in &fragments {
        entity::remove(conn, fragment_id, &mut result)?;
    }
    entity::remove(conn, id, &mut result)?;
    tracing::info!(id = %id, fragments = fragments.len(), "artifact deleted");
    Ok(result)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::graph::thing::{create_thing, NewThing};
    use tempfile::TempDir;

    /// Inline artifact for tests that never touch the content store.
    pub(crate) fn inline_artifact(conn: &Connection, bytes: &[u8]) -> String {
        let store = ContentStore::new(std::env::temp_dir().join("curator-unused-store"));
        create_artifact(
            conn,
            &store,
            &NewArtifact {
                source_uri: "https://example.org/a.txt".into(),
                mime_type: Some("text/plain".into()),
                placement: Placement::Inline,
                ..NewArtifact::default()
            },
            bytes,
        )
        .unwrap()
    }

    #[test]
    fn small_artifact_is_inline_and_raw() {
        let conn = open_memory_database().unwrap();
        let tmp = TempDir::new().unwrap();
        let store = ContentStore::new(tmp.path());

        let id = create_artifact(&conn, &store, &NewArtifact::from_uri("https://example.org/x.txt"), b"hello")
            .unwrap();
        let artifact = get_artifact(&conn, &id).unwrap();

        assert_eq!(artifact.status, ArtifactStatus::Raw);
        assert_eq!(artifact.storage, ArtifactStorage::Inline);
        assert_eq!(artifact.mime_type, "text/plain");
        assert_eq!(artifact.size, 5);
        assert_eq!(read_artifact_content(&conn, &store, &id).unwrap(), b"hello");
        assert_eq!(store.stats().unwrap().total_files, 0);
    }

    #[test]
    fn large_artifact_is_cached_even_if_inline_requested() {
        let conn = open_memory_database().unwrap();
        let tmp = TempDir::new().unwrap();
        let store = ContentStore::with_threshold(tmp.path(), 16);
        let body = vec![b'x'; 16];

        let id = create_artifact(
            &conn,
            &store,
            &NewArtifact {
                source_uri: "file:///big.bin".into(),
                placement: Placement::Inline,
                ..NewArtifact::default()
            },
            &body,
        )
        .unwrap();

        let artifact = get_artifact(&conn, &id).unwrap();
        assert!(matches!(artifact.storage, ArtifactStorage::Cached { .. }));
        assert_eq!(read_artifact_content(&conn, &store, &id).unwrap(), body);
    }

    #[test]
    fn identical_cached_bodies_share_one_payload() {
        let conn = open_memory_database().unwrap();
        let tmp = TempDir::new().unwrap();
        let store = ContentStore::new(tmp.path());
        let cached = |uri: &str| NewArtifact {
            source_uri: uri.into(),
            placement: Placement::Cached,
            ..NewArtifact::default()
        };

        let a = create_artifact(&conn, &store, &cached("https://a.example/p"), b"same bytes").unwrap();
        let b = create_artifact(&conn, &store, &cached("https://b.example/p"), b"same bytes").unwrap();

        let (a, b) = (get_artifact(&conn, &a).unwrap(), get_artifact(&conn, &b).unwrap());
        assert_ne!(a.id, b.id);
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.storage, b.storage);
        assert_eq!(store.stats().unwrap().total_files, 1);
    }

    #[test]
    fn mark_analyzed_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let id = inline_artifact(&conn, b"hello");

        assert!(mark_analyzed(&conn, &id).unwrap());
        assert!(!mark_analyzed(&conn, &id).unwrap());
        assert_eq!(get_artifact(&conn, &id).unwrap().status, ArtifactStatus::Analyzed);

        let err = mark_analyzed(&conn, "artifact-missing").unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
    }

    #[test]
    fn representation_is_set_once() {
        let conn = open_memory_database().unwrap();
        let paper = create_thing(&conn, &NewThing::named("paper")).unwrap();
        let other = create_thing(&conn, &NewThing::named("other")).unwrap();
        let id = inline_artifact(&conn, b"pdf");

        set_representation(&conn, &id, &paper).unwrap();
        set_representation(&conn, &id, &paper).unwrap();
        let err = set_representation(&conn, &id, &other).unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
        assert_eq!(representations_of(&conn, &paper).unwrap(), vec![id]);
    }

    #[test]
    fn representation_cleared_when_thing_deleted() {
        let conn = open_memory_database().unwrap();
        let paper = create_thing(&conn, &NewThing::named("paper")).unwrap();
        let id = inline_artifact(&conn, b"pdf");
        set_representation(&conn, &id, &paper).unwrap();

        crate::graph::thing::delete_thing(&conn, &paper).unwrap();
        assert!(get_artifact(&conn, &id).unwrap().represents.is_none());
    }

    #[test]
    fn represents_unknown_thing_is_not_found() {
        let conn = open_memory_database().unwrap();
        let store = ContentStore::new(std::env::temp_dir().join("curator-unused-store"));
        let err = create_artifact(
            &conn,
            &store,
            &NewArtifact {
                source_uri: "u".into(),
                represents: Some("thing-ghost".into()),
                ..NewArtifact::default()
            },
            b"x",
        )
        .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn delete_with_fragments_needs_cascade() {
        let conn = open_memory_database().unwrap();
        let id = inline_artifact(&conn, b"hello world");
        let frag = crate::graph::fragment::create_fragment(
            &conn,
            &crate::graph::fragment::NewFragment::of(&id, "hello"),
        )
        .unwrap();

        let err = delete_artifact(&conn, &id, false).unwrap_err();
        assert!(matches!(err, GraphError::HasDependents { count: 1, .. }));

        let result = delete_artifact(&conn, &id, true).unwrap();
        assert_eq!(result.removed, vec![frag.clone(), id.clone()]);
        assert!(!entity::exists(&conn, &frag).unwrap());
        assert!(!entity::exists(&conn, &id).unwrap());
    }
}
