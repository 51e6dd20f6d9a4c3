use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::types::EntityKind;
use crate::error::GraphResult;

/// Response from graph_stats.
#[derive(Debug, Serialize)]
pub struct GraphStats {
    pub total_entities: u64,
    pub by_kind: BTreeMap<String, u64>,
    pub artifacts_by_status: BTreeMap<String, u64>,
    pub inline_artifacts: u64,
    pub cached_artifacts: u64,
    /// Sum of artifact sizes as recorded, counting shared payloads once per artifact.
    pub artifact_bytes: u64,
    pub tombstoned_notes: u64,
    pub collections_by_mode: BTreeMap<String, u64>,
    pub tags: u64,
    pub agents: u64,
    /// Operations recorded by agents, including those about deleted entities.
    pub provenance_records: u64,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_entity: Option<String>,
}

/// Compute graph statistics.
///
/// `db_path` is used for file size calculation; pass None for in-memory databases.
pub fn graph_stats(conn: &Connection, db_path: Option<&Path>) -> GraphResult<GraphStats> {
    let mut by_kind: BTreeMap<String, u64> = EntityKind::ALL
        .iter()
        .map(|k| (k.as_str().to_string(), 0))
        .collect();
    by_kind.extend(grouped(conn, "SELECT kind, COUNT(*) FROM entities GROUP BY kind")?);

    let mut artifacts_by_status: BTreeMap<String, u64> =
        [("raw".to_string(), 0), ("analyzed".to_string(), 0)].into();
    artifacts_by_status.extend(grouped(
        conn,
        "SELECT status, COUNT(*) FROM artifacts GROUP BY status",
    )?);

    let mut collections_by_mode: BTreeMap<String, u64> =
        [("extensional".to_string(), 0), ("intensional".to_string(), 0)].into();
    collections_by_mode.extend(grouped(
        conn,
        "SELECT mode, COUNT(*) FROM collections GROUP BY mode",
    )?);

    let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(created_at), MAX(created_at) FROM entities",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(GraphStats {
        total_entities: by_kind.values().sum(),
        by_kind,
        artifacts_by_status,
        inline_artifacts: count(conn, "SELECT COUNT(*) FROM artifacts WHERE cache_path IS NULL")?,
        cached_artifacts: count(conn, "SELECT COUNT(*) FROM artifacts WHERE cache_path IS NOT NULL")?,
        artifact_bytes: count(conn, "SELECT COALESCE(SUM(size), 0) FROM artifacts")?,
        tombstoned_notes: count(conn, "SELECT COUNT(*) FROM notes WHERE subject_live = 0")?,
        collections_by_mode,
        tags: count(conn, "SELECT COUNT(*) FROM tags")?,
        agents: count(conn, "SELECT COUNT(*) FROM agents")?,
        provenance_records: count(conn, "SELECT COUNT(*) FROM provenance_records")?,
        db_size_bytes,
        oldest_entity: oldest,
        newest_entity: newest,
    })
}

fn count(conn: &Connection, sql: &str) -> GraphResult<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

fn grouped(conn: &Connection, sql: &str) -> GraphResult<Vec<(String, u64)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::graph::artifact::{mark_analyzed, tests::inline_artifact};
    use crate::graph::note::{create_note, NewNote};
    use crate::graph::thing::{create_thing, delete_thing, NewThing};

    #[test]
    fn stats_on_empty_graph() {
        let conn = open_memory_database().unwrap();
        let stats = graph_stats(&conn, None).unwrap();
        assert_eq!(stats.total_entities, 0);
        assert_eq!(stats.by_kind["note"], 0);
        assert_eq!(stats.artifacts_by_status["raw"], 0);
        assert_eq!(stats.agents, 0);
        assert!(stats.oldest_entity.is_none());
    }

    #[test]
    fn stats_count_kinds_and_states() {
        let conn = open_memory_database().unwrap();
        let a = inline_artifact(&conn, b"12345");
        inline_artifact(&conn, b"678");
        mark_analyzed(&conn, &a).unwrap();
        let thing = create_thing(&conn, &NewThing::named("t")).unwrap();
        create_note(&conn, &NewNote::about(&thing, "n")).unwrap();
        delete_thing(&conn, &thing).unwrap();

        let stats = graph_stats(&conn, None).unwrap();
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.by_kind["artifact"], 2);
        assert_eq!(stats.by_kind["thing"], 0);
        assert_eq!(stats.artifacts_by_status["analyzed"], 1);
        assert_eq!(stats.artifacts_by_status["raw"], 1);
        assert_eq!(stats.inline_artifacts, 2);
        assert_eq!(stats.artifact_bytes, 8);
        assert_eq!(stats.tombstoned_notes, 1);
    }
}
