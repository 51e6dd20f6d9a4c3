//! Read-side lookups over tags, artifact status and thing type.

use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeSet;

use super::tags::normalize_label;
use super::types::{ArtifactStatus, EntityKind};
use crate::error::GraphResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub label: String,
    pub count: u64,
}

/// Every entity carrying `label`. Unknown labels give an empty set.
pub fn find_by_tag(conn: &Connection, label: &str) -> GraphResult<BTreeSet<String>> {
    find_by_tag_kind(conn, label, None)
}

/// Entities carrying `label`, optionally restricted to one kind.
pub fn find_by_tag_kind(
    conn: &Connection,
    label: &str,
    kind: Option<EntityKind>,
) -> GraphResult<BTreeSet<String>> {
    let label = normalize_label(label)?;
    let mut stmt = conn.prepare(
        "SELECT et.entity_id FROM entity_tags et
         JOIN tags t ON t.id = et.tag_id
         JOIN entities e ON e.id = et.entity_id
         WHERE t.label = ?1 AND (?2 IS NULL OR e.kind = ?2)",
    )?;
    let ids = stmt
        .query_map(params![label, kind.map(|k| k.as_str())], |row| row.get(0))?
        .collect::<Result<BTreeSet<String>, _>>()?;
    Ok(ids)
}

/// Artifacts, optionally filtered by status.
pub fn find_artifacts(
    conn: &Connection,
    status: Option<ArtifactStatus>,
) -> GraphResult<BTreeSet<String>> {
    let mut stmt =
        conn.prepare("SELECT id FROM artifacts WHERE (?1 IS NULL OR status = ?1)")?;
    let ids = stmt
        .query_map(params![status.map(|s| s.as_str())], |row| row.get(0))?
        .collect::<Result<BTreeSet<String>, _>>()?;
    Ok(ids)
}

/// Things, optionally filtered by their domain type.
pub fn find_things(conn: &Connection, thing_type: Option<&str>) -> GraphResult<BTreeSet<String>> {
    let mut stmt =
        conn.prepare("SELECT id FROM things WHERE (?1 IS NULL OR thing_type = ?1)")?;
    let ids = stmt
        .query_map(params![thing_type], |row| row.get(0))?
        .collect::<Result<BTreeSet<String>, _>>()?;
    Ok(ids)
}

/// All labels in use with how many entities carry each, most used first.
pub fn list_tags(conn: &Connection) -> GraphResult<Vec<TagCount>> {
    let mut stmt = conn.prepare(
        "SELECT t.label, COUNT(et.entity_id) AS n FROM tags t
         JOIN entity_tags et ON et.tag_id = t.id
         GROUP BY t.id ORDER BY n DESC, t.label",
    )?;
    let tags = stmt
        .query_map([], |row| {
            Ok(TagCount {
                label: row.get(0)?,
                count: row.get::<_, i64>(1)? as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::graph::artifact::{mark_analyzed, tests::inline_artifact};
    use crate::graph::tags::tag;
    use crate::graph::thing::{create_thing, NewThing};

    #[test]
    fn find_by_tag_spans_kinds() {
        let conn = open_memory_database().unwrap();
        let thing = create_thing(&conn, &NewThing::named("t")).unwrap();
        let artifact = inline_artifact(&conn, b"a");
        tag(&conn, &thing, "important").unwrap();
        tag(&conn, &artifact, "important").unwrap();

        let all = find_by_tag(&conn, "important").unwrap();
        assert_eq!(all, BTreeSet::from([thing.clone(), artifact.clone()]));

        let things = find_by_tag_kind(&conn, "important", Some(EntityKind::Thing)).unwrap();
        assert_eq!(things, BTreeSet::from([thing]));

        assert!(find_by_tag(&conn, "unused").unwrap().is_empty());
    }

    #[test]
    fn find_artifacts_by_status() {
        let conn = open_memory_database().unwrap();
        let raw = inline_artifact(&conn, b"raw");
        let done = inline_artifact(&conn, b"done");
        mark_analyzed(&conn, &done).unwrap();

        assert_eq!(find_artifacts(&conn, Some(ArtifactStatus::Raw)).unwrap(), BTreeSet::from([raw.clone()]));
        assert_eq!(
            find_artifacts(&conn, Some(ArtifactStatus::Analyzed)).unwrap(),
            BTreeSet::from([done.clone()])
        );
        assert_eq!(find_artifacts(&conn, None).unwrap().len(), 2);
    }

    #[test]
    fn find_things_by_type() {
        let conn = open_memory_database().unwrap();
        let paper = create_thing(
            &conn,
            &NewThing {
                name: "p".into(),
                thing_type: Some("paper".into()),
                ..NewThing::default()
            },
        )
        .unwrap();
        create_thing(&conn, &NewThing::named("untyped")).unwrap();

        assert_eq!(find_things(&conn, Some("paper")).unwrap(), BTreeSet::from([paper]));
        assert_eq!(find_things(&conn, None).unwrap().len(), 2);
    }

    #[test]
    fn list_tags_counts_usage() {
        let conn = open_memory_database().unwrap();
        let a = create_thing(&conn, &NewThing::named("a")).unwrap();
        let b = create_thing(&conn, &NewThing::named("b")).unwrap();
        tag(&conn, &a, "x").unwrap();
        tag(&conn, &b, "x").unwrap();
        tag(&conn, &a, "y").unwrap();

        let tags = list_tags(&conn).unwrap();
        assert_eq!(
            tags,
            vec![
                TagCount { label: "x".into(), count: 2 },
                TagCount { label: "y".into(), count: 1 },
            ]
        );
    }
}
