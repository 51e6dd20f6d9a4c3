//! Provenance: walking from a derived entity back to where it came from.
//!
//! Each step follows one edge: a note to its live subject, a fragment to its
//! artifact, an artifact to the thing it represents. Things and collections
//! are roots. A tombstoned subject ends the walk.
//!
//! Beside the structural walk, agents can record operations: which entity an
//! operation produced, from which sources, and with what parameters. Records
//! are history and survive deletion of the entities they mention.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

use super::agent;
use super::entity;
use super::note::live_subject_of;
use super::types::{EntityKind, ProvenanceRecord};
use super::{now, write_audit_log};
use crate::error::{GraphError, GraphResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    About,
    ExtractedFrom,
    Represents,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvenanceStep {
    pub id: String,
    pub kind: EntityKind,
    /// Edge followed to reach this step from the previous one.
    pub relation: Relation,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvenanceTrace {
    pub origin: String,
    pub steps: Vec<ProvenanceStep>,
    /// Set when the walk ended at a note whose subject was deleted.
    pub tombstoned_subject: Option<String>,
}

/// Full provenance walk from `id`, with the relation at each hop.
pub fn trace(conn: &Connection, id: &str) -> GraphResult<ProvenanceTrace> {
    let mut kind = entity::require(conn, id)?;
    let mut current = id.to_string();
    let mut seen = HashSet::from([current.clone()]);
    let mut result = ProvenanceTrace {
        origin: id.to_string(),
        steps: Vec::new(),
        tombstoned_subject: None,
    };

    loop {
        let next = match kind {
            EntityKind::Note => match live_subject_of(conn, &current)? {
                Some(subject) => Some((subject, Relation::About)),
                None => {
                    result.tombstoned_subject = tombstoned_subject(conn, &current)?;
                    None
                }
            },
            EntityKind::Fragment => artifact_of(conn, &current)?.map(|a| (a, Relation::ExtractedFrom)),
            EntityKind::Artifact => represented_thing(conn, &current)?.map(|t| (t, Relation::Represents)),
            EntityKind::Thing | EntityKind::Collection => None,
        };
        let Some((next_id, relation)) = next else {
            return Ok(result);
        };

        if !seen.insert(next_id.clone()) {
            return Err(GraphError::CycleDetected {
                note_id: current,
                subject_id: next_id,
            });
        }
        kind = entity::require(conn, &next_id)?;
        result.steps.push(ProvenanceStep {
            id: next_id.clone(),
            kind,
            relation,
        });
        current = next_id;
    }
}

/// Ids from `id` back to its root, excluding `id` itself.
pub fn provenance_chain(conn: &Connection, id: &str) -> GraphResult<Vec<String>> {
    Ok(trace(conn, id)?.steps.into_iter().map(|s| s.id).collect())
}

/// Notes directly about `subject_id`, oldest first.
pub fn notes_about(conn: &Connection, subject_id: &str) -> GraphResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT n.id FROM notes n JOIN entities e ON e.id = n.id
         WHERE n.subject_id = ?1 AND n.subject_live = 1 ORDER BY e.created_at, n.id",
    )?;
    let ids = stmt
        .query_map([subject_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Notes whose subject has been deleted.
pub fn tombstoned_notes(conn: &Connection) -> GraphResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM notes WHERE subject_live = 0 ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Input for [`record_provenance`].
#[derive(Debug, Clone, Default)]
pub struct NewProvenanceRecord {
    pub produced_id: String,
    pub source_ids: Vec<String>,
    pub agent_id: String,
    /// What was done, e.g. `"extraction"` or `"summarization"`.
    pub operation_type: String,
    /// JSON object; `None` when the operation took no parameters.
    pub parameters: Option<Value>,
}

/// Record that an agent produced one entity from others. Returns the record id.
pub fn record_provenance(conn: &Connection, new: &NewProvenanceRecord) -> GraphResult<String> {
    let operation_type = new.operation_type.trim();
    if operation_type.is_empty() {
        return Err(GraphError::invalid("operation type must not be empty"));
    }
    if matches!(&new.parameters, Some(p) if !p.is_object()) {
        return Err(GraphError::invalid("operation parameters must be a JSON object"));
    }
    entity::require(conn, &new.produced_id)?;
    agent::require_agent(conn, &new.agent_id)?;
    let mut seen = HashSet::new();
    for source in &new.source_ids {
        if *source == new.produced_id {
            return Err(GraphError::invalid(format!(
                "{source} cannot be a source of itself"
            )));
        }
        if !seen.insert(source.as_str()) {
            return Err(GraphError::invalid(format!("duplicate source {source}")));
        }
        entity::require(conn, source)?;
    }

    let id = format!("record-{}", uuid::Uuid::now_v7().simple());
    conn.execute(
        "INSERT INTO provenance_records (id, produced_id, agent_id, operation_type, parameters, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            new.produced_id,
            new.agent_id,
            operation_type,
            new.parameters.as_ref().map(Value::to_string),
            now()
        ],
    )?;
    for (position, source) in new.source_ids.iter().enumerate() {
        conn.execute(
            "INSERT INTO provenance_sources (record_id, source_id, position) VALUES (?1, ?2, ?3)",
            params![id, source, position as i64],
        )?;
    }

    write_audit_log(
        conn,
        "provenance",
        &new.produced_id,
        Some(&serde_json::json!({
            "record_id": id,
            "agent_id": new.agent_id,
            "operation_type": operation_type,
        })),
    )?;
    tracing::info!(
        record = %id,
        produced = %new.produced_id,
        sources = new.source_ids.len(),
        operation_type,
        "provenance recorded"
    );
    Ok(id)
}

/// Operations recorded as producing `entity_id`, oldest first. Records of a
/// deleted entity are still returned.
pub fn provenance_records(conn: &Connection, entity_id: &str) -> GraphResult<Vec<ProvenanceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, agent_id, operation_type, parameters, recorded_at
         FROM provenance_records WHERE produced_id = ?1 ORDER BY recorded_at, id",
    )?;
    let rows = stmt
        .query_map([entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut sources = conn.prepare(
        "SELECT source_id FROM provenance_sources WHERE record_id = ?1 ORDER BY position",
    )?;
    let mut records = Vec::with_capacity(rows.len());
    for (id, agent_id, operation_type, parameters, recorded_at) in rows {
        let source_ids = sources
            .query_map([&id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        let parameters = match parameters {
            Some(text) => Some(serde_json::from_str(&text)?),
            None => None,
        };
        records.push(ProvenanceRecord {
            id,
            produced_id: entity_id.to_string(),
            source_ids,
            agent_id,
            operation_type,
            parameters,
            recorded_at,
        });
    }
    Ok(records)
}

fn tombstoned_subject(conn: &Connection, note_id: &str) -> GraphResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT subject_id FROM notes WHERE id = ?1 AND subject_live = 0",
            [note_id],
            |row| row.get(0),
        )
        .optional()?)
}

fn artifact_of(conn: &Connection, fragment_id: &str) -> GraphResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT artifact_id FROM fragments WHERE id = ?1",
            [fragment_id],
            |row| row.get(0),
        )
        .optional()?)
}

fn represented_thing(conn: &Connection, artifact_id: &str) -> GraphResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT represents FROM artifacts WHERE id = ?1",
            [artifact_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?
        .flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::graph::artifact::{set_representation, tests::inline_artifact};
    use crate::graph::fragment::{create_fragment, NewFragment};
    use crate::graph::note::{create_note, NewNote};
    use crate::graph::agent::{create_agent, NewAgent};
    use crate::graph::thing::{create_thing, delete_thing, NewThing};
    use crate::graph::AgentType;

    #[test]
    fn note_on_fragment_walks_back_to_artifact() {
        let conn = open_memory_database().unwrap();
        let artifact = inline_artifact(&conn, b"hello");
        let fragment = create_fragment(&conn, &NewFragment::of(&artifact, "hello")).unwrap();
        let note = create_note(&conn, &NewNote::about(&fragment, "greeting")).unwrap();

        assert_eq!(
            provenance_chain(&conn, &note).unwrap(),
            vec![fragment.clone(), artifact.clone()]
        );
        assert_eq!(notes_about(&conn, &fragment).unwrap(), vec![note]);
    }

    #[test]
    fn chain_continues_through_represented_thing() {
        let conn = open_memory_database().unwrap();
        let paper = create_thing(&conn, &NewThing::named("paper")).unwrap();
        let artifact = inline_artifact(&conn, b"pdf");
        set_representation(&conn, &artifact, &paper).unwrap();
        let fragment = create_fragment(&conn, &NewFragment::of(&artifact, "abstract")).unwrap();

        let trace = trace(&conn, &fragment).unwrap();
        let relations: Vec<_> = trace.steps.iter().map(|s| s.relation.clone()).collect();
        assert_eq!(relations, vec![Relation::ExtractedFrom, Relation::Represents]);
        assert_eq!(trace.steps.last().unwrap().id, paper);
    }

    #[test]
    fn roots_have_empty_chain() {
        let conn = open_memory_database().unwrap();
        let thing = create_thing(&conn, &NewThing::named("root")).unwrap();
        assert!(provenance_chain(&conn, &thing).unwrap().is_empty());
    }

    #[test]
    fn walk_stops_at_tombstone() {
        let conn = open_memory_database().unwrap();
        let thing = create_thing(&conn, &NewThing::named("gone")).unwrap();
        let note = create_note(&conn, &NewNote::about(&thing, "x")).unwrap();
        let meta = create_note(&conn, &NewNote::about(&note, "y")).unwrap();
        delete_thing(&conn, &thing).unwrap();

        let trace = trace(&conn, &meta).unwrap();
        assert_eq!(trace.steps.len(), 1);
        assert_eq!(trace.tombstoned_subject, Some(thing));
        assert_eq!(tombstoned_notes(&conn).unwrap(), vec![note]);
    }

    fn agent(conn: &Connection) -> String {
        create_agent(conn, &NewAgent::named("extractor", AgentType::Llm)).unwrap()
    }

    #[test]
    fn recorded_operation_reads_back_with_ordered_sources() {
        let conn = open_memory_database().unwrap();
        let agent = agent(&conn);
        let a = inline_artifact(&conn, b"first source");
        let b = inline_artifact(&conn, b"second source");
        let summary = create_thing(&conn, &NewThing::named("summary")).unwrap();

        let id = record_provenance(
            &conn,
            &NewProvenanceRecord {
                produced_id: summary.clone(),
                source_ids: vec![b.clone(), a.clone()],
                agent_id: agent.clone(),
                operation_type: " summarization ".into(),
                parameters: Some(serde_json::json!({ "max_words": 200 })),
            },
        )
        .unwrap();

        let records = provenance_records(&conn, &summary).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, id);
        assert_eq!(record.source_ids, vec![b, a]);
        assert_eq!(record.agent_id, agent);
        assert_eq!(record.operation_type, "summarization");
        assert_eq!(record.parameters, Some(serde_json::json!({ "max_words": 200 })));
    }

    #[test]
    fn record_validation() {
        let conn = open_memory_database().unwrap();
        let agent = agent(&conn);
        let thing = create_thing(&conn, &NewThing::named("t")).unwrap();
        let other = create_thing(&conn, &NewThing::named("o")).unwrap();
        let base = NewProvenanceRecord {
            produced_id: thing.clone(),
            source_ids: vec![other.clone()],
            agent_id: agent,
            operation_type: "extraction".into(),
            parameters: None,
        };

        let cases = [
            (
                NewProvenanceRecord {
                    operation_type: "  ".into(),
                    ..base.clone()
                },
                "invalid_input",
            ),
            (
                NewProvenanceRecord {
                    parameters: Some(serde_json::json!([1])),
                    ..base.clone()
                },
                "invalid_input",
            ),
            (
                NewProvenanceRecord {
                    source_ids: vec![thing.clone()],
                    ..base.clone()
                },
                "invalid_input",
            ),
            (
                NewProvenanceRecord {
                    source_ids: vec![other.clone(), other.clone()],
                    ..base.clone()
                },
                "invalid_input",
            ),
            (
                NewProvenanceRecord {
                    source_ids: vec!["thing-ghost".into()],
                    ..base.clone()
                },
                "not_found",
            ),
            (
                NewProvenanceRecord {
                    produced_id: "note-ghost".into(),
                    ..base.clone()
                },
                "not_found",
            ),
            (
                NewProvenanceRecord {
                    agent_id: "agent-ghost".into(),
                    ..base.clone()
                },
                "not_found",
            ),
        ];
        for (new, kind) in cases {
            assert_eq!(record_provenance(&conn, &new).unwrap_err().kind(), kind, "{new:?}");
        }
        assert!(provenance_records(&conn, &thing).unwrap().is_empty());
    }

    #[test]
    fn records_outlive_the_produced_entity() {
        let conn = open_memory_database().unwrap();
        let agent = agent(&conn);
        let thing = create_thing(&conn, &NewThing::named("short lived")).unwrap();
        record_provenance(
            &conn,
            &NewProvenanceRecord {
                produced_id: thing.clone(),
                agent_id: agent,
                operation_type: "import".into(),
                ..NewProvenanceRecord::default()
            },
        )
        .unwrap();
        delete_thing(&conn, &thing).unwrap();

        let records = provenance_records(&conn, &thing).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].source_ids.is_empty());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let conn = open_memory_database().unwrap();
        assert_eq!(provenance_chain(&conn, "note-ghost").unwrap_err().kind(), "not_found");
    }
}
