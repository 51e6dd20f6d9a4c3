//! Agents: who wrote a note, extracted a fragment or ran a recorded operation.

use rusqlite::{params, Connection, OptionalExtension};

use super::types::{Agent, AgentType};
use super::{now, write_audit_log};
use crate::error::{GraphError, GraphResult};

const ID_PREFIX: &str = "agent-";

/// Input for [`create_agent`].
#[derive(Debug, Clone, Default)]
pub struct NewAgent {
    /// Caller-chosen id; must carry the `agent-` prefix.
    pub id: Option<String>,
    pub name: String,
    pub agent_type: AgentType,
    /// Model identifier for `llm` agents, e.g. a model release name.
    pub model_name: Option<String>,
}

impl NewAgent {
    pub fn named(name: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            name: name.into(),
            agent_type,
            ..Self::default()
        }
    }
}

fn check_id(id: &str) -> GraphResult<()> {
    let Some(rest) = id.strip_prefix(ID_PREFIX) else {
        return Err(GraphError::invalid(format!("id {id} does not carry the agent prefix")));
    };
    let well_formed = !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !well_formed {
        return Err(GraphError::invalid(format!("malformed agent id: {id}")));
    }
    Ok(())
}

pub fn create_agent(conn: &Connection, new: &NewAgent) -> GraphResult<String> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(GraphError::invalid("agent name must not be empty"));
    }
    let id = match &new.id {
        Some(id) => {
            check_id(id)?;
            if agent_exists(conn, id)? {
                return Err(GraphError::invalid(format!("id already in use: {id}")));
            }
            id.clone()
        }
        None => format!("{ID_PREFIX}{}", uuid::Uuid::now_v7().simple()),
    };

    conn.execute(
        "INSERT INTO agents (id, name, agent_type, model_name, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, name, new.agent_type.as_str(), new.model_name, now()],
    )?;
    write_audit_log(
        conn,
        "agent",
        &id,
        Some(&serde_json::json!({ "name": name, "agent_type": new.agent_type })),
    )?;
    tracing::info!(id = %id, name, agent_type = %new.agent_type, "agent created");
    Ok(id)
}

pub fn agent_exists(conn: &Connection, id: &str) -> GraphResult<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM agents WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// `NotFound` unless `id` names an agent.
pub(crate) fn require_agent(conn: &Connection, id: &str) -> GraphResult<()> {
    if agent_exists(conn, id)? {
        Ok(())
    } else {
        Err(GraphError::not_found("agent", id))
    }
}

type AgentRow = (String, String, String, Option<String>, String);

const SELECT_AGENT: &str = "SELECT id, name, agent_type, model_name, created_at FROM agents";

pub fn get_agent(conn: &Connection, id: &str) -> GraphResult<Agent> {
    let row = conn
        .query_row(&format!("{SELECT_AGENT} WHERE id = ?1"), [id], read_row)
        .optional()?
        .ok_or_else(|| GraphError::not_found("agent", id))?;
    into_agent(row)
}

/// All agents, oldest first.
pub fn list_agents(conn: &Connection) -> GraphResult<Vec<Agent>> {
    let mut stmt = conn.prepare(&format!("{SELECT_AGENT} ORDER BY created_at, id"))?;
    let rows = stmt
        .query_map([], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(into_agent).collect()
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_agent((id, name, agent_type, model_name, created_at): AgentRow) -> GraphResult<Agent> {
    Ok(Agent {
        id,
        name,
        agent_type: agent_type.parse().map_err(GraphError::InvalidInput)?,
        model_name,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[test]
    fn create_and_read_back() {
        let conn = open_memory_database().unwrap();
        let id = create_agent(
            &conn,
            &NewAgent {
                model_name: Some("summarizer-v2".into()),
                ..NewAgent::named("  reader  ", AgentType::Llm)
            },
        )
        .unwrap();
        assert!(id.starts_with("agent-"));

        let agent = get_agent(&conn, &id).unwrap();
        assert_eq!(agent.name, "reader");
        assert_eq!(agent.agent_type, AgentType::Llm);
        assert_eq!(agent.model_name.as_deref(), Some("summarizer-v2"));
        assert_eq!(list_agents(&conn).unwrap().len(), 1);
    }

    #[test]
    fn explicit_ids_are_checked() {
        let conn = open_memory_database().unwrap();
        let new = NewAgent {
            id: Some("agent-alice".into()),
            ..NewAgent::named("Alice", AgentType::Human)
        };
        assert_eq!(create_agent(&conn, &new).unwrap(), "agent-alice");
        assert_eq!(create_agent(&conn, &new).unwrap_err().kind(), "invalid_input");

        for bad in ["note-alice", "agent-", "agent-a b"] {
            let err = create_agent(
                &conn,
                &NewAgent {
                    id: Some(bad.into()),
                    ..NewAgent::named("x", AgentType::Human)
                },
            )
            .unwrap_err();
            assert_eq!(err.kind(), "invalid_input", "id {bad:?}");
        }
    }

    #[test]
    fn empty_name_rejected() {
        let conn = open_memory_database().unwrap();
        let err = create_agent(&conn, &NewAgent::named(" ", AgentType::Automated)).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn missing_agent_is_not_found() {
        let conn = open_memory_database().unwrap();
        assert_eq!(get_agent(&conn, "agent-ghost").unwrap_err().kind(), "not_found");
        assert_eq!(require_agent(&conn, "agent-ghost").unwrap_err().kind(), "not_found");
    }
}
