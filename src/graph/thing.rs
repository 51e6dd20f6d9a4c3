use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use super::entity::{self, DeleteResult};
use super::tags::tags_for;
use super::types::{EntityKind, Thing};
use super::{now, write_audit_log};
use crate::error::{GraphError, GraphResult};

/// Input for [`create_thing`].
#[derive(Debug, Clone, Default)]
pub struct NewThing {
    /// Caller-chosen id; must carry the `thing-` prefix.
    pub id: Option<String>,
    pub name: String,
    pub thing_type: Option<String>,
    pub status: Option<String>,
    /// JSON object of domain attributes. `None` means `{}`.
    pub attributes: Option<Value>,
}

impl NewThing {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

pub fn create_thing(conn: &Connection, new: &NewThing) -> GraphResult<String> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(GraphError::invalid("thing name must not be empty"));
    }
    let attributes = match &new.attributes {
        None => Value::Object(Map::new()),
        Some(v @ Value::Object(_)) => v.clone(),
        Some(_) => return Err(GraphError::invalid("thing attributes must be a JSON object")),
    };

    let id = entity::resolve_id(conn, EntityKind::Thing, new.id.as_deref())?;
    let ts = now();
    entity::register(conn, &id, EntityKind::Thing, &ts)?;
    conn.execute(
        "INSERT INTO things (id, name, thing_type, status, attributes) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, name, new.thing_type, new.status, attributes.to_string()],
    )?;

    write_audit_log(
        conn,
        "create",
        &id,
        Some(&serde_json::json!({ "kind": "thing", "name": name })),
    )?;
    tracing::info!(id = %id, name, "thing created");
    Ok(id)
}

pub fn get_thing(conn: &Connection, id: &str) -> GraphResult<Thing> {
    let row = conn
        .query_row(
            "SELECT t.name, t.thing_type, t.status, t.attributes, e.created_at, e.updated_at
             FROM things t JOIN entities e ON e.id = t.id WHERE t.id = ?1",
            [id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| GraphError::not_found("thing", id))?;

    let (name, thing_type, status, attributes, created_at, updated_at) = row;
    Ok(Thing {
        id: id.to_string(),
        name,
        thing_type,
        status,
        attributes: serde_json::from_str(&attributes)?,
        tags: tags_for(conn, id)?,
        created_at,
        updated_at,
    })
}

/// Merge `patch` into the thing's attributes. A `null` value removes the key.
pub fn update_thing_attributes(conn: &Connection, id: &str, patch: &Value) -> GraphResult<Thing> {
    let Value::Object(changes) = patch else {
        return Err(GraphError::invalid("attribute patch must be a JSON object"));
    };
    let mut thing = get_thing(conn, id)?;
    let attrs = thing
        .attributes
        .as_object_mut()
        .ok_or_else(|| GraphError::invalid(format!("stored attributes of {id} are not an object")))?;

    for (key, value) in changes {
        if value.is_null() {
            attrs.remove(key);
        } else {
            attrs.insert(key.clone(), value.clone());
        }
    }

    conn.execute(
        "UPDATE things SET attributes = ?1 WHERE id = ?2",
        params![thing.attributes.to_string(), id],
    )?;
    entity::touch(conn, id)?;
    write_audit_log(conn, "update", id, Some(patch))?;
    get_thing(conn, id)
}

/// Set (or clear, with `None`) the free-form thing status. Idempotent.
pub fn set_thing_status(conn: &Connection, id: &str, status: Option<&str>) -> GraphResult<()> {
    let current: Option<Option<String>> = conn
        .query_row("SELECT status FROM things WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    let Some(current) = current else {
        return Err(GraphError::not_found("thing", id));
    };
    if current.as_deref() == status {
        return Ok(());
    }

    conn.execute(
        "UPDATE things SET status = ?1 WHERE id = ?2",
        params![status, id],
    )?;
    entity::touch(conn, id)?;
    write_audit_log(
        conn,
        "status",
        id,
        Some(&serde_json::json!({ "from": current, "to": status })),
    )?;
    Ok(())
}

/// Delete a thing. Artifacts that represented it keep existing with
/// `represents` cleared; notes about it are tombstoned.
pub fn delete_thing(conn: &Connection, id: &str) -> GraphResult<DeleteResult> {
    entity::require_kind(conn, id, EntityKind::Thing)?;
    let mut result = DeleteResult {
        id: id.to_string(),
        ..DeleteResult::default()
    };
    entity::remove(conn, id, &mut result)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use serde_json::json;

    #[test]
    fn create_and_get_thing() {
        let conn = open_memory_database().unwrap();
        let id = create_thing(
            &conn,
            &NewThing {
                name: "Attention Is All You Need".into(),
                thing_type: Some("paper".into()),
                attributes: Some(json!({ "year": 2017 })),
                ..NewThing::default()
            },
        )
        .unwrap();

        let thing = get_thing(&conn, &id).unwrap();
        assert_eq!(thing.name, "Attention Is All You Need");
        assert_eq!(thing.thing_type.as_deref(), Some("paper"));
        assert_eq!(thing.attributes["year"], 2017);
        assert!(thing.status.is_none());
    }

    #[test]
    fn empty_name_rejected() {
        let conn = open_memory_database().unwrap();
        let err = create_thing(&conn, &NewThing::named("   ")).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn non_object_attributes_rejected() {
        let conn = open_memory_database().unwrap();
        let err = create_thing(
            &conn,
            &NewThing {
                name: "x".into(),
                attributes: Some(json!([1, 2])),
                ..NewThing::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn attribute_patch_merges_and_removes() {
        let conn = open_memory_database().unwrap();
        let id = create_thing(
            &conn,
            &NewThing {
                name: "case".into(),
                attributes: Some(json!({ "a": 1, "b": 2 })),
                ..NewThing::default()
            },
        )
        .unwrap();

        let thing = update_thing_attributes(&conn, &id, &json!({ "b": null, "c": "new" })).unwrap();
        assert_eq!(thing.attributes, json!({ "a": 1, "c": "new" }));
    }

    #[test]
    fn status_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let id = create_thing(&conn, &NewThing::named("gene")).unwrap();

        set_thing_status(&conn, &id, Some("reviewed")).unwrap();
        set_thing_status(&conn, &id, Some("reviewed")).unwrap();
        assert_eq!(get_thing(&conn, &id).unwrap().status.as_deref(), Some("reviewed"));

        let updates: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM graph_log WHERE operation = 'status' AND entity_id = ?1",
                [&id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(updates, 1);
    }

    #[test]
    fn status_on_missing_thing_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = set_thing_status(&conn, "thing-nope", Some("x")).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
