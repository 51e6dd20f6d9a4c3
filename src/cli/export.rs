use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use curator::config::CuratorConfig;
use curator::graph::{Agent, Entity, EntityKind, Membership, ProvenanceRecord};
use curator::notebook::Notebook;

/// Export format: every entity grouped by kind, stored collection members,
/// agents, and the operations recorded as producing live entities.
#[derive(Debug, Serialize)]
struct ExportData {
    entities: BTreeMap<&'static str, Vec<Entity>>,
    members: BTreeMap<String, Vec<String>>,
    agents: Vec<Agent>,
    records: Vec<ProvenanceRecord>,
}

/// Export the whole graph as JSON to stdout. Cached artifact bodies are referenced, not inlined.
pub fn export(config: &CuratorConfig) -> Result<()> {
    let mut nb = Notebook::open(config)?;

    let mut data = ExportData {
        entities: BTreeMap::new(),
        members: BTreeMap::new(),
        agents: nb.list_agents()?,
        records: Vec::new(),
    };
    let mut total = 0;

    for kind in EntityKind::ALL {
        let mut records = Vec::new();
        for id in nb.list_ids(kind)? {
            let entity = nb.get(&id)?;
            if let Entity::Collection(ref c) = entity {
                if c.membership == Membership::Extensional {
                    data.members.insert(c.id.clone(), nb.resolve_members(&c.id)?);
                }
            }
            data.records.extend(nb.provenance_records(&id)?);
            records.push(entity);
        }
        total += records.len();
        data.entities.insert(kind.as_str(), records);
    }

    super::print_json(&data)?;
    eprintln!(
        "Exported {total} entities, {} collection member lists, {} agents and {} records.",
        data.members.len(),
        data.agents.len(),
        data.records.len()
    );
    Ok(())
}
