use anyhow::Result;

use curator::config::CuratorConfig;
use curator::notebook::Notebook;

/// Print any entity as JSON, with the collections that list it.
pub fn show(config: &CuratorConfig, id: &str) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    let entity = nb.get(id)?;
    let collections = nb.collections_containing(id)?;
    super::print_json(&serde_json::json!({ "entity": entity, "collections": collections }))
}

/// Print the provenance chain of `id`, or the full trace with relations.
pub fn provenance(config: &CuratorConfig, id: &str, trace: bool) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    if trace {
        return super::print_json(&nb.trace_provenance(id)?);
    }
    let chain = nb.provenance_chain(id)?;
    super::print_json(&serde_json::json!({ "id": id, "chain": chain }))
}

/// Print the notes directly about `id`, with their records.
pub fn notes_about(config: &CuratorConfig, id: &str) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    let notes = nb
        .notes_about(id)?
        .iter()
        .map(|note_id| nb.get(note_id))
        .collect::<Result<Vec<_>, _>>()?;
    super::print_json(&serde_json::json!({ "subject_id": id, "notes": notes }))
}

/// Print notes whose subject was deleted, with the id they still point at.
pub fn tombstones(config: &CuratorConfig) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    let notes = nb
        .tombstoned_notes()?
        .iter()
        .map(|note_id| nb.get(note_id))
        .collect::<Result<Vec<_>, _>>()?;
    super::print_json(&notes)
}

/// Print the operations recorded as producing `id`.
pub fn records(config: &CuratorConfig, id: &str) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    let records = nb.provenance_records(id)?;
    super::print_json(&serde_json::json!({ "id": id, "records": records }))
}
