pub mod doctor;
pub mod export;
pub mod ingest;
pub mod inspect;
pub mod stats;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use curator::config::CuratorConfig;
use curator::graph::agent::NewAgent;
use curator::graph::collection::NewCollection;
use curator::graph::fragment::NewFragment;
use curator::graph::note::{NewNote, NoteUpdate};
use curator::graph::provenance::NewProvenanceRecord;
use curator::graph::thing::NewThing;
use curator::graph::{AgentType, ArtifactStatus, EntityKind};
use curator::notebook::Notebook;

#[derive(Subcommand)]
pub enum ThingAction {
    /// Create a thing
    Add {
        #[arg(long)]
        name: String,
        #[arg(long = "type")]
        thing_type: Option<String>,
        #[arg(long)]
        status: Option<String>,
        /// JSON object of attributes
        #[arg(long)]
        attrs: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    /// Merge a JSON object into a thing's attributes (null removes a key)
    Update {
        id: String,
        #[arg(long)]
        attrs: String,
    },
    /// Set or clear a thing's status
    Status {
        id: String,
        /// New status; omit to clear
        status: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum NoteAction {
    /// Write a note about an entity
    Add {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        confidence: Option<f64>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Agent writing the note
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    /// Append a paragraph to a note
    Append { id: String, text: String },
    /// Change a note's name or confidence
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        confidence: Option<f64>,
    },
    /// Point a note at a different subject
    Retarget { id: String, subject: String },
}

#[derive(Subcommand)]
pub enum AgentAction {
    /// Register an agent
    Add {
        #[arg(long)]
        name: String,
        /// human, llm or automated
        #[arg(long = "type", default_value = "llm")]
        agent_type: AgentType,
        /// Model identifier for llm agents
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    /// List agents
    List,
    /// Print one agent
    Show { id: String },
}

#[derive(Subcommand)]
pub enum CollectionAction {
    /// Create a collection; --query makes it intensional
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    /// Add members to an extensional collection
    Add {
        collection_id: String,
        #[arg(required = true)]
        members: Vec<String>,
    },
    /// Remove a member from an extensional collection
    Remove {
        collection_id: String,
        member: String,
    },
    /// Replace an intensional collection's query
    SetQuery { collection_id: String, query: String },
    /// Resolve a collection's current members
    Members { collection_id: String },
}

/// Pretty JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_json_object(text: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(text).context("expected valid JSON")?;
    anyhow::ensure!(value.is_object(), "expected a JSON object");
    Ok(value)
}

pub fn thing(config: &CuratorConfig, action: ThingAction) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    match action {
        ThingAction::Add {
            name,
            thing_type,
            status,
            attrs,
            id,
        } => {
            let attributes = attrs.as_deref().map(parse_json_object).transpose()?;
            let id = nb.create_thing(&NewThing {
                id,
                name,
                thing_type,
                status,
                attributes,
            })?;
            print_json(&serde_json::json!({ "thing_id": id }))
        }
        ThingAction::Update { id, attrs } => {
            let thing = nb.update_thing_attributes(&id, &parse_json_object(&attrs)?)?;
            print_json(&thing)
        }
        ThingAction::Status { id, status } => {
            nb.set_thing_status(&id, status.as_deref())?;
            print_json(&serde_json::json!({ "thing_id": id, "status": status }))
        }
    }
}

pub fn analyzed(config: &CuratorConfig, artifact_id: &str) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    let changed = nb.mark_analyzed(artifact_id)?;
    print_json(&serde_json::json!({ "artifact_id": artifact_id, "changed": changed }))
}

pub fn represent(config: &CuratorConfig, artifact_id: &str, thing_id: &str) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    nb.set_representation(artifact_id, thing_id)?;
    print_json(&serde_json::json!({ "artifact_id": artifact_id, "represents": thing_id }))
}

pub fn fragment(config: &CuratorConfig, new: &NewFragment) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    let id = nb.extract_fragment(new)?;
    print_json(&serde_json::json!({ "fragment_id": id }))
}

pub fn note(config: &CuratorConfig, action: NoteAction) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    match action {
        NoteAction::Add {
            subject,
            content,
            name,
            confidence,
            tags,
            author,
            id,
        } => {
            let id = nb.create_note(&NewNote {
                id,
                subject_id: subject,
                content,
                name,
                confidence,
                tags,
                author_id: author,
            })?;
            print_json(&serde_json::json!({ "note_id": id }))
        }
        NoteAction::Append { id, text } => print_json(&nb.append_note_content(&id, &text)?),
        NoteAction::Update {
            id,
            name,
            confidence,
        } => print_json(&nb.update_note(&id, &NoteUpdate { name, confidence })?),
        NoteAction::Retarget { id, subject } => {
            nb.retarget_note(&id, &subject)?;
            print_json(&serde_json::json!({ "note_id": id, "subject_id": subject }))
        }
    }
}

pub fn agent(config: &CuratorConfig, action: AgentAction) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    match action {
        AgentAction::Add {
            name,
            agent_type,
            model,
            id,
        } => {
            let id = nb.create_agent(&NewAgent {
                id,
                name,
                agent_type,
                model_name: model,
            })?;
            print_json(&serde_json::json!({ "agent_id": id }))
        }
        AgentAction::List => print_json(&nb.list_agents()?),
        AgentAction::Show { id } => print_json(&nb.get_agent(&id)?),
    }
}

pub fn record(
    config: &CuratorConfig,
    produced_id: String,
    agent_id: String,
    operation_type: String,
    source_ids: Vec<String>,
    params: Option<&str>,
) -> Result<()> {
    let parameters = params.map(parse_json_object).transpose()?;
    let mut nb = Notebook::open(config)?;
    let id = nb.record_provenance(&NewProvenanceRecord {
        produced_id,
        source_ids,
        agent_id,
        operation_type,
        parameters,
    })?;
    print_json(&serde_json::json!({ "record_id": id }))
}

pub fn collection(config: &CuratorConfig, action: CollectionAction) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    match action {
        CollectionAction::Create {
            name,
            description,
            query,
            id,
        } => {
            let id = nb.create_collection(&NewCollection {
                id,
                name,
                description,
                query,
            })?;
            print_json(&serde_json::json!({ "collection_id": id }))
        }
        CollectionAction::Add {
            collection_id,
            members,
        } => {
            let mut added = Vec::new();
            for member in &members {
                if nb.add_member(&collection_id, member)? {
                    added.push(member.as_str());
                }
            }
            print_json(&serde_json::json!({ "collection_id": collection_id, "added": added }))
        }
        CollectionAction::Remove {
            collection_id,
            member,
        } => {
            let removed = nb.remove_member(&collection_id, &member)?;
            print_json(&serde_json::json!({ "collection_id": collection_id, "removed": removed }))
        }
        CollectionAction::SetQuery {
            collection_id,
            query,
        } => {
            nb.set_query(&collection_id, &query)?;
            print_json(&serde_json::json!({ "collection_id": collection_id, "query": query }))
        }
        CollectionAction::Members { collection_id } => {
            let members = nb.resolve_members(&collection_id)?;
            print_json(&serde_json::json!({ "collection_id": collection_id, "members": members }))
        }
    }
}

pub fn tag(config: &CuratorConfig, id: &str, labels: &[String]) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    let mut added = Vec::new();
    for label in labels {
        if nb.tag(id, label)? {
            added.push(label.trim());
        }
    }
    print_json(&serde_json::json!({ "entity_id": id, "added": added }))
}

pub fn untag(config: &CuratorConfig, id: &str, label: &str) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    let removed = nb.untag(id, label)?;
    print_json(&serde_json::json!({ "entity_id": id, "removed": removed }))
}

pub fn search_tag(config: &CuratorConfig, label: &str, kind: Option<EntityKind>) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    let ids = nb.find_by_tag_kind(label, kind)?;
    print_json(&serde_json::json!({ "tag": label, "entities": ids }))
}

pub fn artifacts(config: &CuratorConfig, status: Option<ArtifactStatus>) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    print_json(&nb.find_artifacts(status)?)
}

pub fn things(config: &CuratorConfig, thing_type: Option<&str>) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    print_json(&nb.find_things(thing_type)?)
}

pub fn tags(config: &CuratorConfig) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    print_json(&nb.list_tags()?)
}

pub fn delete(config: &CuratorConfig, id: &str, cascade: bool) -> Result<()> {
    let mut nb = Notebook::open(config)?;
    let result = nb.delete(id, cascade)?;
    if !result.tombstoned_notes.is_empty() {
        eprintln!(
            "{} note(s) now point at a deleted subject.",
            result.tombstoned_notes.len()
        );
    }
    print_json(&result)
}
