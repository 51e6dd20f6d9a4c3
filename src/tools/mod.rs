pub mod insert;
pub mod lookup;

use insert::{
    InsertAgentParams, InsertArtifactParams, InsertCollectionParams, InsertFragmentParams,
    InsertNoteParams, InsertThingParams, RecordProvenanceParams,
};
use lookup::{
    MarkAnalyzedParams, QueryCollectionParams, QueryNotesAboutParams, QueryThingParams,
    SearchByTagParams, TagEntityParams, TraverseProvenanceParams,
};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use serde::Serialize;
use std::sync::{Arc, Mutex};

use curator::error::{GraphError, GraphResult};
use curator::graph::agent::NewAgent;
use curator::graph::artifact::NewArtifact;
use curator::graph::collection::{self, NewCollection};
use curator::graph::fragment::NewFragment;
use curator::graph::note::NewNote;
use curator::graph::provenance::NewProvenanceRecord;
use curator::graph::thing::{self, NewThing};
use curator::graph::{artifact, entity, provenance, AgentType, EntityKind};
use curator::notebook::Notebook;

/// The curator MCP tool handler. Holds the shared notebook and exposes the
/// graph operations via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct CuratorTools {
    tool_router: ToolRouter<Self>,
    notebook: Arc<Mutex<Notebook>>,
}

impl CuratorTools {
    /// Run `op` on the blocking pool and render its result as JSON. Graph
    /// errors come back as `"<kind>: <message>"`.
    async fn run<T, F>(&self, op: F) -> Result<String, String>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&mut Notebook) -> GraphResult<T> + Send + 'static,
    {
        let notebook = Arc::clone(&self.notebook);
        let value = tokio::task::spawn_blocking(move || {
            let mut nb = notebook
                .lock()
                .map_err(|e| format!("notebook lock poisoned: {e}"))?;
            op(&mut nb).map_err(|e| format!("{}: {e}", e.kind()))
        })
        .await
        .map_err(|e| format!("graph task failed: {e}"))??;

        serde_json::to_string(&value).map_err(|e| format!("serialization failed: {e}"))
    }
}

#[tool_router]
impl CuratorTools {
    pub fn new(notebook: Arc<Mutex<Notebook>>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            notebook,
        }
    }

    #[tool(description = "Create a collection. Without logical_query it is extensional (explicit members); with one it is intensional and its members are computed from the query on every read.")]
    async fn insert_collection(
        &self,
        Parameters(params): Parameters<InsertCollectionParams>,
    ) -> Result<String, String> {
        tracing::info!(name = %params.name, intensional = params.logical_query.is_some(), "insert_collection called");
        self.run(move |nb| {
            let id = nb.create_collection(&NewCollection {
                id: None,
                name: params.name,
                description: params.description,
                query: params.logical_query,
            })?;
            Ok(serde_json::json!({ "success": true, "collection_id": id }))
        })
        .await
    }

    #[tool(description = "Create a thing (paper, gene, case, ...) and optionally add it to an extensional collection.")]
    async fn insert_thing(
        &self,
        Parameters(params): Parameters<InsertThingParams>,
    ) -> Result<String, String> {
        tracing::info!(name = %params.name, "insert_thing called");
        self.run(move |nb| {
            let mut attributes = match params.attributes {
                Some(serde_json::Value::Object(map)) => map,
                Some(_) => {
                    return Err(GraphError::InvalidInput(
                        "attributes must be a JSON object".into(),
                    ))
                }
                None => serde_json::Map::new(),
            };
            if let Some(text) = params.r#abstract {
                attributes.insert("abstract".into(), text.into());
            }
            if let Some(uri) = params.source_uri {
                attributes.insert("source_uri".into(), uri.into());
            }
            let new = NewThing {
                id: None,
                name: params.name,
                thing_type: params.thing_type,
                status: None,
                attributes: Some(serde_json::Value::Object(attributes)),
            };
            let collection_id = params.collection_id;

            let id = nb.write("insert_thing", |tx, _| {
                let id = thing::create_thing(tx, &new)?;
                if let Some(c) = &collection_id {
                    collection::add_member(tx, c, &id)?;
                }
                Ok(id)
            })?;
            Ok(serde_json::json!({ "success": true, "thing_id": id }))
        })
        .await
    }

    #[tool(description = "Capture content as a raw artifact with its source URI. Optionally link it to the thing it represents.")]
    async fn insert_artifact(
        &self,
        Parameters(params): Parameters<InsertArtifactParams>,
    ) -> Result<String, String> {
        tracing::info!(source_uri = %params.source_uri, len = params.content.len(), "insert_artifact called");
        self.run(move |nb| {
            let new = NewArtifact {
                mime_type: params.format,
                represents: params.thing_id,
                ..NewArtifact::from_uri(params.source_uri)
            };
            let id = nb.create_artifact(&new, params.content.as_bytes())?;
            let record = nb.get(&id)?;
            Ok(serde_json::json!({ "success": true, "artifact_id": id, "artifact": record }))
        })
        .await
    }

    #[tool(description = "Record a fragment extracted from an artifact, optionally with its byte span and the agent that extracted it.")]
    async fn insert_fragment(
        &self,
        Parameters(params): Parameters<InsertFragmentParams>,
    ) -> Result<String, String> {
        tracing::info!(artifact_id = %params.artifact_id, "insert_fragment called");
        self.run(move |nb| {
            let id = nb.extract_fragment(&NewFragment {
                id: None,
                artifact_id: params.artifact_id,
                content: params.content,
                offset: params.offset,
                length: params.length,
                author_id: params.agent_id,
            })?;
            Ok(serde_json::json!({ "success": true, "fragment_id": id }))
        })
        .await
    }

    #[tool(description = "Write a note about any entity, including another note. Notes may not end up about themselves.")]
    async fn insert_note(
        &self,
        Parameters(params): Parameters<InsertNoteParams>,
    ) -> Result<String, String> {
        tracing::info!(subject_id = %params.subject_id, "insert_note called");
        self.run(move |nb| {
            let id = nb.create_note(&NewNote {
                id: None,
                subject_id: params.subject_id,
                content: params.content,
                name: params.name,
                confidence: params.confidence,
                tags: params.tags.unwrap_or_default(),
                author_id: params.agent_id,
            })?;
            Ok(serde_json::json!({ "success": true, "note_id": id }))
        })
        .await
    }

    #[tool(description = "Register an agent (human, llm or automated) that can author notes and fragments and record operations.")]
    async fn insert_agent(
        &self,
        Parameters(params): Parameters<InsertAgentParams>,
    ) -> Result<String, String> {
        tracing::info!(name = %params.name, "insert_agent called");
        let agent_type = params
            .agent_type
            .as_deref()
            .map(str::parse::<AgentType>)
            .transpose()
            .map_err(|e| format!("invalid_input: {e}"))?
            .unwrap_or_default();
        self.run(move |nb| {
            let id = nb.create_agent(&NewAgent {
                id: None,
                name: params.name,
                agent_type,
                model_name: params.model_name,
            })?;
            Ok(serde_json::json!({ "success": true, "agent_id": id }))
        })
        .await
    }

    #[tool(description = "Record that an agent produced an entity from source entities, with the operation type and its parameters.")]
    async fn record_provenance(
        &self,
        Parameters(params): Parameters<RecordProvenanceParams>,
    ) -> Result<String, String> {
        tracing::info!(
            produced = %params.produced_entity_id,
            operation = %params.operation_type,
            "record_provenance called"
        );
        self.run(move |nb| {
            let id = nb.record_provenance(&NewProvenanceRecord {
                produced_id: params.produced_entity_id,
                source_ids: params.source_entity_ids,
                agent_id: params.agent_id,
                operation_type: params.operation_type,
                parameters: params.operation_parameters,
            })?;
            Ok(serde_json::json!({ "success": true, "record_id": id }))
        })
        .await
    }

    #[tool(description = "Get a collection and its current members.")]
    async fn query_collection(
        &self,
        Parameters(params): Parameters<QueryCollectionParams>,
    ) -> Result<String, String> {
        tracing::info!(collection_id = %params.collection_id, "query_collection called");
        self.run(move |nb| {
            nb.read("query_collection", |tx, _| {
                let record = collection::get_collection(tx, &params.collection_id)?;
                let members = collection::resolve_members(tx, &params.collection_id)?;
                Ok(serde_json::json!({ "collection": record, "members": members }))
            })
        })
        .await
    }

    #[tool(description = "Get a thing with the artifacts that represent it, the notes about it and the collections holding it.")]
    async fn query_thing(
        &self,
        Parameters(params): Parameters<QueryThingParams>,
    ) -> Result<String, String> {
        tracing::info!(thing_id = %params.thing_id, "query_thing called");
        self.run(move |nb| {
            nb.read("query_thing", |tx, _| {
                let record = thing::get_thing(tx, &params.thing_id)?;
                let artifacts = artifact::representations_of(tx, &params.thing_id)?;
                let notes = provenance::notes_about(tx, &params.thing_id)?;
                let collections = collection::collections_containing(tx, &params.thing_id)?;
                Ok(serde_json::json!({
                    "thing": record,
                    "artifacts": artifacts,
                    "notes": notes,
                    "collections": collections,
                }))
            })
        })
        .await
    }

    #[tool(description = "List the notes directly about an entity, with their content.")]
    async fn query_notes_about(
        &self,
        Parameters(params): Parameters<QueryNotesAboutParams>,
    ) -> Result<String, String> {
        tracing::info!(subject_id = %params.subject_id, "query_notes_about called");
        self.run(move |nb| {
            nb.read("query_notes_about", |tx, _| {
                let notes = provenance::notes_about(tx, &params.subject_id)?
                    .iter()
                    .map(|id| entity::get(tx, id))
                    .collect::<GraphResult<Vec<_>>>()?;
                Ok(serde_json::json!({ "subject_id": params.subject_id, "notes": notes }))
            })
        })
        .await
    }

    #[tool(description = "Find entities carrying a tag, optionally of one kind.")]
    async fn search_by_tag(
        &self,
        Parameters(params): Parameters<SearchByTagParams>,
    ) -> Result<String, String> {
        tracing::info!(tag = %params.tag_name, "search_by_tag called");
        let kind = params
            .entity_type
            .as_deref()
            .map(str::parse::<EntityKind>)
            .transpose()
            .map_err(|e| format!("invalid_input: {e}"))?;
        self.run(move |nb| {
            let ids = nb.find_by_tag_kind(&params.tag_name, kind)?;
            Ok(serde_json::json!({ "tag": params.tag_name, "entities": ids }))
        })
        .await
    }

    #[tool(description = "Attach a tag to any entity. Tagging twice is harmless.")]
    async fn tag_entity(
        &self,
        Parameters(params): Parameters<TagEntityParams>,
    ) -> Result<String, String> {
        tracing::info!(entity_id = %params.entity_id, tag = %params.tag_name, "tag_entity called");
        self.run(move |nb| {
            let added = nb.tag(&params.entity_id, &params.tag_name)?;
            Ok(serde_json::json!({ "success": true, "added": added }))
        })
        .await
    }

    #[tool(description = "Trace an entity back to its origin: note to subject, fragment to artifact, artifact to the thing it represents. Also lists the recorded operations that produced each entity on the way.")]
    async fn traverse_provenance(
        &self,
        Parameters(params): Parameters<TraverseProvenanceParams>,
    ) -> Result<String, String> {
        tracing::info!(entity_id = %params.entity_id, "traverse_provenance called");
        self.run(move |nb| {
            nb.read("traverse_provenance", |tx, _| {
                let trace = provenance::trace(tx, &params.entity_id)?;
                let mut records = provenance::provenance_records(tx, &trace.origin)?;
                for step in &trace.steps {
                    records.extend(provenance::provenance_records(tx, &step.id)?);
                }
                Ok(serde_json::json!({
                    "origin": trace.origin,
                    "steps": trace.steps,
                    "tombstoned_subject": trace.tombstoned_subject,
                    "records": records,
                }))
            })
        })
        .await
    }

    #[tool(description = "Mark an artifact as analyzed. Marking an analyzed artifact again is a no-op.")]
    async fn mark_analyzed(
        &self,
        Parameters(params): Parameters<MarkAnalyzedParams>,
    ) -> Result<String, String> {
        tracing::info!(artifact_id = %params.artifact_id, "mark_analyzed called");
        self.run(move |nb| {
            let changed = nb.mark_analyzed(&params.artifact_id)?;
            Ok(serde_json::json!({ "success": true, "changed": changed }))
        })
        .await
    }
}

#[tool_handler]
impl ServerHandler for CuratorTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Curator is a research notebook graph. Capture sources with insert_artifact, \
                 extract passages with insert_fragment, annotate anything with insert_note, \
                 register yourself with insert_agent and log your work with record_provenance, \
                 and follow traverse_provenance back to where a claim came from."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
