//! Parameters for the MCP tools that create entities.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InsertCollectionParams {
    #[schemars(description = "Collection name")]
    pub name: String,

    #[schemars(description = "Optional description of what the collection gathers")]
    pub description: Option<String>,

    #[schemars(
        description = "Optional logical query; makes the collection intensional. Fields: kind, tag, status, mime, type, name, about, from, in. Combine with AND, OR, NOT and parentheses, e.g. 'kind:artifact AND status:raw'"
    )]
    pub logical_query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InsertThingParams {
    #[schemars(description = "Name or title of the thing")]
    pub name: String,

    #[schemars(description = "Domain type label, e.g. 'paper', 'gene', 'case'")]
    pub thing_type: Option<String>,

    #[schemars(description = "Optional extensional collection to add the new thing to")]
    pub collection_id: Option<String>,

    #[schemars(description = "Optional abstract or summary, stored as an attribute")]
    pub r#abstract: Option<String>,

    #[schemars(description = "Optional source URI, stored as an attribute")]
    pub source_uri: Option<String>,

    #[schemars(description = "Optional JSON object of further attributes")]
    pub attributes: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InsertArtifactParams {
    #[schemars(description = "Where the content was captured from (URL, DOI, file path)")]
    pub source_uri: String,

    #[schemars(description = "The captured content as text")]
    pub content: String,

    #[schemars(description = "MIME type of the content; guessed from the URI and bytes if omitted")]
    pub format: Option<String>,

    #[schemars(description = "Optional thing this artifact is a representation of")]
    pub thing_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InsertFragmentParams {
    #[schemars(description = "Artifact the fragment was extracted from")]
    pub artifact_id: String,

    #[schemars(description = "Extracted text")]
    pub content: String,

    #[schemars(description = "Optional byte offset of the passage in the artifact content")]
    pub offset: Option<u64>,

    #[schemars(description = "Optional byte length of the passage; requires offset")]
    pub length: Option<u64>,

    #[schemars(description = "Optional id of the agent that extracted the fragment")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InsertNoteParams {
    #[schemars(description = "The entity this note is about (thing, artifact, fragment, note or collection id)")]
    pub subject_id: String,

    #[schemars(description = "Note text")]
    pub content: String,

    #[schemars(description = "Optional short name, e.g. 'summary' or 'critique'")]
    pub name: Option<String>,

    #[schemars(description = "Optional confidence 0.0-1.0")]
    pub confidence: Option<f64>,

    #[schemars(description = "Optional tags to attach to the note")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Optional id of the agent writing the note")]
    pub agent_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InsertAgentParams {
    #[schemars(description = "Agent name")]
    pub name: String,

    #[schemars(description = "One of 'human', 'llm', 'automated'. Defaults to 'llm'")]
    pub agent_type: Option<String>,

    #[schemars(description = "Optional model identifier for llm agents")]
    pub model_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecordProvenanceParams {
    #[schemars(description = "Id of the entity the operation produced")]
    pub produced_entity_id: String,

    #[schemars(description = "Ids of the entities the operation read, in order")]
    pub source_entity_ids: Vec<String>,

    #[schemars(description = "Id of the agent that performed the operation")]
    pub agent_id: String,

    #[schemars(description = "Kind of operation, e.g. 'extraction', 'summarization', 'classification'")]
    pub operation_type: String,

    #[schemars(description = "Optional JSON object of operation parameters")]
    pub operation_parameters: Option<serde_json::Value>,
}
