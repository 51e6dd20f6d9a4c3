//! Parameters for the MCP read and annotation tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct QueryCollectionParams {
    #[schemars(description = "Collection id")]
    pub collection_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct QueryThingParams {
    #[schemars(description = "Thing id")]
    pub thing_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct QueryNotesAboutParams {
    #[schemars(description = "Id of the entity the notes are about")]
    pub subject_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchByTagParams {
    #[schemars(description = "Tag label (exact, case-sensitive)")]
    pub tag_name: String,

    #[schemars(description = "Optional kind filter: thing, artifact, fragment, note, collection")]
    pub entity_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TagEntityParams {
    #[schemars(description = "Id of the entity to tag")]
    pub entity_id: String,

    #[schemars(description = "Tag label")]
    pub tag_name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TraverseProvenanceParams {
    #[schemars(description = "Fragment, note or artifact id to trace back to its origin")]
    pub entity_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MarkAnalyzedParams {
    #[schemars(description = "Artifact id")]
    pub artifact_id: String,
}
