//! Entity kinds, identifiers and the typed records returned by `get`.
//!
//! Every id is `<kind>-<uuid v7 simple hex>`; the prefix is how callers route a
//! bare id to the right record type (see [`EntityKind::from_id`]).

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// The five entity kinds held by the graph. Tags are labels, not entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Thing,
    Artifact,
    Fragment,
    Note,
    Collection,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        Self::Thing,
        Self::Artifact,
        Self::Fragment,
        Self::Note,
        Self::Collection,
    ];

    /// SQL-compatible string representation; also the id prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thing => "thing",
            Self::Artifact => "artifact",
            Self::Fragment => "fragment",
            Self::Note => "note",
            Self::Collection => "collection",
        }
    }

    /// Mint a fresh, time-sortable id for this kind.
    pub fn new_id(&self) -> String {
        format!("{}-{}", self.as_str(), uuid::Uuid::now_v7().simple())
    }

    /// Route an id to its kind by prefix.
    pub fn from_id(id: &str) -> GraphResult<Self> {
        let (prefix, rest) = id
            .split_once('-')
            .ok_or_else(|| GraphError::invalid(format!("malformed id: {id}")))?;
        if rest.is_empty() {
            return Err(GraphError::invalid(format!("malformed id: {id}")));
        }
        prefix
            .parse()
            .map_err(|_| GraphError::invalid(format!("unknown id prefix: {id}")))
    }

    /// Validate a caller-supplied id for this kind.
    pub fn check_id(&self, id: &str) -> GraphResult<()> {
        if Self::from_id(id)? != *self {
            return Err(GraphError::invalid(format!(
                "id {id} does not carry the {} prefix",
                self.as_str()
            )));
        }
        let well_formed = id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !well_formed {
            return Err(GraphError::invalid(format!("id contains invalid characters: {id}")));
        }
        Ok(())
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thing" => Ok(Self::Thing),
            "artifact" => Ok(Self::Artifact),
            "fragment" => Ok(Self::Fragment),
            "note" => Ok(Self::Note),
            "collection" => Ok(Self::Collection),
            _ => Err(format!("unknown entity kind: {s}")),
        }
    }
}

/// Artifact processing status. The only transition is `raw` → `analyzed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Raw,
    Analyzed,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Analyzed => "analyzed",
        }
    }
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "analyzed" => Ok(Self::Analyzed),
            _ => Err(format!("unknown artifact status: {s}")),
        }
    }
}

/// A primary domain item (paper, case, gene, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thing {
    pub id: String,
    pub name: String,
    /// Domain label such as `"paper"`; opaque to the graph.
    pub thing_type: Option<String>,
    pub status: Option<String>,
    /// Domain-specific attributes, always a JSON object.
    pub attributes: serde_json::Value,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Where an artifact's bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "placement", rename_all = "snake_case")]
pub enum ArtifactStorage {
    /// Bytes are held in the graph record itself.
    Inline,
    /// Bytes are in the content store at this store-relative path.
    Cached { path: String },
}

/// Immutable captured content plus provenance metadata. The body is not part
/// of the record; read it with `read_artifact_content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub source_uri: String,
    pub retrieved_at: String,
    pub mime_type: String,
    pub content_hash: String,
    pub size: u64,
    pub storage: ArtifactStorage,
    pub status: ArtifactStatus,
    /// Thing this artifact is a representation of (set once).
    pub represents: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    /// Artifact the fragment was extracted from.
    pub artifact_id: String,
    pub content: String,
    /// Byte offset of the passage in the artifact body, when known.
    pub offset: Option<u64>,
    /// Byte length of the passage in the artifact body, when known.
    pub length: Option<u64>,
    /// Agent that extracted the fragment.
    pub author_id: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A note's aboutness edge. Deleting the subject leaves a tombstone carrying
/// the old id; the note itself survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NoteSubject {
    Live { id: String },
    Tombstone { id: String },
}

impl NoteSubject {
    pub fn id(&self) -> &str {
        match self {
            Self::Live { id } | Self::Tombstone { id } => id,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub name: Option<String>,
    pub content: String,
    /// Confidence in `[0.0, 1.0]`, if the author gave one.
    pub confidence: Option<f64>,
    pub subject: NoteSubject,
    /// Agent that wrote the note.
    pub author_id: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// How a collection's members are determined. Fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Membership {
    /// Explicit member list maintained by add/remove.
    Extensional,
    /// Members computed on every read from a stored logical query.
    Intensional { query: String },
}

impl Membership {
    pub fn mode_str(&self) -> &'static str {
        match self {
            Self::Extensional => "extensional",
            Self::Intensional { .. } => "intensional",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub membership: Membership,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// What kind of actor an [`Agent`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Human,
    #[default]
    Llm,
    Automated,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Llm => "llm",
            Self::Automated => "automated",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(Self::Human),
            "llm" => Ok(Self::Llm),
            "automated" => Ok(Self::Automated),
            _ => Err(format!("unknown agent type: {s}")),
        }
    }
}

/// A person, model or pipeline that authors notes and fragments and performs
/// recorded operations. Agents sit outside the entity registry: they are never
/// tagged, collected, annotated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub agent_type: AgentType,
    pub model_name: Option<String>,
    pub created_at: String,
}

/// One recorded operation: `agent_id` produced `produced_id` from `source_ids`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub id: String,
    pub produced_id: String,
    /// Inputs in the order they were given.
    pub source_ids: Vec<String>,
    pub agent_id: String,
    pub operation_type: String,
    /// Free-form JSON object describing how the operation was run.
    pub parameters: Option<serde_json::Value>,
    pub recorded_at: String,
}

/// Any record returned by `get(id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Thing(Thing),
    Artifact(Artifact),
    Fragment(Fragment),
    Note(Note),
    Collection(Collection),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Self::Thing(t) => &t.id,
            Self::Artifact(a) => &a.id,
            Self::Fragment(f) => &f.id,
            Self::Note(n) => &n.id,
            Self::Collection(c) => &c.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Thing(_) => EntityKind::Thing,
            Self::Artifact(_) => EntityKind::Artifact,
            Self::Fragment(_) => EntityKind::Fragment,
            Self::Note(_) => EntityKind::Note,
            Self::Collection(_) => EntityKind::Collection,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Self::Thing(t) => &t.tags,
            Self::Artifact(a) => &a.tags,
            Self::Fragment(f) => &f.tags,
            Self::Note(n) => &n.tags,
            Self::Collection(c) => &c.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_carry_kind_prefix() {
        for kind in EntityKind::ALL {
            let id = kind.new_id();
            assert!(id.starts_with(&format!("{}-", kind.as_str())));
            assert_eq!(EntityKind::from_id(&id).unwrap(), kind);
            kind.check_id(&id).unwrap();
        }
    }

    #[test]
    fn ids_are_unique() {
        let a = EntityKind::Note.new_id();
        let b = EntityKind::Note.new_id();
        assert_ne!(a, b);
    }

    #[test]
    fn from_id_rejects_unknown_prefixes() {
        assert!(EntityKind::from_id("widget-123").is_err());
        assert!(EntityKind::from_id("artifact-").is_err());
        assert!(EntityKind::from_id("nodash").is_err());
    }

    #[test]
    fn check_id_rejects_wrong_kind() {
        let err = EntityKind::Note.check_id("artifact-abc").unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert!(EntityKind::Note.check_id("note-has space").is_err());
        EntityKind::Note.check_id("note-my_custom-id").unwrap();
    }

    #[test]
    fn entity_serializes_with_kind_tag() {
        let note = Entity::Note(Note {
            id: "note-1".into(),
            name: None,
            content: "c".into(),
            confidence: Some(0.5),
            subject: NoteSubject::Tombstone {
                id: "fragment-1".into(),
            },
            author_id: None,
            tags: vec![],
            created_at: "t".into(),
            updated_at: "t".into(),
        });
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["kind"], "note");
        assert_eq!(json["subject"]["state"], "tombstone");
        assert_eq!(json["subject"]["id"], "fragment-1");
    }

    #[test]
    fn collection_serializes_mode_inline() {
        let c = Collection {
            id: "collection-1".into(),
            name: "raw".into(),
            description: None,
            membership: Membership::Intensional {
                query: "status:raw".into(),
            },
            tags: vec![],
            created_at: "t".into(),
            updated_at: "t".into(),
        };
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["mode"], "intensional");
        assert_eq!(json["query"], "status:raw");
    }

    #[test]
    fn agent_type_parses_and_defaults_to_llm() {
        assert_eq!("human".parse::<AgentType>().unwrap(), AgentType::Human);
        assert_eq!("automated".parse::<AgentType>().unwrap(), AgentType::Automated);
        assert!("robot".parse::<AgentType>().is_err());
        assert_eq!(AgentType::default(), AgentType::Llm);
        assert_eq!(serde_json::to_value(AgentType::Llm).unwrap(), "llm");
    }
}
