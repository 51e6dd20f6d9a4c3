//! [`Notebook`]: one handle onto the graph database plus its content store.
//!
//! Every method is one atomic operation. Writes run in an IMMEDIATE
//! transaction, reads in a snapshot transaction, both bounded by the
//! notebook's deadline. Open one `Notebook` per thread or task; SQLite
//! serializes concurrent writers across handles on the same file.

use anyhow::Result;
use rusqlite::{Connection, Transaction};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::CuratorConfig;
use crate::content::ContentStore;
use crate::db;
use crate::error::GraphResult;
use crate::graph::agent::{self, NewAgent};
use crate::graph::artifact::{self, NewArtifact};
use crate::graph::collection::{self, NewCollection};
use crate::graph::entity::{self, DeleteResult};
use crate::graph::fragment::{self, NewFragment};
use crate::graph::index::{self, TagCount};
use crate::graph::note::{self, NewNote, NoteUpdate};
use crate::graph::provenance::{self, NewProvenanceRecord, ProvenanceTrace};
use crate::graph::stats::{self, GraphStats};
use crate::graph::tags;
use crate::graph::thing::{self, NewThing};
use crate::graph::txn::{self, Deadline};
use crate::graph::{Agent, ArtifactStatus, Entity, EntityKind, Note, ProvenanceRecord, Thing};

pub struct Notebook {
    conn: Connection,
    content: ContentStore,
    db_path: Option<PathBuf>,
    op_timeout: Option<Duration>,
    deadline: Deadline,
    prune_orphan_tags: bool,
}

impl Notebook {
    /// Open the database and content store named by `config`.
    pub fn open(config: &CuratorConfig) -> Result<Self> {
        let db_path = config.resolved_db_path();
        let conn = db::open_database(&db_path)?;
        let content = ContentStore::with_threshold(
            config.resolved_cache_dir(),
            config.storage.inline_threshold,
        );
        Ok(Self {
            conn,
            content,
            db_path: Some(db_path),
            op_timeout: config.graph.op_timeout(),
            deadline: Deadline::none(),
            prune_orphan_tags: config.graph.prune_orphan_tags,
        })
    }

    /// Open a database file with default settings and a content store at `cache_dir`.
    pub fn open_path(db_path: impl AsRef<Path>, cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let conn = db::open_database(&db_path)?;
        Ok(Self::from_parts(conn, ContentStore::new(cache_dir)).with_db_path(db_path))
    }

    /// In-memory graph, for tests and throwaway sessions.
    pub fn open_in_memory(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let conn = db::open_memory_database()?;
        Ok(Self::from_parts(conn, ContentStore::new(cache_dir)))
    }

    pub fn from_parts(conn: Connection, content: ContentStore) -> Self {
        Self {
            conn,
            content,
            db_path: None,
            op_timeout: None,
            deadline: Deadline::none(),
            prune_orphan_tags: true,
        }
    }

    fn with_db_path(mut self, path: PathBuf) -> Self {
        self.db_path = Some(path);
        self
    }

    /// Per-operation timeout applied on top of any explicit deadline.
    pub fn with_op_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Deadline for subsequent operations until changed. `Deadline::none()` clears it.
    pub fn set_deadline(&mut self, deadline: Deadline) {
        self.deadline = deadline;
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.content
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn effective_deadline(&self) -> Deadline {
        let per_op = self.op_timeout.map_or(Deadline::none(), Deadline::after);
        self.deadline.earliest(per_op)
    }

    /// Run several graph functions as one atomic write.
    pub fn write<T>(
        &mut self,
        operation: &str,
        op: impl FnOnce(&Transaction, &ContentStore) -> GraphResult<T>,
    ) -> GraphResult<T> {
        let deadline = self.effective_deadline();
        let content = &self.content;
        txn::write(&mut self.conn, deadline, operation, |tx| op(tx, content))
    }

    /// Run several graph functions against one snapshot.
    pub fn read<T>(
        &mut self,
        operation: &str,
        op: impl FnOnce(&Transaction, &ContentStore) -> GraphResult<T>,
    ) -> GraphResult<T> {
        let deadline = self.effective_deadline();
        let content = &self.content;
        txn::read(&mut self.conn, deadline, operation, |tx| op(tx, content))
    }

    // things

    pub fn create_thing(&mut self, new: &NewThing) -> GraphResult<String> {
        self.write("create_thing", |tx, _| thing::create_thing(tx, new))
    }

    pub fn update_thing_attributes(
        &mut self,
        id: &str,
        patch: &serde_json::Value,
    ) -> GraphResult<Thing> {
        self.write("update_thing_attributes", |tx, _| {
            thing::update_thing_attributes(tx, id, patch)
        })
    }

    pub fn set_thing_status(&mut self, id: &str, status: Option<&str>) -> GraphResult<()> {
        self.write("set_thing_status", |tx, _| thing::set_thing_status(tx, id, status))
    }

    // artifacts and fragments

    pub fn create_artifact(&mut self, new: &NewArtifact, content: &[u8]) -> GraphResult<String> {
        self.write("create_artifact", |tx, store| {
            artifact::create_artifact(tx, store, new, content)
        })
    }

    /// Returns `false` if the artifact was already analyzed.
    pub fn mark_analyzed(&mut self, id: &str) -> GraphResult<bool> {
        self.write("mark_analyzed", |tx, _| artifact::mark_analyzed(tx, id))
    }

    pub fn set_representation(&mut self, artifact_id: &str, thing_id: &str) -> GraphResult<()> {
        self.write("set_representation", |tx, _| {
            artifact::set_representation(tx, artifact_id, thing_id)
        })
    }

    pub fn read_artifact_content(&mut self, id: &str) -> GraphResult<Vec<u8>> {
        self.read("read_artifact_content", |tx, store| {
            artifact::read_artifact_content(tx, store, id)
        })
    }

    pub fn create_fragment(&mut self, artifact_id: &str, content: &str) -> GraphResult<String> {
        self.extract_fragment(&NewFragment::of(artifact_id, content))
    }

    /// Create a fragment with an explicit id, byte span or author.
    pub fn extract_fragment(&mut self, new: &NewFragment) -> GraphResult<String> {
        self.write("create_fragment", |tx, _| fragment::create_fragment(tx, new))
    }

    // notes

    pub fn create_note(&mut self, new: &NewNote) -> GraphResult<String> {
        self.write("create_note", |tx, _| note::create_note(tx, new))
    }

    pub fn append_note_content(&mut self, id: &str, text: &str) -> GraphResult<Note> {
        self.write("append_note_content", |tx, _| note::append_note_content(tx, id, text))
    }

    pub fn update_note(&mut self, id: &str, changes: &NoteUpdate) -> GraphResult<Note> {
        self.write("update_note", |tx, _| note::update_note(tx, id, changes))
    }

    pub fn retarget_note(&mut self, id: &str, subject_id: &str) -> GraphResult<()> {
        self.write("retarget_note", |tx, _| note::retarget_note(tx, id, subject_id))
    }

    // agents and recorded operations

    pub fn create_agent(&mut self, new: &NewAgent) -> GraphResult<String> {
        self.write("create_agent", |tx, _| agent::create_agent(tx, new))
    }

    pub fn get_agent(&mut self, id: &str) -> GraphResult<Agent> {
        self.read("get_agent", |tx, _| agent::get_agent(tx, id))
    }

    pub fn list_agents(&mut self) -> GraphResult<Vec<Agent>> {
        self.read("list_agents", |tx, _| agent::list_agents(tx))
    }

    pub fn record_provenance(&mut self, new: &NewProvenanceRecord) -> GraphResult<String> {
        self.write("record_provenance", |tx, _| provenance::record_provenance(tx, new))
    }

    /// Operations recorded as producing `id`, oldest first.
    pub fn provenance_records(&mut self, id: &str) -> GraphResult<Vec<ProvenanceRecord>> {
        self.read("provenance_records", |tx, _| provenance::provenance_records(tx, id))
    }

    // tags

    /// Returns `false` if the tag was already attached.
    pub fn tag(&mut self, entity_id: &str, label: &str) -> GraphResult<bool> {
        self.write("tag", |tx, _| tags::tag(tx, entity_id, label))
    }

    /// Returns `false` if the tag was not attached.
    pub fn untag(&mut self, entity_id: &str, label: &str) -> GraphResult<bool> {
        let prune = self.prune_orphan_tags;
        self.write("untag", |tx, _| {
            let removed = tags::untag(tx, entity_id, label)?;
            if removed && prune {
                tags::prune_orphan_tags(tx)?;
            }
            Ok(removed)
        })
    }

    // collections

    pub fn create_collection(&mut self, new: &NewCollection) -> GraphResult<String> {
        self.write("create_collection", |tx, _| collection::create_collection(tx, new))
    }

    pub fn add_member(&mut self, collection_id: &str, member_id: &str) -> GraphResult<bool> {
        self.write("add_member", |tx, _| {
            collection::add_member(tx, collection_id, member_id)
        })
    }

    pub fn remove_member(&mut self, collection_id: &str, member_id: &str) -> GraphResult<bool> {
        self.write("remove_member", |tx, _| {
            collection::remove_member(tx, collection_id, member_id)
        })
    }

    pub fn set_query(&mut self, collection_id: &str, query: &str) -> GraphResult<()> {
        self.write("set_query", |tx, _| collection::set_query(tx, collection_id, query))
    }

    pub fn resolve_members(&mut self, collection_id: &str) -> GraphResult<Vec<String>> {
        self.read("resolve_members", |tx, _| {
            collection::resolve_members(tx, collection_id)
        })
    }

    // deletion

    /// Delete any entity. Artifacts with fragments need `cascade`.
    pub fn delete(&mut self, id: &str, cascade: bool) -> GraphResult<DeleteResult> {
        let prune = self.prune_orphan_tags;
        self.write("delete", |tx, _| {
            let result = entity::delete(tx, id, cascade)?;
            if prune {
                tags::prune_orphan_tags(tx)?;
            }
            Ok(result)
        })
    }

    // reads

    pub fn get(&mut self, id: &str) -> GraphResult<Entity> {
        self.read("get", |tx, _| entity::get(tx, id))
    }

    pub fn exists(&mut self, id: &str) -> GraphResult<bool> {
        self.read("exists", |tx, _| entity::exists(tx, id))
    }

    pub fn list_ids(&mut self, kind: EntityKind) -> GraphResult<Vec<String>> {
        self.read("list_ids", |tx, _| entity::list_ids(tx, kind))
    }

    pub fn notes_about(&mut self, subject_id: &str) -> GraphResult<Vec<String>> {
        self.read("notes_about", |tx, _| provenance::notes_about(tx, subject_id))
    }

    pub fn provenance_chain(&mut self, id: &str) -> GraphResult<Vec<String>> {
        self.read("provenance_chain", |tx, _| provenance::provenance_chain(tx, id))
    }

    pub fn trace_provenance(&mut self, id: &str) -> GraphResult<ProvenanceTrace> {
        self.read("trace_provenance", |tx, _| provenance::trace(tx, id))
    }

    /// Notes left pointing at a deleted subject.
    pub fn tombstoned_notes(&mut self) -> GraphResult<Vec<String>> {
        self.read("tombstoned_notes", |tx, _| provenance::tombstoned_notes(tx))
    }

    pub fn collections_containing(&mut self, member_id: &str) -> GraphResult<Vec<String>> {
        self.read("collections_containing", |tx, _| {
            collection::collections_containing(tx, member_id)
        })
    }

    pub fn find_by_tag(&mut self, label: &str) -> GraphResult<BTreeSet<String>> {
        self.read("find_by_tag", |tx, _| index::find_by_tag(tx, label))
    }

    pub fn find_by_tag_kind(
        &mut self,
        label: &str,
        kind: Option<EntityKind>,
    ) -> GraphResult<BTreeSet<String>> {
        self.read("find_by_tag", |tx, _| index::find_by_tag_kind(tx, label, kind))
    }

    pub fn find_artifacts(&mut self, status: Option<ArtifactStatus>) -> GraphResult<BTreeSet<String>> {
        self.read("find_artifacts", |tx, _| index::find_artifacts(tx, status))
    }

    pub fn find_things(&mut self, thing_type: Option<&str>) -> GraphResult<BTreeSet<String>> {
        self.read("find_things", |tx, _| index::find_things(tx, thing_type))
    }

    pub fn list_tags(&mut self) -> GraphResult<Vec<TagCount>> {
        self.read("list_tags", |tx, _| index::list_tags(tx))
    }

    pub fn stats(&mut self) -> GraphResult<GraphStats> {
        let db_path = self.db_path.clone();
        self.read("stats", |tx, _| stats::graph_stats(tx, db_path.as_deref()))
    }
}
