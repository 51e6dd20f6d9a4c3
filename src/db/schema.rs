//! SQL DDL for all graph tables.
//!
//! `entities` is the registry every typed table hangs off: it owns the global id,
//! the kind and the timestamps, and is what tags and collection memberships
//! reference. Deleting a registry row cascades to the typed row, its tag links
//! and its memberships. Agents and their recorded operations live beside the
//! registry. All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

use super::migrations::{CONTENT_HASH_ALGORITHM, CURRENT_SCHEMA_VERSION};

const SCHEMA_SQL: &str = r#"
-- Global id registry
CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK(kind IN ('thing','artifact','fragment','note','collection')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind);

CREATE TABLE IF NOT EXISTS things (
    id TEXT PRIMARY KEY REFERENCES entities(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    thing_type TEXT,
    status TEXT,
    attributes TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_things_type ON things(thing_type);

-- Artifact bodies are immutable: either inline_content or cache_path is set, never both.
CREATE TABLE IF NOT EXISTS artifacts (
    id TEXT PRIMARY KEY REFERENCES entities(id) ON DELETE CASCADE,
    source_uri TEXT NOT NULL,
    retrieved_at TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    size INTEGER NOT NULL,
    inline_content BLOB,
    cache_path TEXT,
    status TEXT NOT NULL DEFAULT 'raw' CHECK(status IN ('raw','analyzed')),
    represents TEXT REFERENCES things(id) ON DELETE SET NULL,
    CHECK((inline_content IS NULL) <> (cache_path IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_artifacts_status ON artifacts(status);
CREATE INDEX IF NOT EXISTS idx_artifacts_hash ON artifacts(content_hash);
CREATE INDEX IF NOT EXISTS idx_artifacts_represents ON artifacts(represents);

-- Agents author notes and fragments; they are not registry entities and are never deleted.
CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    agent_type TEXT NOT NULL CHECK(agent_type IN ('human','llm','automated')),
    model_name TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS fragments (
    id TEXT PRIMARY KEY REFERENCES entities(id) ON DELETE CASCADE,
    artifact_id TEXT NOT NULL REFERENCES artifacts(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    start_offset INTEGER CHECK(start_offset IS NULL OR start_offset >= 0),
    length INTEGER CHECK(length IS NULL OR length >= 0),
    author_id TEXT REFERENCES agents(id)
);

CREATE INDEX IF NOT EXISTS idx_fragments_artifact ON fragments(artifact_id);

-- subject_id is kept after the subject is deleted; subject_live = 0 marks the tombstone.
CREATE TABLE IF NOT EXISTS notes (
    id TEXT PRIMARY KEY REFERENCES entities(id) ON DELETE CASCADE,
    name TEXT,
    content TEXT NOT NULL,
    confidence REAL CHECK(confidence IS NULL OR (confidence >= 0.0 AND confidence <= 1.0)),
    subject_id TEXT NOT NULL,
    subject_live INTEGER NOT NULL DEFAULT 1 CHECK(subject_live IN (0, 1)),
    author_id TEXT REFERENCES agents(id)
);

CREATE INDEX IF NOT EXISTS idx_notes_subject ON notes(subject_id);

-- Recorded operations. produced_id and source_id carry no FK: records outlive what they describe.
CREATE TABLE IF NOT EXISTS provenance_records (
    id TEXT PRIMARY KEY,
    produced_id TEXT NOT NULL,
    agent_id TEXT NOT NULL REFERENCES agents(id),
    operation_type TEXT NOT NULL,
    parameters TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_provenance_produced ON provenance_records(produced_id);

CREATE TABLE IF NOT EXISTS provenance_sources (
    record_id TEXT NOT NULL REFERENCES provenance_records(id) ON DELETE CASCADE,
    source_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (record_id, source_id)
);

CREATE INDEX IF NOT EXISTS idx_provenance_source ON provenance_sources(source_id);

CREATE TABLE IF NOT EXISTS collections (
    id TEXT PRIMARY KEY REFERENCES entities(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    mode TEXT NOT NULL CHECK(mode IN ('extensional','intensional')),
    logical_query TEXT,
    CHECK((mode = 'intensional') = (logical_query IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS collection_members (
    collection_id TEXT NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    member_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    PRIMARY KEY (collection_id, member_id)
);

CREATE INDEX IF NOT EXISTS idx_members_member ON collection_members(member_id);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS entity_tags (
    entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (entity_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_entity_tags_tag ON entity_tags(tag_id);

-- Audit log (no FK: entries outlive the entities they describe)
CREATE TABLE IF NOT EXISTS graph_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL CHECK(operation IN ('create','update','status','tag','untag','member_add','member_remove','query','tombstone','delete','agent','provenance')),
    entity_id TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_graph_log_entity ON graph_log(entity_id);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('content_hash_algorithm', ?1)",
        [CONTENT_HASH_ALGORITHM],
    )?;

    Ok(())
}
