//! Research notebook graph: artifacts, fragments, notes, things and collections
//! with provenance, backed by SQLite and a content-addressed payload store.
//!
//! Raw content is captured as immutable **artifacts**; passages extracted from
//! them become **fragments**; **notes** annotate any entity, including other
//! notes; **things** are the domain items under study; **collections** group
//! entities either by explicit membership or by a stored logical query.
//!
//! | Kind | Links to | Deleting it |
//! |------|----------|-------------|
//! | **Thing** | n/a | clears `represents` on artifacts |
//! | **Artifact** | optional represented thing | needs cascade if it has fragments |
//! | **Fragment** | its artifact | only via its artifact |
//! | **Note** | exactly one subject | tombstones notes about it |
//! | **Collection** | members (extensional) or a query (intensional) | removes the grouping only |
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) holds the graph; payloads at or above the inline
//!   threshold live under `sha256/<hh>/<digest>` in the content store
//! - **Atomicity**: every write is one IMMEDIATE transaction bounded by a deadline
//! - **Surfaces**: a CLI and an MCP server over stdio
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`content`]: content-addressed payload store and MIME detection
//! - [`db`]: SQLite initialization, schema, migrations and health checks
//! - [`error`]: the typed error taxonomy
//! - [`graph`]: entity operations, collections, queries and provenance
//! - [`notebook`]: the transactional facade used by the CLI and the server

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod graph;
pub mod notebook;
