#![allow(dead_code)]

use curator::graph::artifact::NewArtifact;
use curator::notebook::Notebook;
use std::path::PathBuf;
use tempfile::TempDir;

/// In-memory graph with a content store under a fresh temp dir.
/// Keep the `TempDir` alive for as long as the notebook is used.
pub fn test_notebook() -> (Notebook, TempDir) {
    let tmp = TempDir::new().unwrap();
    let nb = Notebook::open_in_memory(tmp.path().join("cache")).unwrap();
    (nb, tmp)
}

/// File-backed graph paths inside `tmp`: (database, cache dir).
pub fn file_paths(tmp: &TempDir) -> (PathBuf, PathBuf) {
    (tmp.path().join("graph.db"), tmp.path().join("cache"))
}

pub fn file_notebook(tmp: &TempDir) -> Notebook {
    let (db, cache) = file_paths(tmp);
    Notebook::open_path(db, cache).unwrap()
}

/// Capture `bytes` as an artifact from a fixed test URI. Returns the artifact ID.
pub fn ingest(nb: &mut Notebook, uri: &str, bytes: &[u8]) -> String {
    nb.create_artifact(&NewArtifact::from_uri(uri), bytes).unwrap()
}

/// Bytes large enough to always go to the content store.
pub fn large_payload(fill: u8) -> Vec<u8> {
    vec![fill; curator::content::DEFAULT_INLINE_THRESHOLD + 1]
}
