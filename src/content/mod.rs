//! Content-addressed payload store for artifact bodies.
//!
//! Payloads are keyed by their SHA-256 digest and laid out as
//! `<root>/sha256/<first two hex>/<digest>`. A payload is written once and never
//! updated in place. Publication goes through a uniquely named temp file that is
//! hard-linked into place, so two concurrent `put`s of identical bytes race on an
//! atomic create-if-absent and the loser simply observes the winner's copy.

pub mod mime;

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use crate::error::{GraphError, GraphResult};

/// Payloads smaller than this (50 KB) may stay inline in the graph record.
pub const DEFAULT_INLINE_THRESHOLD: usize = 50 * 1024;

const HASH_DIR: &str = "sha256";

/// Reference returned from [`ContentStore::put`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredContent {
    /// Lowercase hex SHA-256 of the payload.
    pub hash: String,
    /// Path relative to the store root; stable for the payload's lifetime.
    pub path: String,
    pub size: u64,
    /// `true` if the payload was already present and nothing was written.
    pub deduplicated: bool,
}

#[derive(Debug, Serialize)]
pub struct ContentStats {
    pub root: String,
    pub total_files: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
    inline_threshold: usize,
}

/// Lowercase hex SHA-256 digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_threshold(root, DEFAULT_INLINE_THRESHOLD)
    }

    pub fn with_threshold(root: impl Into<PathBuf>, inline_threshold: usize) -> Self {
        Self {
            root: root.into(),
            inline_threshold,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inline_threshold(&self) -> usize {
        self.inline_threshold
    }

    /// Whether a payload of `size` bytes is small enough to keep inline.
    pub fn inline_eligible(&self, size: usize) -> bool {
        size < self.inline_threshold
    }

    /// Store `bytes`, returning the existing reference if the digest is already present.
    ///
    /// `mime_type` is only used for logging; identical bytes share one physical
    /// copy regardless of how callers label them.
    pub fn put(&self, bytes: &[u8], mime_type: &str) -> GraphResult<StoredContent> {
        let hash = content_hash(bytes);
        let rel = relative_path(&hash);
        let full = self.root.join(&rel);
        let size = bytes.len() as u64;

        if full.is_file() {
            tracing::debug!(hash = %hash, "content already stored");
            return Ok(StoredContent {
                hash,
                path: rel,
                size,
                deduplicated: true,
            });
        }

        let dir = full
            .parent()
            .ok_or_else(|| GraphError::invalid(format!("bad content path {rel}")))?;
        fs::create_dir_all(dir)?;

        let tmp = dir.join(format!(".{hash}.{}.tmp", uuid::Uuid::now_v7().simple()));
        {
            let mut file = File::create_new(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }

        let published = fs::hard_link(&tmp, &full);
        if let Err(e) = fs::remove_file(&tmp) {
            tracing::warn!(path = %tmp.display(), error = %e, "failed to remove temp payload");
        }

        let deduplicated = match published {
            Ok(()) => false,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => true,
            Err(e) => return Err(e.into()),
        };

        tracing::info!(hash = %hash, size, mime_type, deduplicated, "content stored");
        Ok(StoredContent {
            hash,
            path: rel,
            size,
            deduplicated,
        })
    }

    /// Read a payload back by its store-relative path.
    pub fn get(&self, path: &str) -> GraphResult<Vec<u8>> {
        let full = self.resolve(path)?;
        fs::read(&full).map_err(|e| match e.kind() {
            ErrorKind::NotFound => GraphError::not_found("content", path),
            _ => GraphError::Io(e),
        })
    }

    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Recompute the digest of a stored payload and compare with `expected_hash`.
    pub fn verify(&self, path: &str, expected_hash: &str) -> GraphResult<bool> {
        let bytes = self.get(path)?;
        Ok(content_hash(&bytes) == expected_hash)
    }

    /// Count stored payloads and their total size.
    pub fn stats(&self) -> GraphResult<ContentStats> {
        let mut stats = ContentStats {
            root: self.root.display().to_string(),
            total_files: 0,
            total_bytes: 0,
        };

        let hash_root = self.root.join(HASH_DIR);
        if !hash_root.is_dir() {
            return Ok(stats);
        }

        for shard in fs::read_dir(&hash_root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                let name = entry.file_name();
                if name.to_string_lossy().starts_with('.') {
                    continue;
                }
                let meta = entry.metadata()?;
                if meta.is_file() {
                    stats.total_files += 1;
                    stats.total_bytes += meta.len();
                }
            }
        }

        Ok(stats)
    }

    /// Only store-relative paths without `..` or root components are accepted.
    fn resolve(&self, path: &str) -> GraphResult<PathBuf> {
        let candidate = Path::new(path);
        let clean = candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !clean {
            return Err(GraphError::not_found("content", path));
        }
        Ok(self.root.join(candidate))
    }
}

fn relative_path(hash: &str) -> String {
    format!("{HASH_DIR}/{}/{hash}", &hash[..2])
}

/// Human-readable byte size (`1.5 MB`).
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}
