use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::content::DEFAULT_INLINE_THRESHOLD;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CuratorConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub graph: GraphConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub cache_dir: String,
    /// Payloads at or above this many bytes always go to the content store.
    pub inline_threshold: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GraphConfig {
    /// Per-operation deadline applied when the caller does not supply one. 0 disables it.
    pub op_timeout_ms: u64,
    pub prune_orphan_tags: bool,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            graph: GraphConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = default_curator_dir();
        Self {
            db_path: dir.join("graph.db").to_string_lossy().into_owned(),
            cache_dir: dir.join("cache").to_string_lossy().into_owned(),
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            op_timeout_ms: 5000,
            prune_orphan_tags: true,
        }
    }
}

impl GraphConfig {
    pub fn op_timeout(&self) -> Option<Duration> {
        (self.op_timeout_ms > 0).then(|| Duration::from_millis(self.op_timeout_ms))
    }
}

/// Returns `~/.curator/`
pub fn default_curator_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".curator")
}

/// Returns the default config file path: `~/.curator/config.toml`
pub fn default_config_path() -> PathBuf {
    default_curator_dir().join("config.toml")
}

impl CuratorConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            CuratorConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (CURATOR_DB, CURATOR_CACHE_DIR, CURATOR_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CURATOR_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("CURATOR_CACHE_DIR") {
            self.storage.cache_dir = val;
        }
        if let Ok(val) = std::env::var("CURATOR_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the content store root, expanding `~` if needed.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.cache_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
