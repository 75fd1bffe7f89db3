//! Studio configuration: TOML file plus environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Overrides [`StudioConfig::preview_rows`].
pub const ENV_PREVIEW_ROWS: &str = "TABSTUDIO_PREVIEW_ROWS";
/// Overrides [`StudioConfig::storage_path`].
pub const ENV_STORAGE_PATH: &str = "TABSTUDIO_STORAGE_PATH";

/// Failures of [`StudioConfig::load`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for this config.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },
}

/// Runtime settings. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Rows returned by a preview.
    pub preview_rows: usize,
    /// Pending commands per session before callers wait.
    pub command_queue_bound: usize,
    /// Broadcast buffer per session.
    pub event_capacity: usize,
    /// SQLite file for sessions; in memory when unset.
    pub storage_path: Option<PathBuf>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            preview_rows: 5,
            command_queue_bound: 64,
            event_capacity: 256,
            storage_path: None,
        }
    }
}

impl StudioConfig {
    /// Reads `path` and applies environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Like [`StudioConfig::load`], falling back to defaults when the file is
    /// missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => tracing::warn!("config load failed, using defaults: {e}"),
            }
        }
        let mut cfg = Self::default();
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg
    }

    /// Applies overrides from `lookup`; unusable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_PREVIEW_ROWS) {
            match raw.trim().parse::<usize>() {
                Ok(rows) => self.preview_rows = rows,
                Err(e) => tracing::warn!(value = %raw, "ignoring {ENV_PREVIEW_ROWS}: {e}"),
            }
        }
        if let Some(raw) = lookup(ENV_STORAGE_PATH) {
            if raw.trim().is_empty() {
                tracing::warn!("ignoring empty {ENV_STORAGE_PATH}");
            } else {
                self.storage_path = Some(PathBuf::from(raw));
            }
        }
    }
}
