//! Tracker configuration.
//!
//! Configuration is optional: `.taskward/config.toml` may override status
//! directory names, add scan roots, switch on date-prefixed numbering, or
//! point at a custom document template. A missing file means defaults;
//! unknown fields in a present file are rejected rather than silently
//! ignored.

use crate::record::Status;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding the tracker's own state (index, counter, event logs).
pub const STATE_DIR: &str = ".taskward";
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("TOML parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusDirNames {
    pub active: String,
    pub completed: String,
    pub archived: String,
    pub paused: String,
}

impl Default for StatusDirNames {
    fn default() -> Self {
        StatusDirNames {
            active: "active".to_string(),
            completed: "completed".to_string(),
            archived: "archived".to_string(),
            paused: "paused".to_string(),
        }
    }
}

impl StatusDirNames {
    pub fn dir_for(&self, status: Status) -> &str {
        match status {
            Status::Active => &self.active,
            Status::Completed => &self.completed,
            Status::Archived => &self.archived,
            Status::Paused => &self.paused,
            Status::Unknown => "unknown",
        }
    }

    /// Map a directory name back to a status, if it is one of the four
    /// configured status directories.
    pub fn status_for(&self, dir_name: &str) -> Option<Status> {
        Status::REAL
            .into_iter()
            .find(|s| self.dir_for(*s) == dir_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub status_dirs: StatusDirNames,
    /// Extra directories to scan during indexing, relative to the tracker
    /// root unless absolute.
    pub scan_roots: Vec<PathBuf>,
    /// Prefix sequential numbers with `YYYYMMDD`.
    pub date_prefix: bool,
    /// Document template override, relative to the tracker root unless
    /// absolute.
    pub template: Option<PathBuf>,
}

impl Config {
    pub fn load(root: &Path) -> Result<Config, ConfigError> {
        let path = root.join(STATE_DIR).join(CONFIG_FILENAME);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(ConfigError::PermissionDenied(path));
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Resolve a configured path against the tracker root.
    pub fn resolve(&self, root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}
