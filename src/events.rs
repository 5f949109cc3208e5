//! Per-work-effort event logs.
//!
//! Every work effort gets a small JSON event log under
//! `.taskward/events/<id>.json`: one creation event plus one entry per status
//! change. The log is advisory history — a missing or unparsable log degrades
//! to an empty list, and the tracer synthesizes a creation event from
//! frontmatter in that case.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const EVENTS_DIR: &str = "events";

#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    StatusChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffortEvent {
    pub kind: EventKind,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl EffortEvent {
    pub fn created(timestamp: &str) -> EffortEvent {
        EffortEvent {
            kind: EventKind::Created,
            timestamp: timestamp.to_string(),
            from: None,
            to: Some("active".to_string()),
        }
    }

    pub fn status_changed(timestamp: &str, from: &str, to: &str) -> EffortEvent {
        EffortEvent {
            kind: EventKind::StatusChanged,
            timestamp: timestamp.to_string(),
            from: Some(from.to_string()),
            to: Some(to.to_string()),
        }
    }
}

fn log_path(state_dir: &Path, id: &str) -> PathBuf {
    // Ids are generated filesystem-safe, but documents from elsewhere may
    // carry anything.
    let safe: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            c
        } else {
            '_'
        })
        .collect();
    state_dir.join(EVENTS_DIR).join(format!("{}.json", safe))
}

/// Append one event, creating the log as needed.
pub fn append(state_dir: &Path, id: &str, event: EffortEvent) -> Result<(), EventLogError> {
    let path = log_path(state_dir, id);
    let mut events = load(state_dir, id);
    events.push(event);

    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| classify(e, parent))?;

    let content = serde_json::to_string_pretty(&events)?;
    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(|e| classify(e, parent))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| classify(e, &path))?;
    temp_file.persist(&path).map_err(|e| classify(e.error, &path))?;

    Ok(())
}

/// Load a work effort's events. Missing or unparsable logs are empty.
pub fn load(state_dir: &Path, id: &str) -> Vec<EffortEvent> {
    let path = log_path(state_dir, id);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Failed to read event log {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(events) => events,
        Err(e) => {
            warn!("Event log {} is unparsable: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn classify(e: std::io::Error, path: &Path) -> EventLogError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        EventLogError::PermissionDenied(path.to_path_buf())
    } else {
        EventLogError::Io(e)
    }
}
