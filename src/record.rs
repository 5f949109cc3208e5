//! Typed work-effort model.
//!
//! Parsed documents cross module boundaries as [`IndexMetadata`] (the
//! stringly on-disk view persisted in the index) or [`WorkEffortRecord`] (the
//! typed view handed to callers). Nothing in the tracker passes loose
//! key/value maps around.

use crate::frontmatter::Document;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_ASSIGNEE: &str = "unassigned";
pub const NO_DUE_DATE: &str = "None";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Completed,
    Archived,
    Paused,
    /// Indexer-only fallback for documents whose status cannot be determined
    /// from metadata or an ancestor status directory. The store and the
    /// transition engine never produce or accept it.
    Unknown,
}

impl Status {
    /// The four statuses a work effort can actually hold.
    pub const REAL: [Status; 4] = [
        Status::Active,
        Status::Completed,
        Status::Archived,
        Status::Paused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Completed => "completed",
            Status::Archived => "archived",
            Status::Paused => "paused",
            Status::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Status> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Status::Active),
            "completed" => Some(Status::Completed),
            "archived" => Some(Status::Archived),
            "paused" => Some(Status::Paused),
            "unknown" => Some(Status::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Priority> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "critical" => Some(Priority::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frontmatter metadata as stored in the index: well-known fields plus any
/// unknown keys preserved verbatim. Values are kept as raw strings; malformed
/// dates and off-enum statuses are a caller concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub id: String,
    pub title: String,
    pub status: String,
    pub priority: String,
    pub assignee: String,
    pub created: String,
    pub last_updated: String,
    pub due_date: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, String>,
}

/// Keys lifted into named `IndexMetadata` fields. The parser also guarantees
/// `created_at`/`updated_at`, which alias `created`/`last_updated` here.
const CONSUMED_KEYS: [&str; 12] = [
    "id",
    "title",
    "status",
    "priority",
    "assignee",
    "created",
    "created_at",
    "last_updated",
    "updated_at",
    "due_date",
    "due",
    "tags",
];

impl IndexMetadata {
    pub fn from_document(doc: &Document) -> IndexMetadata {
        let field = |keys: &[&str], default: &str| -> String {
            keys.iter()
                .find_map(|k| doc.fields.get(*k))
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let extra = doc
            .fields
            .iter()
            .filter(|(k, _)| !CONSUMED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        IndexMetadata {
            id: field(&["id"], ""),
            title: field(&["title"], "Untitled"),
            status: field(&["status"], "active"),
            priority: field(&["priority"], "medium"),
            assignee: field(&["assignee"], DEFAULT_ASSIGNEE),
            created: field(&["created", "created_at"], ""),
            last_updated: field(&["last_updated", "updated_at"], ""),
            due_date: field(&["due_date", "due"], NO_DUE_DATE),
            tags: doc.tags.clone(),
            extra,
        }
    }
}

/// The typed view of a single work effort. `path` is derived state; the
/// authoritative location is always status directory plus filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkEffortRecord {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub priority: Priority,
    pub assignee: String,
    pub created: String,
    pub last_updated: String,
    pub due_date: String,
    pub tags: Vec<String>,
    pub extra: BTreeMap<String, String>,
    pub path: PathBuf,
}

impl WorkEffortRecord {
    pub fn from_metadata(meta: &IndexMetadata, path: PathBuf) -> WorkEffortRecord {
        WorkEffortRecord {
            id: meta.id.clone(),
            title: meta.title.clone(),
            status: Status::parse(&meta.status).unwrap_or(Status::Unknown),
            priority: Priority::parse(&meta.priority).unwrap_or(Priority::Medium),
            assignee: meta.assignee.clone(),
            created: meta.created.clone(),
            last_updated: meta.last_updated.clone(),
            due_date: meta.due_date.clone(),
            tags: meta.tags.clone(),
            extra: meta.extra.clone(),
            path,
        }
    }

    /// Filename without the `.md` extension, usable as a lookup key.
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
