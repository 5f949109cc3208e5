//! The persisted work-effort index.
//!
//! The index is a JSON object keyed by status, each bucket keyed by filename,
//! each entry carrying the document's metadata and its current path. It is a
//! derived cache of on-disk state: readers treat a missing or unparsable
//! index as "empty, rebuild" and never as an error. Nested `BTreeMap`s keep
//! serialization key-sorted, so re-indexing an unchanged tree produces
//! byte-identical output.

use crate::lock::{FileLock, LockError, lock_path_for};
use crate::record::{IndexMetadata, WorkEffortRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const INDEX_FILENAME: &str = "index.json";

#[derive(Debug, thiserror::Error)]
pub enum IndexFileError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub metadata: IndexMetadata,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Index {
    #[serde(flatten)]
    pub statuses: BTreeMap<String, BTreeMap<String, IndexEntry>>,
}

impl Index {
    /// Load the index from `path`. `Ok(None)` means missing or corrupt —
    /// the caller is expected to rebuild. Only environmental failures
    /// (permissions) surface as errors.
    pub fn load(path: &Path) -> Result<Option<Index>, IndexFileError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(IndexFileError::PermissionDenied(path.to_path_buf()));
            }
            Err(e) => return Err(IndexFileError::Io(e)),
        };

        match serde_json::from_str(&content) {
            Ok(index) => Ok(Some(index)),
            Err(e) => {
                warn!("Index {} is unparsable, will rebuild: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Save the index atomically under its advisory lock.
    pub fn save(&self, path: &Path) -> Result<(), IndexFileError> {
        let _lock = FileLock::acquire(&lock_path_for(path))?;

        let parent = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| classify(e, parent))?;

        let content = serde_json::to_string_pretty(self)?;

        let mut temp_file =
            tempfile::NamedTempFile::new_in(parent).map_err(|e| classify(e, parent))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| classify(e, path))?;
        temp_file.as_file().sync_all().map_err(IndexFileError::Io)?;
        temp_file.persist(path).map_err(|e| classify(e.error, path))?;

        Ok(())
    }

    pub fn insert(&mut self, status: &str, filename: String, entry: IndexEntry) {
        self.statuses
            .entry(status.to_string())
            .or_default()
            .insert(filename, entry);
    }

    /// Remove one entry, pruning the bucket if it empties.
    pub fn remove(&mut self, status: &str, filename: &str) -> Option<IndexEntry> {
        let bucket = self.statuses.get_mut(status)?;
        let removed = bucket.remove(filename);
        if bucket.is_empty() {
            self.statuses.remove(status);
        }
        removed
    }

    /// Drop every entry whose path matches, across all buckets.
    pub fn remove_path(&mut self, path: &Path) {
        for bucket in self.statuses.values_mut() {
            bucket.retain(|_, entry| entry.path != path);
        }
        self.statuses.retain(|_, bucket| !bucket.is_empty());
    }

    pub fn get(&self, status: &str, filename: &str) -> Option<&IndexEntry> {
        self.statuses.get(status)?.get(filename)
    }

    /// Find an entry by filename across all buckets, returning its status
    /// bucket key as well. Buckets are visited in key order, so the result
    /// is deterministic when the same filename exists in several statuses.
    pub fn find_filename(&self, filename: &str) -> Option<(&str, &IndexEntry)> {
        self.statuses.iter().find_map(|(status, bucket)| {
            bucket.get(filename).map(|entry| (status.as_str(), entry))
        })
    }

    // Convenience accessors, currently only exercised from tests.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.statuses.values().map(BTreeMap::len).sum()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed view of every entry.
    pub fn records(&self) -> Vec<WorkEffortRecord> {
        self.statuses
            .values()
            .flat_map(BTreeMap::values)
            .map(|entry| WorkEffortRecord::from_metadata(&entry.metadata, entry.path.clone()))
            .collect()
    }
}

fn classify(e: std::io::Error, path: &Path) -> IndexFileError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        IndexFileError::PermissionDenied(path.to_path_buf())
    } else {
        IndexFileError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;
    use std::fs;
    use tempfile::TempDir;

    fn entry(title: &str, path: &str) -> IndexEntry {
        IndexEntry {
            metadata: IndexMetadata {
                id: format!("0001_{}", title),
                title: title.to_string(),
                status: "active".to_string(),
                priority: "medium".to_string(),
                assignee: "unassigned".to_string(),
                created: "2025-06-01 09:00".to_string(),
                last_updated: "2025-06-01 09:00".to_string(),
                due_date: "None".to_string(),
                tags: vec![],
                extra: Map::new(),
            },
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn round_trips_through_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(INDEX_FILENAME);

        let mut index = Index::default();
        index.insert("active", "0001_a.md".to_string(), entry("a", "/w/active/0001_a.md"));
        index.insert(
            "completed",
            "0002_b.md".to_string(),
            entry("b", "/w/completed/0002_b.md"),
        );

        index.save(&path).unwrap();
        let loaded = Index::load(&path).unwrap().unwrap();

        assert_eq!(loaded, index);
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn json_shape_is_status_filename_entry() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(INDEX_FILENAME);

        let mut index = Index::default();
        index.insert("active", "0001_a.md".to_string(), entry("a", "/w/active/0001_a.md"));
        index.save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value["active"]["0001_a.md"]["metadata"]["title"].is_string());
        assert!(value["active"]["0001_a.md"]["path"].is_string());
    }

    #[test]
    fn missing_index_is_none_not_error() {
        let temp = TempDir::new().unwrap();
        let loaded = Index::load(&temp.path().join(INDEX_FILENAME)).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn corrupt_index_is_none_not_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(INDEX_FILENAME);
        fs::write(&path, "{ this is not json").unwrap();

        let loaded = Index::load(&path).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn serialization_is_stable() {
        let mut index = Index::default();
        index.insert("active", "0002_b.md".to_string(), entry("b", "/w/active/0002_b.md"));
        index.insert("active", "0001_a.md".to_string(), entry("a", "/w/active/0001_a.md"));

        let first = serde_json::to_string_pretty(&index).unwrap();
        let second = serde_json::to_string_pretty(&index).unwrap();
        assert_eq!(first, second);

        // Keys come out sorted regardless of insertion order.
        let a_pos = first.find("0001_a.md").unwrap();
        let b_pos = first.find("0002_b.md").unwrap();
        assert!(a_pos < b_pos);
    }

    #[test]
    fn remove_prunes_empty_buckets() {
        let mut index = Index::default();
        index.insert("active", "0001_a.md".to_string(), entry("a", "/w/active/0001_a.md"));

        assert!(index.remove("active", "0001_a.md").is_some());
        assert!(index.statuses.is_empty());
        assert!(index.remove("active", "0001_a.md").is_none());
    }

    #[test]
    fn remove_path_drops_entries_everywhere() {
        let mut index = Index::default();
        index.insert("active", "0001_a.md".to_string(), entry("a", "/w/active/0001_a.md"));
        index.insert("paused", "0001_a.md".to_string(), entry("a", "/w/active/0001_a.md"));

        index.remove_path(Path::new("/w/active/0001_a.md"));
        assert!(index.is_empty());
    }

    #[test]
    fn identical_filenames_in_different_statuses_are_distinct() {
        let mut index = Index::default();
        index.insert("active", "0001_a.md".to_string(), entry("a", "/w/active/0001_a.md"));
        index.insert(
            "archived",
            "0001_a.md".to_string(),
            entry("a", "/w/archived/0001_a.md"),
        );

        assert_eq!(index.len(), 2);
        let (status, found) = index.find_filename("0001_a.md").unwrap();
        // Buckets are visited in key order.
        assert_eq!(status, "active");
        assert_eq!(found.path, PathBuf::from("/w/active/0001_a.md"));
    }
}
