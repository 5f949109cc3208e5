//! Work-effort candidate discovery.
//!
//! The scanner walks a directory tree and decides which markdown files look
//! like work efforts. Classification, cheapest check first:
//!
//! 1. filename patterns: sequential (`0001_*.md`), legacy timestamp
//!    (`202501021530_*.md`), or a looser keyword match;
//! 2. containment: any `.md` file inside a known work-effort container
//!    directory is a candidate regardless of name;
//! 3. content sniffing (aggressive mode only): remaining `.md` files are
//!    opened and checked for frontmatter or work-effort markers.
//!
//! When filename pattern and content sniff disagree, the filename pattern
//! wins; the sniff only ever runs on files the cheaper checks rejected.
//!
//! A permission error on a subtree logs a warning and skips that subtree; an
//! unreadable file is skipped. Neither aborts the scan.

use crate::config::StatusDirNames;
use crate::record::Status;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Scan root not found: {0}")]
    RootNotFound(PathBuf),
}

/// A file the scanner considers a work effort.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    /// Status implied by the nearest ancestor status directory, if any.
    pub ancestor_status: Option<Status>,
    pub mtime: SystemTime,
}

/// Directory names never descended into, beyond hidden directories.
const SKIPPED_DIRS: [&str; 8] = [
    "node_modules",
    "target",
    "venv",
    "env",
    "__pycache__",
    "site-packages",
    "dist",
    "build",
];

/// Directory-name fragments marking a work-effort container.
const CONTAINER_FRAGMENTS: [&str; 3] = ["work_effort", "work-effort", "work efforts"];

pub struct Scanner<'a> {
    dirs: &'a StatusDirNames,
}

impl<'a> Scanner<'a> {
    pub fn new(dirs: &'a StatusDirNames) -> Scanner<'a> {
        Scanner { dirs }
    }

    /// Walk `root` and collect candidates. Fails only when the root itself
    /// is unusable; everything below it degrades to warnings.
    pub fn scan(&self, root: &Path, aggressive: bool) -> Result<Vec<Candidate>, ScanError> {
        if !root.exists() {
            return Err(ScanError::RootNotFound(root.to_path_buf()));
        }

        let mut candidates = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir_entry(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Permission problems and racing deletions land here.
                    warn!("Skipping unreadable entry during scan: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let in_container = self.has_container_ancestor(path, root);
            let matched = filename_is_candidate(name)
                || in_container
                || (aggressive && self.sniff(path));
            if !matched {
                continue;
            }

            let mtime = match std::fs::metadata(path).and_then(|m| m.modified()) {
                Ok(mtime) => mtime,
                Err(e) => {
                    warn!("Skipping {}: cannot read metadata: {}", path.display(), e);
                    continue;
                }
            };

            candidates.push(Candidate {
                path: path.to_path_buf(),
                ancestor_status: self.nearest_status_ancestor(path, root),
                mtime,
            });
        }

        debug!(
            "Scan of {} found {} candidate(s)",
            root.display(),
            candidates.len()
        );
        Ok(candidates)
    }

    /// True when `name` marks a work-effort container: a status directory or
    /// a directory named after work efforts.
    pub fn is_container_dir(&self, name: &str) -> bool {
        if self.dirs.status_for(name).is_some() {
            return true;
        }
        let lower = name.to_ascii_lowercase();
        CONTAINER_FRAGMENTS.iter().any(|f| lower.contains(f))
    }

    fn has_container_ancestor(&self, path: &Path, root: &Path) -> bool {
        self.ancestor_names(path, root)
            .any(|name| self.is_container_dir(&name))
    }

    fn nearest_status_ancestor(&self, path: &Path, root: &Path) -> Option<Status> {
        self.ancestor_names(path, root)
            .find_map(|name| self.dirs.status_for(&name))
    }

    /// Directory names from the file's parent up to and including the scan
    /// root itself.
    fn ancestor_names<'p>(
        &self,
        path: &'p Path,
        root: &'p Path,
    ) -> impl Iterator<Item = String> + 'p {
        let root = root.to_path_buf();
        path.ancestors()
            .skip(1)
            .take_while(move |a| a.starts_with(&root))
            .filter_map(|a| a.file_name().map(|n| n.to_string_lossy().into_owned()))
    }

    fn sniff(&self, path: &Path) -> bool {
        match std::fs::read_to_string(path) {
            Ok(content) => content_looks_like_work_effort(&content),
            Err(e) => {
                warn!("Skipping content sniff of {}: {}", path.display(), e);
                false
            }
        }
    }
}

/// Filename heuristics: sequential number, legacy timestamp, or keyword.
pub fn filename_is_candidate(name: &str) -> bool {
    let patterns = [
        r"^\d{1,5}_.*\.md$",
        r"^\d{12}_.*\.md$",
        r"(?i)(work[-_ ]?effort|task|feature|issue|story).*\.md$",
    ];
    patterns
        .iter()
        .any(|p| Regex::new(p).map(|re| re.is_match(name)).unwrap_or(false))
}

/// Content indicators: frontmatter delimiter, status/priority fields, or the
/// standard section headers.
pub fn content_looks_like_work_effort(content: &str) -> bool {
    if content.starts_with("---") {
        return true;
    }
    let indicators = [
        r"(?m)^\s*status:\s*\S",
        r"(?m)^\s*priority:\s*\S",
        r"(?m)^## (Objectives|Tasks|Linked Items|Timeline & Progress)\s*$",
    ];
    indicators
        .iter()
        .any(|p| Regex::new(p).map(|re| re.is_match(content)).unwrap_or(false))
}

pub fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

fn is_skipped_dir_entry(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(is_skipped_dir)
            .unwrap_or(false)
}
