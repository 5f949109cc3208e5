//! The indexer: scan configured directories and rebuild the JSON index.
//!
//! The index is always a derived cache. `index_all` rescans and rewrites it
//! wholesale; `index_one` upserts a single document; `load_or_rebuild` is the
//! read path every consumer goes through — a missing or corrupt index file
//! triggers a full rescan instead of an error.

use crate::config::{Config, STATE_DIR};
use crate::frontmatter;
use crate::index_file::{Index, IndexEntry, IndexFileError, INDEX_FILENAME};
use crate::record::{IndexMetadata, Status, WorkEffortRecord};
use crate::scan::{Candidate, ScanError, Scanner};
use crate::timefmt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Index file error: {0}")]
    IndexFile(#[from] IndexFileError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub struct Indexer {
    root: PathBuf,
    config: Config,
}

impl Indexer {
    pub fn new(root: &Path, config: Config) -> Indexer {
        Indexer {
            root: root.to_path_buf(),
            config,
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(STATE_DIR).join(INDEX_FILENAME)
    }

    /// Rescan, persist and return all work-effort records, newest first.
    pub fn index_all(&self, aggressive: bool) -> Result<Vec<WorkEffortRecord>, IndexError> {
        let (index, records) = self.build(aggressive)?;
        index.save(&self.index_path())?;
        info!("Indexed {} work effort(s)", records.len());
        Ok(records)
    }

    /// Re-index a single document in place. Returns the refreshed record, or
    /// `None` when the file no longer exists (its entries are dropped).
    pub fn index_one(&self, path: &Path) -> Result<Option<WorkEffortRecord>, IndexError> {
        let mut index = self.load_or_rebuild()?;

        if !path.exists() {
            index.remove_path(path);
            index.save(&self.index_path())?;
            return Ok(None);
        }

        let entry = self.make_entry(path)?;
        let filename = file_name_of(path);

        index.remove_path(path);
        let status = entry.metadata.status.clone();
        let record = WorkEffortRecord::from_metadata(&entry.metadata, entry.path.clone());
        index.insert(&status, filename, entry);
        index.save(&self.index_path())?;

        Ok(Some(record))
    }

    /// Load the persisted index, falling back to a full rescan when it is
    /// missing or corrupt.
    pub fn load_or_rebuild(&self) -> Result<Index, IndexError> {
        match Index::load(&self.index_path())? {
            Some(index) => Ok(index),
            None => {
                debug!("Index missing or corrupt, rebuilding from filesystem");
                let (index, _) = self.build(false)?;
                index.save(&self.index_path())?;
                Ok(index)
            }
        }
    }

    /// Build an index entry for one document.
    pub fn make_entry(&self, path: &Path) -> Result<IndexEntry, IndexError> {
        let raw = std::fs::read_to_string(path).map_err(|e| IndexError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let filename = file_name_of(path);
        let doc = frontmatter::parse(&raw, Some(&filename), &timefmt::now_stamp());
        let mut meta = IndexMetadata::from_document(&doc);

        // The parser defaults a missing status to active; for indexing, a
        // status the document never declared must instead come from the
        // directory the file sits in.
        if !declares_status(&raw) || Status::parse(&meta.status).is_none() {
            meta.status = self
                .ancestor_status(path)
                .unwrap_or(Status::Unknown)
                .as_str()
                .to_string();
        }

        Ok(IndexEntry {
            metadata: meta,
            path: path.to_path_buf(),
        })
    }

    /// Nearest ancestor status directory of `path`, bounded by the tracker
    /// root.
    fn ancestor_status(&self, path: &Path) -> Option<Status> {
        path.ancestors()
            .skip(1)
            .take_while(|a| a.starts_with(&self.root))
            .find_map(|a| {
                a.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| self.config.status_dirs.status_for(n))
            })
    }

    fn build(&self, aggressive: bool) -> Result<(Index, Vec<WorkEffortRecord>), IndexError> {
        let scanner = Scanner::new(&self.config.status_dirs);
        let mut candidates: Vec<Candidate> = Vec::new();

        for root in self.scan_roots(aggressive) {
            match scanner.scan(&root, aggressive) {
                Ok(found) => candidates.extend(found),
                Err(ScanError::RootNotFound(path)) => {
                    debug!("Scan root {} does not exist, skipping", path.display());
                }
            }
        }

        // De-duplicate by absolute path, then order newest first. The mtime
        // ordering is what callers see; path is only a tiebreaker keeping
        // repeated runs stable.
        let mut seen: HashSet<PathBuf> = HashSet::new();
        candidates.retain(|c| seen.insert(canonical(&c.path)));
        candidates.sort_by(|a, b| b.mtime.cmp(&a.mtime).then_with(|| a.path.cmp(&b.path)));

        let mut index = Index::default();
        let mut records = Vec::new();

        for candidate in candidates {
            let mut entry = match self.make_entry(&candidate.path) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping {}: {}", candidate.path.display(), e);
                    continue;
                }
            };

            // Scan roots can sit outside the tracker tree, where the
            // root-bounded ancestor lookup in make_entry finds nothing; the
            // scanner's own inference still applies there.
            if entry.metadata.status == Status::Unknown.as_str()
                && let Some(status) = candidate.ancestor_status
            {
                entry.metadata.status = status.as_str().to_string();
            }

            let status = entry.metadata.status.clone();
            let record = WorkEffortRecord::from_metadata(&entry.metadata, entry.path.clone());
            index.insert(&status, file_name_of(&candidate.path), entry);
            records.push(record);
        }

        Ok((index, records))
    }

    /// Roots visited by a scan: the whole tracker tree in aggressive mode,
    /// else the status directories plus any configured extra roots.
    fn scan_roots(&self, aggressive: bool) -> Vec<PathBuf> {
        if aggressive {
            return vec![self.root.clone()];
        }

        let mut roots: Vec<PathBuf> = Status::REAL
            .into_iter()
            .map(|s| self.root.join(self.config.status_dirs.dir_for(s)))
            .collect();
        for extra in &self.config.scan_roots {
            roots.push(self.config.resolve(&self.root, extra));
        }
        roots
    }
}

/// True when the document carries an explicit status field anywhere.
fn declares_status(raw: &str) -> bool {
    regex::Regex::new(r"(?m)^\s*status\s*:")
        .map(|re| re.is_match(raw))
        .unwrap_or(false)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
