//! The document store: create, read and move work-effort files.
//!
//! The store owns the mapping from status to directory to markdown files.
//! The counter is injected at construction; there is no process-wide
//! instance. Every operation returns a `Result` — expected failures
//! (validation, not-found) are error variants, and filesystem errors carry
//! the offending path. Nothing here panics past the store boundary.

use crate::config::{Config, STATE_DIR};
use crate::counter::{Counter, CounterError, format_number};
use crate::events::{self, EffortEvent};
use crate::frontmatter::{self, slugify};
use crate::lock::{FileLock, LockError};
use crate::record::{IndexMetadata, Priority, Status, WorkEffortRecord};
use crate::sections;
use crate::template;
use crate::timefmt;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Characters stripped from titles before filename derivation.
const UNSAFE_TITLE_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid title: {0}")]
    InvalidTitle(String),
    #[error("Invalid priority '{0}' (expected low, medium, high or critical)")]
    InvalidPriority(String),
    #[error("Invalid due date '{0}' (expected YYYY-MM-DD or None)")]
    InvalidDueDate(String),
    #[error("Invalid category '{0}' (expected a Johnny-Decimal name like 10_development)")]
    InvalidCategory(String),
    #[error("A work effort named {0} already exists")]
    AlreadyExists(String),
    #[error("Work effort not found: {0}")]
    NotFound(String),
    #[error("Counter error: {0}")]
    Counter(#[from] CounterError),
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Inputs to [`DocumentStore::create`]. Priority and due date arrive as raw
/// strings from the caller and are validated here.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub title: String,
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub tags: Vec<String>,
    /// Optional Johnny-Decimal category under the active directory.
    pub category: Option<String>,
    /// With `strict`, an off-enum priority is rejected; without it, the
    /// legacy behavior applies: default to medium with a warning.
    pub strict: bool,
    /// Template file override; config-level template applies otherwise.
    pub template: Option<PathBuf>,
    /// Pre-rendered section content, substituted into the rendered document.
    pub objectives: Option<String>,
    pub tasks: Option<String>,
    pub notes: Option<String>,
}

/// A located document: its status, bucket filename and full path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub status: Status,
    pub filename: String,
    pub path: PathBuf,
}

pub struct DocumentStore {
    root: PathBuf,
    config: Config,
    counter: Counter,
}

impl DocumentStore {
    pub fn new(root: &Path, config: Config, counter: Counter) -> DocumentStore {
        DocumentStore {
            root: root.to_path_buf(),
            config,
            counter,
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn status_dir(&self, status: Status) -> PathBuf {
        self.root.join(self.config.status_dirs.dir_for(status))
    }

    /// Create a new work effort in the active directory and return its path.
    pub fn create(&mut self, req: CreateRequest) -> Result<PathBuf, StoreError> {
        let title = sanitize_title(&req.title)?;

        let priority = match req.priority.as_deref() {
            None | Some("") => Priority::Medium,
            Some(raw) => match Priority::parse(raw) {
                Some(priority) => priority,
                None if req.strict => return Err(StoreError::InvalidPriority(raw.to_string())),
                None => {
                    warn!("Unknown priority '{}', defaulting to medium", raw);
                    Priority::Medium
                }
            },
        };

        let due_date = match req.due_date.as_deref() {
            None | Some("") | Some("None") => "None".to_string(),
            Some(raw) if timefmt::is_valid_date(raw) => raw.to_string(),
            Some(raw) => return Err(StoreError::InvalidDueDate(raw.to_string())),
        };

        if let Some(category) = req.category.as_deref() {
            validate_category(category)?;
        }

        let number = self.counter.get_next()?;
        let date_prefix = self.config.date_prefix.then(timefmt::today);
        let filename = format!("{}_{}.md", format_number(number, date_prefix), slugify(&title));

        let mut dir = self.status_dir(Status::Active);
        if let Some(category) = req.category.as_deref() {
            dir = dir.join(category);
        }
        std::fs::create_dir_all(&dir).map_err(|e| classify(e, &dir))?;

        let path = dir.join(&filename);
        if path.exists() {
            return Err(StoreError::AlreadyExists(filename));
        }

        let now = timefmt::now_stamp();
        let values = BTreeMap::from([
            ("title", title.clone()),
            ("status", Status::Active.as_str().to_string()),
            ("priority", priority.as_str().to_string()),
            (
                "assignee",
                req.assignee
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| crate::record::DEFAULT_ASSIGNEE.to_string()),
            ),
            ("created", now.clone()),
            ("last_updated", now.clone()),
            ("due_date", due_date),
            ("tags", template::render_tags(&req.tags)),
        ]);

        let template_path = req
            .template
            .or_else(|| self.config.template.clone())
            .map(|p| self.config.resolve(&self.root, &p));
        let mut content = template::render(&template::load(template_path.as_deref()), &values);

        for (name, override_content) in [
            (sections::OBJECTIVES, &req.objectives),
            (sections::TASKS, &req.tasks),
            (sections::NOTES, &req.notes),
        ] {
            if let Some(text) = override_content {
                content = sections::with_section(&content, name, text);
            }
        }

        write_atomic(&path, &content)?;
        info!("Created work effort {}", path.display());

        // The event log is advisory history; creation must not fail on it.
        let id = frontmatter::parse(&content, Some(&filename), &now).fields["id"].clone();
        if let Err(e) = events::append(&self.state_dir(), &id, EffortEvent::created(&now)) {
            warn!("Failed to record creation event for {}: {}", id, e);
        }

        Ok(path)
    }

    /// Read a work effort by filename, id or title.
    pub fn read(&self, query: &str) -> Result<WorkEffortRecord, StoreError> {
        let located = self.find(query)?;
        let raw = read_file(&located.path)?;
        let doc = frontmatter::parse(&raw, Some(&located.filename), &timefmt::now_stamp());

        let mut meta = IndexMetadata::from_document(&doc);
        if Status::parse(&meta.status).is_none() {
            meta.status = located.status.as_str().to_string();
        }
        Ok(WorkEffortRecord::from_metadata(&meta, located.path))
    }

    /// Locate a document by exact filename (with or without `.md`), then by
    /// `id` field, then by case-insensitive title. Status directories are
    /// searched in the fixed order active, completed, archived, paused.
    pub fn find(&self, query: &str) -> Result<Located, StoreError> {
        let mut id_match: Option<Located> = None;
        let mut title_match: Option<Located> = None;
        let now = timefmt::now_stamp();

        for status in Status::REAL {
            for (filename, path) in self.documents_in(status) {
                let stem = filename.strip_suffix(".md").unwrap_or(&filename);
                if filename == query || stem == query {
                    return Ok(Located {
                        status,
                        filename,
                        path,
                    });
                }

                if id_match.is_some() && title_match.is_some() {
                    continue;
                }
                let Ok(raw) = read_file(&path) else {
                    continue;
                };
                let doc = frontmatter::parse(&raw, Some(&filename), &now);

                if id_match.is_none() && doc.fields.get("id").map(String::as_str) == Some(query) {
                    id_match = Some(Located {
                        status,
                        filename: filename.clone(),
                        path: path.clone(),
                    });
                }
                if title_match.is_none()
                    && doc
                        .fields
                        .get("title")
                        .is_some_and(|t| t.eq_ignore_ascii_case(query))
                {
                    title_match = Some(Located {
                        status,
                        filename,
                        path,
                    });
                }
            }
        }

        id_match
            .or(title_match)
            .ok_or_else(|| StoreError::NotFound(query.to_string()))
    }

    /// Locate a document by filename within one status directory, descending
    /// into category subdirectories.
    pub fn locate_in(&self, status: Status, filename: &str) -> Option<PathBuf> {
        self.documents_in(status)
            .into_iter()
            .find(|(name, _)| name == filename)
            .map(|(_, path)| path)
    }

    /// Move a work effort between status directories, rewriting its `status`
    /// field and `last_updated` timestamp. The destination is written before
    /// the source is removed, so a mid-operation failure can leave two
    /// copies but never zero; a failed move is always retryable.
    pub fn move_document(
        &self,
        filename: &str,
        from: Status,
        to: Status,
        now: &str,
    ) -> Result<PathBuf, StoreError> {
        let _lock = FileLock::acquire(&self.state_dir().join("move.lock"))?;

        let source = self
            .locate_in(from, filename)
            .ok_or_else(|| StoreError::NotFound(format!("{} in {}", filename, from)))?;

        let raw = read_file(&source)?;
        let rewritten = rewrite_status_fields(&raw, from, to, now);

        // Preserve any category subpath below the source status directory.
        let from_dir = self.status_dir(from);
        let relative = source.strip_prefix(&from_dir).unwrap_or(Path::new(filename));
        let dest = self.status_dir(to).join(relative);

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| classify(e, parent))?;
        }
        write_atomic(&dest, &rewritten)?;

        if dest != source {
            std::fs::remove_file(&source).map_err(|e| classify(e, &source))?;
        }

        debug!("Moved {} -> {}", source.display(), dest.display());
        Ok(dest)
    }

    /// Filenames and paths of every `.md` file under a status directory,
    /// including category subdirectories. Unreadable subtrees are skipped.
    fn documents_in(&self, status: Status) -> Vec<(String, PathBuf)> {
        let dir = self.status_dir(status);
        if !dir.exists() {
            return Vec::new();
        }

        let mut docs = Vec::new();
        for entry in WalkDir::new(&dir).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
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
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                docs.push((name.to_string(), path.to_path_buf()));
            }
        }

        docs.sort();
        docs
    }
}

/// Strip filesystem-unsafe characters and reject empty results.
fn sanitize_title(raw: &str) -> Result<String, StoreError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !UNSAFE_TITLE_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim().to_string();

    if cleaned.is_empty() {
        return Err(StoreError::InvalidTitle(raw.to_string()));
    }
    Ok(cleaned)
}

fn validate_category(category: &str) -> Result<(), StoreError> {
    let valid = Regex::new(r"^\d{2}[_-][A-Za-z0-9][A-Za-z0-9_-]*$")
        .map(|re| re.is_match(category))
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCategory(category.to_string()))
    }
}

/// Rewrite the quoted `status` value and the `last_updated` timestamp in a
/// document's frontmatter, leaving everything else (notably `created`) byte
/// for byte intact.
fn rewrite_status_fields(raw: &str, from: Status, to: Status, now: &str) -> String {
    let mut out = raw.replacen(
        &format!("status: \"{}\"", from.as_str()),
        &format!("status: \"{}\"", to.as_str()),
        1,
    );

    if let Ok(re) = Regex::new(r#"(?m)^(last_updated:\s*)"[^"\n]*""#) {
        out = re
            .replacen(&out, 1, format!("${{1}}\"{}\"", now))
            .into_owned();
    }
    out
}

fn read_file(path: &Path) -> Result<String, StoreError> {
    std::fs::read_to_string(path).map_err(|e| classify(e, path))
}

fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let parent = path.parent().unwrap_or(Path::new("."));

    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(|e| classify(e, parent))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| classify(e, path))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| classify(e, path))?;
    temp_file.persist(path).map_err(|e| classify(e.error, path))?;

    Ok(())
}

fn classify(e: std::io::Error, path: &Path) -> StoreError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        StoreError::PermissionDenied(path.to_path_buf())
    } else {
        StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    }
}
