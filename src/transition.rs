//! The status-transition engine.
//!
//! A transition is one logical operation: locate the document (index first,
//! direct scan second), rewrite its status and last-updated fields, move it
//! into the destination status directory, update the index buckets, append
//! to the event log, and notify listeners. The store's write-then-remove
//! ordering makes a failed transition retryable; a document that was already
//! moved by someone else fails the existence check and reports not-found
//! rather than corrupting anything.
//!
//! Listener dispatch is synchronous and inline, after the mutation has
//! completed. There is no background machinery.

use crate::events::{self, EffortEvent};
use crate::index_file::IndexFileError;
use crate::indexer::{IndexError, Indexer};
use crate::record::{Status, WorkEffortRecord};
use crate::store::{DocumentStore, StoreError};
use crate::timefmt;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("Work effort not found: {0}")]
    NotFound(String),
    #[error("Work effort {0} is already {1}")]
    AlreadyInStatus(String, Status),
    #[error("Cannot transition to or from '{0}'")]
    InvalidStatus(String),
    #[error("Store error: {0}")]
    Store(StoreError),
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
    #[error("Index file error: {0}")]
    IndexFile(#[from] IndexFileError),
}

impl From<StoreError> for TransitionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(name) => TransitionError::NotFound(name),
            other => TransitionError::Store(other),
        }
    }
}

type Listener<'a> = Box<dyn Fn(&WorkEffortRecord) + 'a>;

pub struct TransitionEngine<'a> {
    store: &'a DocumentStore,
    indexer: &'a Indexer,
    listeners: Vec<Listener<'a>>,
}

impl<'a> TransitionEngine<'a> {
    pub fn new(store: &'a DocumentStore, indexer: &'a Indexer) -> TransitionEngine<'a> {
        TransitionEngine {
            store,
            indexer,
            listeners: Vec::new(),
        }
    }

    /// Register a callback invoked after every completed transition.
    pub fn on_update(&mut self, listener: impl Fn(&WorkEffortRecord) + 'a) {
        self.listeners.push(Box::new(listener));
    }

    /// Move `name` (a filename, id or title) to `to`. When `from` is not
    /// given, the current location is resolved first.
    pub fn transition(
        &self,
        name: &str,
        to: Status,
        from: Option<Status>,
    ) -> Result<WorkEffortRecord, TransitionError> {
        if to == Status::Unknown {
            return Err(TransitionError::InvalidStatus(to.to_string()));
        }
        if from == Some(Status::Unknown) {
            return Err(TransitionError::InvalidStatus(Status::Unknown.to_string()));
        }

        let (filename, from) = self.resolve(name, from)?;
        if from == to {
            return Err(TransitionError::AlreadyInStatus(filename, to));
        }

        let now = timefmt::now_stamp();
        let dest = self.store.move_document(&filename, from, to, &now)?;

        // The move itself is durable at this point. Re-read the destination
        // for the refreshed record; index and event-log bookkeeping degrade
        // to warnings where possible.
        let entry = self.indexer.make_entry(&dest)?;
        let record = WorkEffortRecord::from_metadata(&entry.metadata, dest.clone());

        match self.indexer.load_or_rebuild() {
            Ok(mut index) => {
                index.remove(from.as_str(), &filename);
                index.insert(to.as_str(), filename.clone(), entry);
                index.save(&self.indexer.index_path())?;
            }
            Err(e) => {
                warn!("Index update after transition failed, index is stale: {}", e);
            }
        }

        if let Err(e) = events::append(
            &self.store.state_dir(),
            &record.id,
            EffortEvent::status_changed(&now, from.as_str(), to.as_str()),
        ) {
            warn!("Failed to record transition event for {}: {}", record.id, e);
        }

        info!("Transitioned {} from {} to {}", filename, from, to);
        for listener in &self.listeners {
            listener(&record);
        }

        Ok(record)
    }

    /// Resolve the document to move: the index is consulted first, then the
    /// filesystem. The existence check on the indexed path catches entries
    /// for documents that were moved or deleted behind the index's back.
    fn resolve(
        &self,
        name: &str,
        from: Option<Status>,
    ) -> Result<(String, Status), TransitionError> {
        let filename = if name.ends_with(".md") {
            name.to_string()
        } else {
            format!("{}.md", name)
        };

        if let Ok(index) = self.indexer.load_or_rebuild() {
            let hit = match from {
                Some(status) => index
                    .get(status.as_str(), &filename)
                    .map(|entry| (status, entry)),
                None => index.find_filename(&filename).and_then(|(bucket, entry)| {
                    Status::parse(bucket)
                        .filter(|s| *s != Status::Unknown)
                        .map(|s| (s, entry))
                }),
            };

            if let Some((status, entry)) = hit {
                if entry.path.exists() {
                    return Ok((filename, status));
                }
                debug!(
                    "Index entry for {} points at missing file {}, falling back to scan",
                    filename,
                    entry.path.display()
                );
            }
        }

        // Direct scan: either the requested directory, or wherever the
        // store can find the document by filename, id or title.
        match from {
            Some(status) => {
                if self.store.locate_in(status, &filename).is_some() {
                    Ok((filename, status))
                } else {
                    Err(TransitionError::NotFound(name.to_string()))
                }
            }
            None => {
                let located = self.store.find(name)?;
                Ok((located.filename, located.status))
            }
        }
    }
}
