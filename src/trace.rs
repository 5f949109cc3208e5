//! Relationship tracing between work efforts.
//!
//! Related documents are discovered through `[[Title]]` references and
//! literal id/title occurrences in other documents' content. Recursive
//! traversal is breadth-first with a visited set keyed by id, so mutual
//! references terminate. Dependency chains follow the first `depends_on`
//! pointer until a leaf or a cycle. History comes from the per-work-effort
//! event log, degrading to a creation event synthesized from frontmatter
//! when no log exists.

use crate::config::STATE_DIR;
use crate::events::{self, EffortEvent};
use crate::frontmatter;
use crate::indexer::{IndexError, Indexer};
use crate::record::WorkEffortRecord;
use crate::sections;
use crate::timefmt;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("Work effort not found: {0}")]
    NotFound(String),
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

/// A document with the content the tracer needs: its record, body text and
/// outgoing references.
#[derive(Debug, Clone)]
struct TracedDoc {
    record: WorkEffortRecord,
    body: String,
    refs: Vec<String>,
    depends_on: Option<String>,
}

pub struct Tracer<'a> {
    root: &'a Path,
    indexer: &'a Indexer,
}

impl<'a> Tracer<'a> {
    pub fn new(root: &'a Path, indexer: &'a Indexer) -> Tracer<'a> {
        Tracer { root, indexer }
    }

    /// Work efforts related to `name`, excluding itself. With `recursive`,
    /// relationships are followed transitively.
    pub fn find_related(
        &self,
        name: &str,
        recursive: bool,
    ) -> Result<Vec<WorkEffortRecord>, TraceError> {
        let docs = self.corpus()?;
        let start = resolve(&docs, name).ok_or_else(|| TraceError::NotFound(name.to_string()))?;

        let mut visited: HashSet<String> = HashSet::from([docs[start].record.id.clone()]);
        let mut queue: VecDeque<usize> = VecDeque::from([start]);
        let mut related: Vec<usize> = Vec::new();

        while let Some(current) = queue.pop_front() {
            for neighbor in direct_related(&docs, current) {
                if visited.insert(docs[neighbor].record.id.clone()) {
                    related.push(neighbor);
                    if recursive {
                        queue.push_back(neighbor);
                    }
                }
            }
            if !recursive {
                break;
            }
        }

        Ok(related.into_iter().map(|i| docs[i].record.clone()).collect())
    }

    /// Follow the `depends_on` pointer from `name` until a leaf or a cycle,
    /// returning the ordered path including the start node.
    pub fn trace_chain(&self, name: &str) -> Result<Vec<WorkEffortRecord>, TraceError> {
        let docs = self.corpus()?;
        let start = resolve(&docs, name).ok_or_else(|| TraceError::NotFound(name.to_string()))?;

        let mut visited: HashSet<String> = HashSet::from([docs[start].record.id.clone()]);
        let mut chain = vec![start];
        let mut current = start;

        while let Some(dep) = first_dependency(&docs[current]) {
            let Some(next) = resolve(&docs, &dep) else {
                break;
            };
            if !visited.insert(docs[next].record.id.clone()) {
                break;
            }
            chain.push(next);
            current = next;
        }

        Ok(chain.into_iter().map(|i| docs[i].record.clone()).collect())
    }

    /// Event history for `name`, oldest first.
    pub fn get_history(&self, name: &str) -> Result<Vec<EffortEvent>, TraceError> {
        let docs = self.corpus()?;
        let doc = &docs[resolve(&docs, name).ok_or_else(|| TraceError::NotFound(name.to_string()))?];

        let logged = events::load(&self.root.join(STATE_DIR), &doc.record.id);
        if !logged.is_empty() {
            return Ok(logged);
        }

        // No log: degrade to the creation event implied by frontmatter.
        let created = if doc.record.created.is_empty() {
            timefmt::now_stamp()
        } else {
            doc.record.created.clone()
        };
        Ok(vec![EffortEvent::created(&created)])
    }

    /// Every indexed work effort plus the content the tracer matches on.
    /// Unreadable documents are skipped with a warning.
    fn corpus(&self) -> Result<Vec<TracedDoc>, TraceError> {
        let index = self.indexer.load_or_rebuild()?;
        let mut docs = Vec::new();
        let mut seen_paths: HashSet<PathBuf> = HashSet::new();

        for record in index.records() {
            if !seen_paths.insert(record.path.clone()) {
                continue;
            }
            let raw = match std::fs::read_to_string(&record.path) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Skipping {} while tracing: {}", record.path.display(), e);
                    continue;
                }
            };
            let parsed = frontmatter::parse(
                &raw,
                record.path.file_name().and_then(|n| n.to_str()),
                &timefmt::now_stamp(),
            );

            docs.push(TracedDoc {
                refs: sections::linked_titles(&parsed.body),
                depends_on: record
                    .extra
                    .get("depends_on")
                    .or_else(|| parsed.fields.get("depends_on"))
                    .cloned(),
                body: parsed.body,
                record,
            });
        }

        Ok(docs)
    }
}

/// Match a document by filename stem, id or case-insensitive title.
fn matches(doc: &TracedDoc, query: &str) -> bool {
    let stem = doc.record.file_stem();
    stem == query
        || format!("{}.md", stem) == query
        || doc.record.id == query
        || doc.record.title.eq_ignore_ascii_case(query)
}

fn resolve(docs: &[TracedDoc], query: &str) -> Option<usize> {
    docs.iter().position(|d| matches(d, query))
}

/// Direct relations of `docs[from]`: documents it references, and documents
/// whose content mentions it.
fn direct_related(docs: &[TracedDoc], from: usize) -> Vec<usize> {
    let source = &docs[from];
    let mut found = Vec::new();

    for (i, other) in docs.iter().enumerate() {
        if i == from {
            continue;
        }

        let outgoing = source.refs.iter().any(|r| matches(other, r));
        let incoming = other.refs.iter().any(|r| matches(source, r));
        let mentioned = (!source.record.title.is_empty()
            && other.body.contains(&source.record.title))
            || (!source.record.id.is_empty() && other.body.contains(&source.record.id))
            || (!other.record.title.is_empty() && source.body.contains(&other.record.title))
            || (!other.record.id.is_empty() && source.body.contains(&other.record.id));

        if outgoing || incoming || mentioned {
            found.push(i);
        }
    }
    found
}

fn first_dependency(doc: &TracedDoc) -> Option<String> {
    doc.depends_on
        .as_ref()
        .and_then(|raw| raw.split(',').next())
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;
    use tempfile::TempDir;

    fn write_doc(root: &Path, name: &str, title: &str, extra_fields: &str, body: &str) {
        let dir = root.join("active");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(name),
            format!(
                "---\nid: \"{}\"\ntitle: \"{}\"\nstatus: \"active\"\n{}---\n\n# {}\n\n{}\n",
                name.trim_end_matches(".md"),
                title,
                extra_fields,
                title,
                body
            ),
        )
        .unwrap();
    }

    fn tracer_fixtures(temp: &TempDir) -> Indexer {
        let indexer = Indexer::new(temp.path(), Config::default());
        indexer.index_all(false).unwrap();
        indexer
    }

    #[test]
    fn mutual_references_terminate_and_exclude_self() {
        let temp = TempDir::new().unwrap();
        write_doc(
            temp.path(),
            "0001_a.md",
            "Alpha",
            "",
            "## Linked Items\n- [[Beta]]\n",
        );
        write_doc(
            temp.path(),
            "0002_b.md",
            "Beta",
            "",
            "## Linked Items\n- [[Alpha]]\n",
        );

        let indexer = tracer_fixtures(&temp);
        let tracer = Tracer::new(temp.path(), &indexer);

        let related = tracer.find_related("Alpha", true).unwrap();
        let titles: Vec<&str> = related.iter().map(|r| r.title.as_str()).collect();

        assert_eq!(titles, vec!["Beta"]);
    }

    #[test]
    fn recursion_reaches_indirect_relations() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "0001_a.md", "Alpha", "", "[[Beta]]");
        write_doc(temp.path(), "0002_b.md", "Beta", "", "[[Gamma]]");
        write_doc(temp.path(), "0003_c.md", "Gamma", "", "no references");

        let indexer = tracer_fixtures(&temp);
        let tracer = Tracer::new(temp.path(), &indexer);

        let direct = tracer.find_related("Alpha", false).unwrap();
        let direct_titles: Vec<&str> = direct.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(direct_titles, vec!["Beta"]);

        let recursive = tracer.find_related("Alpha", true).unwrap();
        let titles: Vec<&str> = recursive.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Beta", "Gamma"]);
    }

    #[test]
    fn literal_title_mentions_count_as_relations() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "0001_a.md", "Schema rework", "", "plain body");
        write_doc(
            temp.path(),
            "0002_b.md",
            "Blocked task",
            "",
            "Waiting on Schema rework to land.",
        );

        let indexer = tracer_fixtures(&temp);
        let tracer = Tracer::new(temp.path(), &indexer);

        let related = tracer.find_related("Schema rework", false).unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].title, "Blocked task");
    }

    #[test]
    fn chain_follows_first_dependency_and_stops_on_cycles() {
        let temp = TempDir::new().unwrap();
        write_doc(
            temp.path(),
            "0001_a.md",
            "Alpha",
            "depends_on: \"0002_b\"\n",
            "",
        );
        write_doc(
            temp.path(),
            "0002_b.md",
            "Beta",
            "depends_on: \"0003_c, 0001_a\"\n",
            "",
        );
        write_doc(
            temp.path(),
            "0003_c.md",
            "Gamma",
            "depends_on: \"0001_a\"\n",
            "",
        );

        let indexer = tracer_fixtures(&temp);
        let tracer = Tracer::new(temp.path(), &indexer);

        let chain = tracer.trace_chain("Alpha").unwrap();
        let titles: Vec<&str> = chain.iter().map(|r| r.title.as_str()).collect();

        // Alpha -> Beta -> Gamma -> (Alpha again: cycle, stop).
        assert_eq!(titles, vec!["Alpha", "Beta", "Gamma"]);
    }

    #[test]
    fn chain_of_a_leaf_is_just_the_start() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "0001_a.md", "Alpha", "", "");

        let indexer = tracer_fixtures(&temp);
        let tracer = Tracer::new(temp.path(), &indexer);

        let chain = tracer.trace_chain("Alpha").unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].title, "Alpha");
    }

    #[test]
    fn history_degrades_to_creation_event_from_frontmatter() {
        let temp = TempDir::new().unwrap();
        write_doc(
            temp.path(),
            "0001_a.md",
            "Alpha",
            "created: \"2024-03-01 08:00\"\n",
            "",
        );

        let indexer = tracer_fixtures(&temp);
        let tracer = Tracer::new(temp.path(), &indexer);

        let history = tracer.get_history("Alpha").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].timestamp, "2024-03-01 08:00");
    }

    #[test]
    fn unknown_work_effort_is_not_found() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "0001_a.md", "Alpha", "", "");

        let indexer = tracer_fixtures(&temp);
        let tracer = Tracer::new(temp.path(), &indexer);

        assert!(matches!(
            tracer.find_related("Nope", false),
            Err(TraceError::NotFound(_))
        ));
    }
}
