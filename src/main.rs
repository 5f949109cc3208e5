mod cli;
mod config;
mod counter;
mod events;
mod frontmatter;
mod index_file;
mod indexer;
mod lock;
mod record;
mod scan;
mod sections;
mod store;
mod template;
mod timefmt;
mod trace;
mod transition;

use cli::{Cli, Command};
use config::{Config, STATE_DIR};
use counter::Counter;
use indexer::Indexer;
use record::Status;
use std::fmt as stdfmt;
use std::io::{IsTerminal, stderr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use store::{CreateRequest, DocumentStore, StoreError};
use tracing::{Event, Level, Subscriber, debug, error, warn};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use trace::{TraceError, Tracer};
use transition::{TransitionEngine, TransitionError};

struct TaskwardExitCode;

impl TaskwardExitCode {
    /// Exit code for expected failures: validation errors, not-found,
    /// rejected transitions.
    fn expected_failure() -> ExitCode {
        ExitCode::from(1)
    }

    /// Exit code for other errors (I/O errors, invalid arguments, etc.).
    fn any_error() -> ExitCode {
        ExitCode::from(255)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // Change working directory if -C was specified
    if let Some(directory) = cli.directory
        && let Err(e) = std::env::set_current_dir(&directory)
    {
        error!(
            "Failed to change directory to {}: {}",
            directory.display(),
            e
        );
        return TaskwardExitCode::any_error();
    }

    let root = PathBuf::from(".");

    let config = match Config::load(&root) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return TaskwardExitCode::any_error();
        }
    };

    let result: anyhow::Result<ExitCode> = match cli.command {
        Command::New {
            title,
            assignee,
            priority,
            due,
            tags,
            category,
            strict,
            template,
        } => handle_new(
            &root,
            config,
            CreateRequest {
                title,
                assignee,
                priority,
                due_date: due,
                tags,
                category,
                strict,
                template,
                ..CreateRequest::default()
            },
        ),
        Command::List { status } => handle_list(&root, config, status),
        Command::Show { name } => handle_show(&root, config, &name),
        Command::Transition { name, to, from } => handle_transition(&root, config, &name, &to, from),
        Command::Index { aggressive } => handle_index(&root, config, aggressive),
        Command::Related { name, recursive } => handle_related(&root, config, &name, recursive),
        Command::Chain { name } => handle_chain(&root, config, &name),
        Command::History { name } => handle_history(&root, config, &name),
    };

    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!("{err:#}");
            TaskwardExitCode::any_error()
        }
    }
}

fn handle_new(root: &Path, config: Config, request: CreateRequest) -> anyhow::Result<ExitCode> {
    let counter = Counter::open(&root.join(STATE_DIR));
    let mut store = DocumentStore::new(root, config.clone(), counter);

    let path = match store.create(request) {
        Ok(path) => path,
        Err(
            e @ (StoreError::InvalidTitle(_)
            | StoreError::InvalidPriority(_)
            | StoreError::InvalidDueDate(_)
            | StoreError::InvalidCategory(_)
            | StoreError::AlreadyExists(_)),
        ) => {
            error!("{e}");
            return Ok(TaskwardExitCode::expected_failure());
        }
        Err(e) => return Err(e.into()),
    };

    // Keep the index current; a failure here only means the next reader
    // rebuilds.
    let indexer = Indexer::new(root, config);
    if let Err(e) = indexer.index_one(&path) {
        warn!("Failed to index new work effort: {}", e);
    }

    println!("Created {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn handle_list(
    root: &Path,
    config: Config,
    status_filter: Option<String>,
) -> anyhow::Result<ExitCode> {
    let filter = match status_filter.as_deref() {
        None => None,
        Some(raw) => match Status::parse(raw) {
            Some(status) => Some(status),
            None => {
                error!("Unknown status '{}'", raw);
                return Ok(TaskwardExitCode::expected_failure());
            }
        },
    };

    let indexer = Indexer::new(root, config);
    let records = indexer.index_all(false)?;

    for record in records {
        if let Some(filter) = filter
            && record.status != filter
        {
            continue;
        }
        println!(
            "{:<10} {:<9} {:<11} {:<32} {}",
            record.status,
            record.priority,
            record.due_date,
            record
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            record.title
        );
    }

    Ok(ExitCode::SUCCESS)
}

fn handle_show(root: &Path, config: Config, name: &str) -> anyhow::Result<ExitCode> {
    let counter = Counter::open(&root.join(STATE_DIR));
    let store = DocumentStore::new(root, config, counter);

    let record = match store.read(name) {
        Ok(record) => record,
        Err(StoreError::NotFound(name)) => {
            error!("Work effort not found: {}", name);
            return Ok(TaskwardExitCode::expected_failure());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Title:        {}", record.title);
    println!("Id:           {}", record.id);
    println!("Status:       {}", record.status);
    println!("Priority:     {}", record.priority);
    println!("Assignee:     {}", record.assignee);
    println!("Created:      {}", record.created);
    println!("Last updated: {}", record.last_updated);
    println!("Due date:     {}", record.due_date);
    if !record.tags.is_empty() {
        println!("Tags:         {}", record.tags.join(", "));
    }

    let raw = std::fs::read_to_string(&record.path)?;
    let doc = frontmatter::parse(&raw, None, &timefmt::now_stamp());
    let body_sections = sections::parse_sections(&doc.body);

    let filled: Vec<&str> = sections::STANDARD
        .iter()
        .copied()
        .filter(|s| body_sections.get(*s).is_some_and(|c| !c.is_empty()))
        .collect();
    if !filled.is_empty() {
        println!("Sections:     {}", filled.join(", "));
    }

    if let Some(tasks) = body_sections.get(sections::TASKS) {
        let items = sections::parse_checklist(tasks);
        if !items.is_empty() {
            let done = items.iter().filter(|i| i.done).count();
            println!("Tasks:        {}/{} complete", done, items.len());
            for item in items.iter().filter(|i| !i.done) {
                println!("  [ ] {}", item.text);
            }
        }
    }
    println!("Path:         {}", record.path.display());

    Ok(ExitCode::SUCCESS)
}

fn handle_transition(
    root: &Path,
    config: Config,
    name: &str,
    to: &str,
    from: Option<String>,
) -> anyhow::Result<ExitCode> {
    let Some(to) = parse_real_status(to) else {
        return Ok(TaskwardExitCode::expected_failure());
    };
    let from = match from {
        None => None,
        Some(raw) => match parse_real_status(&raw) {
            Some(status) => Some(status),
            None => return Ok(TaskwardExitCode::expected_failure()),
        },
    };

    let counter = Counter::open(&root.join(STATE_DIR));
    let store = DocumentStore::new(root, config.clone(), counter);
    let indexer = Indexer::new(root, config);

    let mut engine = TransitionEngine::new(&store, &indexer);
    engine.on_update(|record| {
        debug!("work_effort_updated: {} is now {}", record.id, record.status);
    });

    match engine.transition(name, to, from) {
        Ok(record) => {
            println!(
                "Moved {} to {}",
                record
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                record.status
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(
            e @ (TransitionError::NotFound(_)
            | TransitionError::AlreadyInStatus(..)
            | TransitionError::InvalidStatus(_)),
        ) => {
            error!("{e}");
            Ok(TaskwardExitCode::expected_failure())
        }
        Err(e) => Err(e.into()),
    }
}

fn handle_index(root: &Path, config: Config, aggressive: bool) -> anyhow::Result<ExitCode> {
    let indexer = Indexer::new(root, config);
    let records = indexer.index_all(aggressive)?;

    println!("Indexed {} work effort(s)", records.len());
    Ok(ExitCode::SUCCESS)
}

fn handle_related(
    root: &Path,
    config: Config,
    name: &str,
    recursive: bool,
) -> anyhow::Result<ExitCode> {
    let indexer = Indexer::new(root, config);
    let tracer = Tracer::new(root, &indexer);

    let related = match tracer.find_related(name, recursive) {
        Ok(related) => related,
        Err(TraceError::NotFound(name)) => {
            error!("Work effort not found: {}", name);
            return Ok(TaskwardExitCode::expected_failure());
        }
        Err(e) => return Err(e.into()),
    };

    if related.is_empty() {
        println!("No related work efforts");
        return Ok(ExitCode::SUCCESS);
    }
    for record in related {
        println!("{:<10} {}", record.status, record.title);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_chain(root: &Path, config: Config, name: &str) -> anyhow::Result<ExitCode> {
    let indexer = Indexer::new(root, config);
    let tracer = Tracer::new(root, &indexer);

    let chain = match tracer.trace_chain(name) {
        Ok(chain) => chain,
        Err(TraceError::NotFound(name)) => {
            error!("Work effort not found: {}", name);
            return Ok(TaskwardExitCode::expected_failure());
        }
        Err(e) => return Err(e.into()),
    };

    for (i, record) in chain.iter().enumerate() {
        if i == 0 {
            println!("{}", record.title);
        } else {
            println!("{}-> {}", "  ".repeat(i), record.title);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_history(root: &Path, config: Config, name: &str) -> anyhow::Result<ExitCode> {
    let indexer = Indexer::new(root, config);
    let tracer = Tracer::new(root, &indexer);

    let history = match tracer.get_history(name) {
        Ok(history) => history,
        Err(TraceError::NotFound(name)) => {
            error!("Work effort not found: {}", name);
            return Ok(TaskwardExitCode::expected_failure());
        }
        Err(e) => return Err(e.into()),
    };

    for event in history {
        match event.kind {
            events::EventKind::Created => println!("{}  created", event.timestamp),
            events::EventKind::StatusChanged => println!(
                "{}  {} -> {}",
                event.timestamp,
                event.from.as_deref().unwrap_or("?"),
                event.to.as_deref().unwrap_or("?")
            ),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn parse_real_status(raw: &str) -> Option<Status> {
    match Status::parse(raw) {
        Some(Status::Unknown) | None => {
            error!(
                "Unknown status '{}' (expected active, completed, archived or paused)",
                raw
            );
            None
        }
        Some(status) => Some(status),
    }
}

fn init_tracing(verbose: u8) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}

impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::DEBUG => write!(writer, "🔍 ")?,
                Level::INFO => write!(writer, "ℹ️ ")?,
                Level::WARN => write!(writer, "⚠️  ")?,
                Level::ERROR => write!(writer, "❌️ ")?,
                _ => {}
            }
        } else {
            match *event.metadata().level() {
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
                _ => {}
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
