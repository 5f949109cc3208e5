use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Work-effort tracker: markdown documents in status directories
#[derive(Parser, Debug)]
#[command(name = "taskward", version, about, long_about = None)]
pub struct Cli {
    /// Change to this directory before doing anything
    #[arg(short = 'C', value_name = "DIR", global = true)]
    pub directory: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new work effort in the active directory
    New {
        /// Title of the work effort
        #[arg(value_name = "TITLE")]
        title: String,

        /// Assignee (defaults to unassigned)
        #[arg(long)]
        assignee: Option<String>,

        /// Priority: low, medium, high or critical
        #[arg(long)]
        priority: Option<String>,

        /// Due date as YYYY-MM-DD
        #[arg(long, value_name = "DATE")]
        due: Option<String>,

        /// Tag to attach (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Johnny-Decimal category directory, e.g. 10_development
        #[arg(long, value_name = "CATEGORY")]
        category: Option<String>,

        /// Reject an invalid priority instead of defaulting to medium
        #[arg(long)]
        strict: bool,

        /// Template file to render instead of the built-in default
        #[arg(long, value_name = "PATH")]
        template: Option<PathBuf>,
    },

    /// List indexed work efforts, newest first
    List {
        /// Only show work efforts with this status
        #[arg(long, value_name = "STATUS")]
        status: Option<String>,
    },

    /// Show one work effort's metadata and task progress
    Show {
        /// Filename, id or title
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Move a work effort to another status
    Transition {
        /// Filename, id or title
        #[arg(value_name = "NAME")]
        name: String,

        /// Target status: active, completed, archived or paused
        #[arg(value_name = "STATUS")]
        to: String,

        /// Expected current status; resolved automatically when omitted
        #[arg(long, value_name = "STATUS")]
        from: Option<String>,
    },

    /// Rebuild the JSON index by scanning the filesystem
    Index {
        /// Content-sniff markdown files across the whole tree
        #[arg(long)]
        aggressive: bool,
    },

    /// List work efforts related to one work effort
    Related {
        /// Filename, id or title
        #[arg(value_name = "NAME")]
        name: String,

        /// Follow relationships transitively
        #[arg(long)]
        recursive: bool,
    },

    /// Follow the dependency chain starting at one work effort
    Chain {
        /// Filename, id or title
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Show the event history of one work effort
    History {
        /// Filename, id or title
        #[arg(value_name = "NAME")]
        name: String,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
