//! Command-line interface definitions.

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "cadence",
    version,
    about = "Engineering-process metrics from issue tracker status history"
)]
pub struct Cli {
    /// Path to the SQLite database.
    #[arg(long, global = true, default_value = "cadence.db")]
    pub db: PathBuf,

    /// Path to the YAML config file (default: cadence.yaml, then the user
    /// config dir).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import a JSON snapshot of tasks, links, and status history.
    Import {
        /// Snapshot file exported from the tracker sync job.
        file: PathBuf,
    },

    /// Compute metrics and emit the report as JSON.
    Report {
        /// Only tasks created on or after this date (YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Only tasks created on or before this date (YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Override the configured grouping axis.
        #[arg(long, value_enum)]
        group_by: Option<GroupByArg>,

        /// Write the report here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },

    /// Resolve and print the subordinate-task closure of a key.
    Hierarchy { key: String },

    /// Print a task's status history, filtered unless --raw is given.
    History {
        key: String,

        /// Show the raw stored history without flicker filtering.
        #[arg(long)]
        raw: bool,
    },
}

/// CLI-side mirror of [`crate::config::GroupBy`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GroupByArg {
    Author,
    Team,
}

impl From<GroupByArg> for crate::config::GroupBy {
    fn from(value: GroupByArg) -> Self {
        match value {
            GroupByArg::Author => crate::config::GroupBy::Author,
            GroupByArg::Team => crate::config::GroupBy::Team,
        }
    }
}
