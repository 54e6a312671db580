//! cadence: engineering-process metrics from issue tracker status history.

use anyhow::Result;
use cadence::cli::{Cli, Command};
use cadence::config;
use cadence::db::Database;
use cadence::db::import::import_snapshot;
use cadence::filter::HistoryFilter;
use cadence::hierarchy::HierarchyResolver;
use cadence::logging;
use cadence::providers::HistoryProvider;
use cadence::report::{ReportAssembler, ReportWindow};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = config::load(cli.config.as_deref())?;
    config.validate();

    let db = Database::open(&cli.db)?;

    match cli.command {
        Command::Import { file } => {
            let summary = import_snapshot(&db, &file)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Report {
            from,
            to,
            group_by,
            output,
            pretty,
        } => {
            if let Some(axis) = group_by {
                config.group_by = axis.into();
            }

            let assembler = ReportAssembler::new(Arc::new(db), config);
            let report = assembler.assemble(ReportWindow { from, to }).await?;

            let text = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    info!(path = %path.display(), rows = report.rows.len(), "report written");
                }
                None => println!("{text}"),
            }
        }

        Command::Hierarchy { key } => {
            let resolver = HierarchyResolver::new(
                Arc::new(db),
                config.hierarchy.relation_type.clone(),
            )
            .with_queue_prefix(config.hierarchy.queue_prefix.clone());

            println!("{}", serde_json::to_string_pretty(&resolver.hierarchy(&key))?);
        }

        Command::History { key, raw } => {
            let entries = db.task_history_by_key(&key);
            let entries = if raw {
                entries
            } else {
                HistoryFilter::from_minutes(config.flicker_threshold_minutes).filter(&entries)
            };
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}
