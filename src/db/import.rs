//! JSON snapshot ingest.
//!
//! A snapshot is an array of task objects with embedded links and status
//! history, as exported from the tracker sync job. Import is tolerant per
//! element: a malformed task or history row is skipped and counted, never
//! aborts the run.

use super::Database;
use crate::error::Error;
use crate::types::StatusHistoryEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct SnapshotTask {
    key: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    queue: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    links: Vec<Value>,
    /// Kept loosely typed so one bad row skips, not the whole task.
    #[serde(default)]
    history: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SnapshotEntry {
    status: String,
    #[serde(default)]
    status_display: Option<String>,
    start: DateTime<Utc>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
}

/// Counts of what the import accepted and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub tasks: usize,
    pub entries: usize,
    pub skipped_tasks: usize,
    pub skipped_entries: usize,
}

/// Import a snapshot file into storage, replacing stored history for each
/// task it contains.
pub fn import_snapshot(db: &Database, path: &Path) -> Result<ImportSummary, Error> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::SnapshotRead {
        path: path.to_path_buf(),
        source,
    })?;
    let raw_tasks: Vec<Value> =
        serde_json::from_str(&text).map_err(|source| Error::SnapshotParse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut summary = ImportSummary::default();

    for raw in raw_tasks {
        let task: SnapshotTask = match serde_json::from_value(raw) {
            Ok(task) => task,
            Err(e) => {
                warn!(error = %e, "skipping malformed task in snapshot");
                summary.skipped_tasks += 1;
                continue;
            }
        };

        let task_id = db.upsert_task(
            &task.key,
            task.summary.as_deref(),
            task.author.as_deref(),
            task.queue.as_deref(),
            task.created_at,
            &task.links,
        )?;
        db.clear_history(task_id)?;
        summary.tasks += 1;

        for raw_entry in task.history {
            let entry: SnapshotEntry = match serde_json::from_value(raw_entry) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, key = %task.key, "skipping malformed history row");
                    summary.skipped_entries += 1;
                    continue;
                }
            };

            let stored = StatusHistoryEntry {
                status_display: entry
                    .status_display
                    .unwrap_or_else(|| entry.status.clone()),
                status: entry.status,
                start: entry.start,
                end: entry.end,
            };
            db.insert_history_entry(task_id, &stored)?;
            summary.entries += 1;
        }
    }

    info!(
        tasks = summary.tasks,
        entries = summary.entries,
        skipped_tasks = summary.skipped_tasks,
        skipped_entries = summary.skipped_entries,
        "snapshot imported"
    );
    Ok(summary)
}
