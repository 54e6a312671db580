//! Status history storage.

use super::{Database, from_ms, to_ms};
use crate::providers::HistoryProvider;
use crate::types::StatusHistoryEntry;
use anyhow::Result;
use rusqlite::{Row, params};
use std::collections::HashMap;
use tracing::warn;

fn parse_history_row(row: &Row) -> rusqlite::Result<StatusHistoryEntry> {
    let end: Option<i64> = row.get(3)?;
    Ok(StatusHistoryEntry {
        status: row.get(0)?,
        status_display: row.get(1)?,
        start: from_ms(row.get(2)?),
        end: end.map(from_ms),
    })
}

impl Database {
    /// Append one history entry for a task.
    pub fn insert_history_entry(&self, task_id: i64, entry: &StatusHistoryEntry) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO status_history (task_id, status, status_display, start_ts, end_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    task_id,
                    entry.status,
                    entry.status_display,
                    to_ms(entry.start),
                    entry.end.map(to_ms)
                ],
            )?;
            Ok(())
        })
    }

    /// Drop all stored history for a task (snapshot refresh).
    pub fn clear_history(&self, task_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM status_history WHERE task_id = ?1",
                params![task_id],
            )?;
            Ok(())
        })
    }

    /// Raw history rows for a task, ordered by start.
    pub fn history_for_task(&self, task_id: i64) -> Result<Vec<StatusHistoryEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT status, status_display, start_ts, end_ts
                 FROM status_history
                 WHERE task_id = ?1
                 ORDER BY start_ts, id",
            )?;
            let entries = stmt
                .query_map(params![task_id], parse_history_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
    }

    /// Raw history rows addressed by tracker key. Unknown keys yield an
    /// empty list.
    pub fn history_for_key(&self, key: &str) -> Result<Vec<StatusHistoryEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT h.status, h.status_display, h.start_ts, h.end_ts
                 FROM status_history h
                 INNER JOIN tasks t ON h.task_id = t.id
                 WHERE t.key = ?1
                 ORDER BY h.start_ts, h.id",
            )?;
            let entries = stmt
                .query_map(params![key], parse_history_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
    }

    /// History rows for many keys in one query, grouped by key.
    pub fn histories_for_keys(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, Vec<StatusHistoryEntry>>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=keys.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT t.key, h.status, h.status_display, h.start_ts, h.end_ts
                 FROM status_history h
                 INNER JOIN tasks t ON h.task_id = t.id
                 WHERE t.key IN ({})
                 ORDER BY t.key, h.start_ts, h.id",
                placeholders.join(", ")
            );

            let param_refs: Vec<&dyn rusqlite::ToSql> =
                keys.iter().map(|k| k as &dyn rusqlite::ToSql).collect();

            let mut stmt = conn.prepare(&sql)?;
            let mut result: HashMap<String, Vec<StatusHistoryEntry>> = HashMap::new();
            let rows = stmt.query_map(param_refs.as_slice(), |row| {
                let key: String = row.get(0)?;
                let end: Option<i64> = row.get(4)?;
                Ok((
                    key,
                    StatusHistoryEntry {
                        status: row.get(1)?,
                        status_display: row.get(2)?,
                        start: from_ms(row.get(3)?),
                        end: end.map(from_ms),
                    },
                ))
            })?;

            for row in rows {
                let (key, entry) = row?;
                result.entry(key).or_default().push(entry);
            }
            Ok(result)
        })
    }
}

impl HistoryProvider for Database {
    fn task_history(&self, task_id: i64) -> Vec<StatusHistoryEntry> {
        self.history_for_task(task_id).unwrap_or_else(|e| {
            warn!(error = %e, task_id, "history lookup failed");
            Vec::new()
        })
    }

    fn task_history_by_key(&self, key: &str) -> Vec<StatusHistoryEntry> {
        self.history_for_key(key).unwrap_or_else(|e| {
            warn!(error = %e, key, "history lookup failed");
            Vec::new()
        })
    }

    fn histories_by_keys(&self, keys: &[String]) -> HashMap<String, Vec<StatusHistoryEntry>> {
        self.histories_for_keys(keys).unwrap_or_else(|e| {
            warn!(error = %e, keys = keys.len(), "batch history lookup failed");
            HashMap::new()
        })
    }
}
