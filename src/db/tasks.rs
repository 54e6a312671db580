//! Task snapshot storage and link-graph queries.

use super::{Database, from_ms, to_ms};
use crate::providers::TaskStore;
use crate::types::{TaskLink, TaskRecord};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<TaskRecord> {
    let links_json: String = row.get(6)?;
    // A corrupt snapshot column degrades to "no links" rather than failing
    // the whole row.
    let links: Vec<Value> = serde_json::from_str(&links_json).unwrap_or_default();

    Ok(TaskRecord {
        id: row.get(0)?,
        key: row.get(1)?,
        summary: row.get(2)?,
        author: row.get(3)?,
        queue: row.get(4)?,
        created_at: from_ms(row.get(5)?),
        links,
    })
}

const TASK_COLUMNS: &str = "id, key, summary, author, queue, created_at, links";

impl Database {
    /// Insert or refresh a task snapshot. Returns the row id.
    pub fn upsert_task(
        &self,
        key: &str,
        summary: Option<&str>,
        author: Option<&str>,
        queue: Option<&str>,
        created_at: DateTime<Utc>,
        links: &[Value],
    ) -> Result<i64> {
        self.with_conn(|conn| {
            let links_json = serde_json::to_string(links)?;
            conn.execute(
                "INSERT INTO tasks (key, summary, author, queue, created_at, links)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(key) DO UPDATE SET
                     summary = excluded.summary,
                     author = excluded.author,
                     queue = excluded.queue,
                     created_at = excluded.created_at,
                     links = excluded.links",
                params![key, summary, author, queue, to_ms(created_at), links_json],
            )?;

            let id = conn.query_row(
                "SELECT id FROM tasks WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    pub fn get_task(&self, key: &str) -> Result<Option<TaskRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE key = ?1"
            ))?;
            let mut rows = stmt.query_map(params![key], parse_task_row)?;
            Ok(rows.next().transpose()?)
        })
    }

    pub fn has_task(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// List task snapshots, optionally restricted to a queue and a
    /// created-at window (`from` inclusive, `to` exclusive, epoch ms).
    pub fn list_tasks(
        &self,
        queue: Option<&str>,
        from_ms_bound: Option<i64>,
        to_ms_bound: Option<i64>,
    ) -> Result<Vec<TaskRecord>> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE 1=1");
            let mut param_values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(q) = queue {
                sql.push_str(&format!(" AND queue = ?{}", param_values.len() + 1));
                param_values.push(Box::new(q.to_string()));
            }

            if let Some(from_ts) = from_ms_bound {
                sql.push_str(&format!(" AND created_at >= ?{}", param_values.len() + 1));
                param_values.push(Box::new(from_ts));
            }

            if let Some(to_ts) = to_ms_bound {
                sql.push_str(&format!(" AND created_at < ?{}", param_values.len() + 1));
                param_values.push(Box::new(to_ts));
            }

            sql.push_str(" ORDER BY created_at, id");

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::ToSql> =
                param_values.iter().map(|b| b.as_ref()).collect();

            let tasks = stmt
                .query_map(param_refs.as_slice(), parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    /// Parsed link snapshots for the given keys, one query.
    pub fn links_for_keys(&self, keys: &[String]) -> Result<HashMap<String, Vec<TaskLink>>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=keys.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT key, links FROM tasks WHERE key IN ({})",
                placeholders.join(", ")
            );

            let param_refs: Vec<&dyn rusqlite::ToSql> =
                keys.iter().map(|k| k as &dyn rusqlite::ToSql).collect();

            let mut stmt = conn.prepare(&sql)?;
            let mut result = HashMap::new();
            let rows = stmt.query_map(param_refs.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            for row in rows {
                let (key, links_json) = row?;
                let raw: Vec<Value> = serde_json::from_str(&links_json).unwrap_or_default();
                result.insert(key, TaskLink::parse_list(&raw));
            }
            Ok(result)
        })
    }

    /// Keys of tasks whose snapshot carries an outward link of
    /// `relation_type` pointing at any of `keys`, grouped by the referenced
    /// key. One `json_each` query over the link column; never a scan of
    /// the task population followed by application-side filtering.
    pub fn tasks_referencing(
        &self,
        keys: &[String],
        relation_type: &str,
    ) -> Result<HashMap<String, Vec<String>>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (2..=keys.len() + 1).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT t.key, json_extract(link.value, '$.object.key')
                 FROM tasks t, json_each(t.links) AS link
                 WHERE json_extract(link.value, '$.type.id') = ?1
                   AND json_extract(link.value, '$.direction') = 'outward'
                   AND json_extract(link.value, '$.object.key') IN ({})
                 ORDER BY t.key",
                placeholders.join(", ")
            );

            let mut param_refs: Vec<&dyn rusqlite::ToSql> = vec![&relation_type];
            for key in keys {
                param_refs.push(key as &dyn rusqlite::ToSql);
            }

            let mut stmt = conn.prepare(&sql)?;
            let mut result: HashMap<String, Vec<String>> = HashMap::new();
            let rows = stmt.query_map(param_refs.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            for row in rows {
                let (referrer, referenced) = row?;
                result.entry(referenced).or_default().push(referrer);
            }
            Ok(result)
        })
    }
}

impl TaskStore for Database {
    fn links_for(&self, keys: &[String]) -> HashMap<String, Vec<TaskLink>> {
        self.links_for_keys(keys).unwrap_or_else(|e| {
            warn!(error = %e, "link snapshot lookup failed");
            HashMap::new()
        })
    }

    fn referencing(&self, keys: &[String], relation_type: &str) -> HashMap<String, Vec<String>> {
        self.tasks_referencing(keys, relation_type).unwrap_or_else(|e| {
            warn!(error = %e, relation_type, "reverse link lookup failed");
            HashMap::new()
        })
    }

    fn task_exists(&self, key: &str) -> bool {
        self.has_task(key).unwrap_or_else(|e| {
            warn!(error = %e, key, "existence check failed");
            false
        })
    }
}
