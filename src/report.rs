//! Report assembly: joins per-task metrics, grouping, and hierarchy-derived
//! returns into output rows.

use crate::config::ReportConfig;
use crate::db::Database;
use crate::filter::HistoryFilter;
use crate::hierarchy::HierarchyResolver;
use crate::metrics::MetricsEngine;
use crate::providers::HistoryProvider;
use crate::returns::{ReturnsCache, count_status_returns};
use crate::types::{GroupSummary, Report, ReportRow, StatusHistoryEntry, TaskRecord};
use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Quarter key for grouping, e.g. "2024-Q3".
pub fn quarter_key(ts: DateTime<Utc>) -> String {
    format!("{}-Q{}", ts.year(), ts.month0() / 3 + 1)
}

/// Created-at window for root task selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Builds the full report for one run.
///
/// Root tasks are processed concurrently under a semaphore cap; the
/// hierarchy children cache and the returns cache are shared across the
/// run and discarded with it.
pub struct ReportAssembler {
    db: Arc<Database>,
    config: Arc<ReportConfig>,
}

impl ReportAssembler {
    pub fn new(db: Arc<Database>, config: ReportConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub async fn assemble(&self, window: ReportWindow) -> Result<Report> {
        let now = Utc::now();
        // Reference instant for open spans: the window end when it is in
        // the past, otherwise the run time.
        let until = match window.to.map(day_end) {
            Some(end) => end.min(now),
            None => now,
        };

        let roots = self.db.list_tasks(
            self.config.queue.as_deref(),
            window.from.map(|d| day_start(d).timestamp_millis()),
            window.to.map(|d| day_end(d).timestamp_millis()),
        )?;
        info!(roots = roots.len(), "assembling report");

        let resolver = Arc::new(
            HierarchyResolver::new(Arc::clone(&self.db), self.config.hierarchy.relation_type.clone())
                .with_queue_prefix(self.config.hierarchy.queue_prefix.clone()),
        );
        let returns_cache = Arc::new(Mutex::new(ReturnsCache::new()));
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));

        let mut handles = Vec::with_capacity(roots.len());
        for task in roots {
            let db = Arc::clone(&self.db);
            let config = Arc::clone(&self.config);
            let resolver = Arc::clone(&resolver);
            let returns_cache = Arc::clone(&returns_cache);
            let semaphore = Arc::clone(&semaphore);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                Some(build_row(&db, &config, &resolver, &returns_cache, task, until))
            }));
        }

        let mut rows = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "report worker failed"),
            }
        }
        rows.sort_by(|a, b| a.key.cmp(&b.key));

        let summaries = summarize(&rows);
        Ok(Report {
            generated_at: now,
            rows,
            summaries,
        })
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Exclusive end: midnight after the given date.
fn day_end(date: NaiveDate) -> DateTime<Utc> {
    day_start(date) + Duration::days(1)
}

fn build_row(
    db: &Database,
    config: &ReportConfig,
    resolver: &HierarchyResolver<Database>,
    returns_cache: &Mutex<ReturnsCache>,
    task: TaskRecord,
    until: DateTime<Utc>,
) -> ReportRow {
    let filter = HistoryFilter::from_minutes(config.flicker_threshold_minutes);
    let engine = MetricsEngine::new(config.status_mapping.clone());

    let filtered = filter.filter(&db.task_history(task.id));
    let metrics = engine.compute(&filtered, task.created_at, Some(until));

    let mut own_returns: BTreeMap<String, u32> = BTreeMap::new();
    for status in &config.status_mapping.returns {
        own_returns.insert(status.clone(), count_status_returns(&filtered, status));
    }

    let hierarchy = resolver.hierarchy(&task.key);
    let members: Vec<String> = hierarchy
        .iter()
        .filter(|key| *key != &task.key)
        .cloned()
        .collect();

    let mut hierarchy_returns = own_returns.clone();
    if !members.is_empty() {
        let histories = db.histories_by_keys(&members);
        let filtered_members: HashMap<&String, Vec<StatusHistoryEntry>> = members
            .iter()
            .map(|key| {
                let raw = histories.get(key).map(Vec::as_slice).unwrap_or_default();
                (key, filter.filter(raw))
            })
            .collect();

        let mut cache = returns_cache.lock().unwrap();
        for status in &config.status_mapping.returns {
            let mut total = own_returns.get(status).copied().unwrap_or(0);
            for key in &members {
                total += cache.count_with(key, status, || {
                    filtered_members
                        .get(key)
                        .map(|history| count_status_returns(history, status))
                        .unwrap_or(0)
                });
            }
            hierarchy_returns.insert(status.clone(), total);
        }
    }

    ReportRow {
        group: config.group_for(task.author.as_deref()),
        quarter: quarter_key(task.created_at),
        key: task.key,
        author: task.author,
        metrics,
        returns: own_returns,
        hierarchy_returns,
        hierarchy_size: hierarchy.len(),
    }
}

fn summarize(rows: &[ReportRow]) -> Vec<GroupSummary> {
    let mut cells: BTreeMap<(String, String), Vec<&ReportRow>> = BTreeMap::new();
    for row in rows {
        cells
            .entry((row.group.clone(), row.quarter.clone()))
            .or_default()
            .push(row);
    }

    cells
        .into_iter()
        .map(|((group, quarter), members)| {
            let mut total_returns: BTreeMap<String, u64> = BTreeMap::new();
            for row in &members {
                for (status, count) in &row.hierarchy_returns {
                    *total_returns.entry(status.clone()).or_default() += u64::from(*count);
                }
            }

            GroupSummary {
                group,
                quarter,
                tasks: members.len(),
                avg_time_to_market_days: mean(
                    members.iter().filter_map(|r| r.metrics.time_to_market_days),
                ),
                avg_time_to_delivery_days: mean(
                    members.iter().filter_map(|r| r.metrics.time_to_delivery_days),
                ),
                avg_dev_lead_time_days: mean(
                    members.iter().filter_map(|r| r.metrics.dev_lead_time_days),
                ),
                total_pause_hours: members.iter().filter_map(|r| r.metrics.pause_hours).sum(),
                total_returns,
            }
        })
        .collect()
}

/// Mean over the defined values only; `None` when nothing is defined.
fn mean(values: impl Iterator<Item = i64>) -> Option<f64> {
    let collected: Vec<i64> = values.collect();
    if collected.is_empty() {
        return None;
    }
    Some(collected.iter().sum::<i64>() as f64 / collected.len() as f64)
}
