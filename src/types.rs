//! Core types for the cadence metrics engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One contiguous period a task spent in one status.
///
/// Entries are read-only projections of persisted transition rows, ordered
/// by `start`. The entry with `end = None` (or the chronologically last one)
/// is the current/terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: String,
    pub status_display: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl StatusHistoryEntry {
    /// Exact, case-sensitive match against the tracker-supplied display value.
    /// "Testing" and "testing" are distinct statuses.
    pub fn is_status(&self, name: &str) -> bool {
        self.status_display == name
    }
}

/// Direction of a tracker link as stored on the owning task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    Inward,
    Outward,
}

impl LinkDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkDirection::Inward => "inward",
            LinkDirection::Outward => "outward",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "inward" => Some(LinkDirection::Inward),
            "outward" => Some(LinkDirection::Outward),
            _ => None,
        }
    }
}

/// A typed, directional link from one task to another.
///
/// Parsed from the semi-structured snapshot the tracker stores on the task
/// record. A "subtask" link with direction inward on task A pointing at B
/// means B is A's subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLink {
    pub relation_type: String,
    pub direction: LinkDirection,
    pub related_key: String,
    pub related_queue: Option<String>,
}

impl TaskLink {
    /// Parse one raw link mapping.
    ///
    /// Returns `None` for anything that is not a mapping with the required
    /// fields (`type.id`, `direction`, `object.key`). Malformed entries are
    /// a skip outcome, never an error.
    pub fn parse(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let relation_type = obj.get("type")?.get("id")?.as_str()?.to_string();
        let direction = LinkDirection::from_str(obj.get("direction")?.as_str()?)?;
        let object = obj.get("object")?;
        let related_key = object.get("key")?.as_str()?.to_string();
        let related_queue = object
            .get("queue")
            .and_then(|q| q.get("key"))
            .and_then(|k| k.as_str())
            .map(str::to_string);

        Some(TaskLink {
            relation_type,
            direction,
            related_key,
            related_queue,
        })
    }

    /// Parse a raw link list, silently dropping malformed elements.
    pub fn parse_list(values: &[Value]) -> Vec<Self> {
        values.iter().filter_map(Self::parse).collect()
    }
}

/// A task snapshot as stored by the ingest layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub key: String,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub queue: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Raw link snapshot as fetched from the tracker.
    pub links: Vec<Value>,
}

impl TaskRecord {
    /// Parsed view of the link snapshot; malformed entries are skipped.
    pub fn parsed_links(&self) -> Vec<TaskLink> {
        TaskLink::parse_list(&self.links)
    }
}

/// Count of re-entries into one status for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnsCount {
    pub status: String,
    pub count: u32,
}

/// Derived interval metrics for one task.
///
/// `None` means the metric is undefined for the task (the terminal event
/// never happened), which downstream aggregation must keep distinct from a
/// measured zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    pub time_to_market_days: Option<i64>,
    pub time_to_delivery_days: Option<i64>,
    pub dev_lead_time_days: Option<i64>,
    pub pause_hours: Option<i64>,
    /// Total hours spent in each explicitly tracked status.
    #[serde(default)]
    pub status_hours: BTreeMap<String, i64>,
}

/// One output row of the report: a task joined with its grouping and
/// hierarchy-derived returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
    pub key: String,
    pub author: Option<String>,
    pub group: String,
    pub quarter: String,
    pub metrics: MetricValues,
    /// Returns counted over the task's own filtered history.
    pub returns: BTreeMap<String, u32>,
    /// Returns summed across the task's resolved hierarchy.
    pub hierarchy_returns: BTreeMap<String, u32>,
    pub hierarchy_size: usize,
}

/// Aggregate over all rows sharing a (group, quarter) cell.
///
/// Averages cover only the rows where the metric is defined; rows with an
/// absent metric are excluded, not treated as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: String,
    pub quarter: String,
    pub tasks: usize,
    pub avg_time_to_market_days: Option<f64>,
    pub avg_time_to_delivery_days: Option<f64>,
    pub avg_dev_lead_time_days: Option<f64>,
    pub total_pause_hours: i64,
    pub total_returns: BTreeMap<String, u64>,
}

/// Full report output consumed by an external writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
    pub summaries: Vec<GroupSummary>,
}
