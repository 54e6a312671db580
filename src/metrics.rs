//! Derived interval metrics from filtered status history.
//!
//! Every metric is a pure function of (history, created_at, status mapping,
//! optional reference time), with no storage access, unit-testable with literal
//! fixtures. A metric whose target event never happened is `None`, so
//! downstream aggregation can exclude the task instead of counting a zero.

use crate::config::StatusMapping;
use crate::types::{MetricValues, StatusHistoryEntry};
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

/// Computes the per-task metric bag from a filtered history.
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    mapping: StatusMapping,
}

impl MetricsEngine {
    pub fn new(mapping: StatusMapping) -> Self {
        Self { mapping }
    }

    /// Compute all configured metrics.
    ///
    /// `until` is the reference instant for open spans (the report cutoff);
    /// without it, spans with no recorded end contribute nothing.
    pub fn compute(
        &self,
        history: &[StatusHistoryEntry],
        created_at: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> MetricValues {
        MetricValues {
            time_to_market_days: days_to_first(history, created_at, &self.mapping.done, "time_to_market"),
            time_to_delivery_days: days_to_first(
                history,
                created_at,
                &self.mapping.ready_for_dev,
                "time_to_delivery",
            ),
            dev_lead_time_days: days_between_first(
                history,
                &self.mapping.in_progress,
                &self.mapping.done,
                "dev_lead_time",
            ),
            pause_hours: pause_time(history, &self.mapping.paused, until).map(|d| d.num_hours()),
            status_hours: self
                .mapping
                .tracked
                .iter()
                .filter_map(|status| {
                    time_in_status(history, status, until)
                        .map(|d| (status.clone(), d.num_hours()))
                })
                .collect(),
        }
    }
}

/// Start of the chronologically first entry whose display status is in the
/// target set. Tolerates unsorted input.
fn first_reached(history: &[StatusHistoryEntry], statuses: &[String]) -> Option<DateTime<Utc>> {
    history
        .iter()
        .filter(|e| statuses.iter().any(|s| e.is_status(s)))
        .map(|e| e.start)
        .min()
}

/// Whole days from task creation to the first entry in the target set.
///
/// An empty target set is a configuration invariant violation: warn and
/// return `None` so the rest of the report still assembles.
pub fn days_to_first(
    history: &[StatusHistoryEntry],
    created_at: DateTime<Utc>,
    statuses: &[String],
    metric: &str,
) -> Option<i64> {
    if statuses.is_empty() {
        warn!(metric, "empty target status set, metric skipped");
        return None;
    }
    let reached = first_reached(history, statuses)?;
    Some((reached - created_at).num_days().max(0))
}

/// Whole days between the first entries of two target sets.
pub fn days_between_first(
    history: &[StatusHistoryEntry],
    from_statuses: &[String],
    to_statuses: &[String],
    metric: &str,
) -> Option<i64> {
    if from_statuses.is_empty() || to_statuses.is_empty() {
        warn!(metric, "empty target status set, metric skipped");
        return None;
    }
    let from = first_reached(history, from_statuses)?;
    let to = first_reached(history, to_statuses)?;
    Some((to - from).num_days().max(0))
}

/// Total time spent in pause statuses, each span capped at `until`.
///
/// `None` for an empty history (no data); `Some(zero)` when the task simply
/// never paused (a measured zero).
pub fn pause_time(
    history: &[StatusHistoryEntry],
    pause_statuses: &[String],
    until: Option<DateTime<Utc>>,
) -> Option<Duration> {
    if history.is_empty() {
        return None;
    }
    if pause_statuses.is_empty() {
        warn!("empty pause status set, pause time skipped");
        return None;
    }

    let mut total = Duration::zero();
    for entry in history {
        if !pause_statuses.iter().any(|s| entry.is_status(s)) {
            continue;
        }
        if let Some(span) = span_duration(entry, until) {
            total += span;
        }
    }
    Some(total)
}

/// Total time spent in one named status, summed across non-contiguous
/// visits. Same `until` semantics as [`pause_time`].
pub fn time_in_status(
    history: &[StatusHistoryEntry],
    status: &str,
    until: Option<DateTime<Utc>>,
) -> Option<Duration> {
    if history.is_empty() {
        return None;
    }

    let mut total = Duration::zero();
    for entry in history {
        if !entry.is_status(status) {
            continue;
        }
        if let Some(span) = span_duration(entry, until) {
            total += span;
        }
    }
    Some(total)
}

/// Measurable duration of one entry, capped at `until`. `None` when the
/// span is open-ended with no reference instant, or lies entirely past the
/// cap. Noisy data with `end < start` clamps to zero.
fn span_duration(entry: &StatusHistoryEntry, until: Option<DateTime<Utc>>) -> Option<Duration> {
    let span_end = match (entry.end, until) {
        (Some(end), Some(cap)) => end.min(cap),
        (Some(end), None) => end,
        (None, Some(cap)) => cap,
        (None, None) => return None,
    };
    if span_end <= entry.start {
        return Some(Duration::zero());
    }
    Some(span_end - entry.start)
}
