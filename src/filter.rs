//! Noise filtering for raw status histories.
//!
//! Tracker histories arrive unsorted and contain bounce transitions: a user
//! drags a task into the wrong column and corrects it seconds later, or an
//! automation flaps between two states. Metric computation runs on the
//! cleaned sequence this module produces.

use crate::types::StatusHistoryEntry;
use chrono::Duration;

/// Collapses noise from a raw sequence of status transitions.
///
/// Entries held for less than the minimum duration are treated as flicker
/// and dropped, except the first (creation) and last (current/terminal)
/// entries, which are always retained.
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    min_duration: Duration,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            min_duration: Duration::minutes(5),
        }
    }
}

impl HistoryFilter {
    pub fn new(min_duration: Duration) -> Self {
        Self { min_duration }
    }

    pub fn from_minutes(minutes: i64) -> Self {
        Self::new(Duration::minutes(minutes.max(0)))
    }

    /// Sort, de-flicker, and merge a raw history.
    ///
    /// An entry's held time is `next.start - this.start`: the next
    /// transition's start is when the tracker logged the change, so it
    /// defines how long this status actually lasted, regardless of the
    /// recorded `end`. Exact start-timestamp collisions collapse to the
    /// first recorded entry; runs of consecutive identical statuses merge
    /// into one entry spanning the run.
    pub fn filter(&self, raw: &[StatusHistoryEntry]) -> Vec<StatusHistoryEntry> {
        if raw.is_empty() {
            return Vec::new();
        }

        let mut entries = raw.to_vec();
        entries.sort_by_key(|e| e.start);
        entries.dedup_by(|b, a| b.start == a.start);

        let last = entries.len() - 1;
        let mut kept: Vec<StatusHistoryEntry> = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if i == 0 || i == last {
                kept.push(entry.clone());
                continue;
            }
            let held = entries[i + 1].start - entry.start;
            if held >= self.min_duration {
                kept.push(entry.clone());
            }
        }

        let mut out: Vec<StatusHistoryEntry> = Vec::with_capacity(kept.len());
        for entry in kept {
            match out.last_mut() {
                Some(prev) if prev.status == entry.status && prev.status_display == entry.status_display => {
                    prev.end = entry.end;
                }
                _ => out.push(entry),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn at_secs(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn entry(status: &str, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> StatusHistoryEntry {
        StatusHistoryEntry {
            status: status.to_lowercase(),
            status_display: status.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(HistoryFilter::default().filter(&[]).is_empty());
    }

    #[test]
    fn single_entry_is_retained() {
        let history = vec![entry("Open", at(0), None)];
        assert_eq!(HistoryFilter::default().filter(&history), history);
    }

    #[test]
    fn unsorted_input_is_sorted_by_start() {
        let history = vec![
            entry("In Progress", at(60), Some(at(120))),
            entry("Open", at(0), Some(at(60))),
            entry("Done", at(120), None),
        ];

        let filtered = HistoryFilter::default().filter(&history);
        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered[0].status_display, "Open");
        assert_eq!(filtered[1].status_display, "In Progress");
        assert_eq!(filtered[2].status_display, "Done");
    }

    #[test]
    fn short_middle_entry_is_dropped_and_neighbors_merge() {
        // A 30-second bounce into Blocked between two In Progress spans.
        let history = vec![
            entry("Open", at(0), Some(at(60))),
            entry("In Progress", at(60), Some(at_secs(7200))),
            entry("Blocked", at_secs(7200), Some(at_secs(7230))),
            entry("In Progress", at_secs(7230), Some(at(240))),
            entry("Done", at(240), None),
        ];

        let filtered = HistoryFilter::default().filter(&history);
        let statuses: Vec<&str> = filtered.iter().map(|e| e.status_display.as_str()).collect();
        assert_eq!(statuses, vec!["Open", "In Progress", "Done"]);

        // The merged span covers both In Progress visits.
        assert_eq!(filtered[1].start, at(60));
        assert_eq!(filtered[1].end, Some(at(240)));
    }

    #[test]
    fn first_and_last_entries_survive_regardless_of_duration() {
        let history = vec![
            entry("Open", at_secs(0), Some(at_secs(10))),
            entry("In Progress", at_secs(10), Some(at(100))),
            entry("Done", at(100), Some(at_secs(6010))),
        ];

        let filtered = HistoryFilter::default().filter(&history);
        assert_eq!(filtered.first().unwrap().status_display, "Open");
        assert_eq!(filtered.last().unwrap().status_display, "Done");
    }

    #[test]
    fn filtering_is_idempotent() {
        let history = vec![
            entry("Open", at(0), Some(at(10))),
            entry("Triage", at(10), Some(at_secs(630))),
            entry("In Progress", at_secs(630), Some(at_secs(650))),
            entry("Blocked", at_secs(650), Some(at_secs(660))),
            entry("In Progress", at_secs(660), Some(at(200))),
            entry("Testing", at(200), None),
        ];

        let filter = HistoryFilter::default();
        let once = filter.filter(&history);
        let twice = filter.filter(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn timestamp_collisions_collapse_to_one_entry() {
        let history = vec![
            entry("Open", at(0), Some(at(60))),
            entry("In Progress", at(60), Some(at(120))),
            entry("Blocked", at(60), Some(at(120))),
            entry("Done", at(120), None),
        ];

        let filtered = HistoryFilter::default().filter(&history);
        let statuses: Vec<&str> = filtered.iter().map(|e| e.status_display.as_str()).collect();
        assert_eq!(statuses, vec!["Open", "In Progress", "Done"]);
    }

    #[test]
    fn consecutive_duplicate_statuses_merge() {
        let history = vec![
            entry("Open", at(0), Some(at(60))),
            entry("In Progress", at(60), Some(at(120))),
            entry("In Progress", at(120), Some(at(180))),
            entry("Done", at(180), None),
        ];

        let filtered = HistoryFilter::default().filter(&history);
        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered[1].start, at(60));
        assert_eq!(filtered[1].end, Some(at(180)));
    }

    #[test]
    fn output_never_longer_than_input() {
        let history = vec![
            entry("Open", at_secs(0), Some(at_secs(5))),
            entry("A", at_secs(5), Some(at_secs(10))),
            entry("B", at_secs(10), Some(at_secs(15))),
            entry("C", at_secs(15), None),
        ];

        let filtered = HistoryFilter::default().filter(&history);
        assert!(filtered.len() <= history.len());
        assert_eq!(filtered.first().unwrap().status_display, "Open");
        assert_eq!(filtered.last().unwrap().status_display, "C");
    }
}
