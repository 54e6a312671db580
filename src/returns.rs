//! Counting re-entries ("returns") into a status.

use crate::types::StatusHistoryEntry;
use std::collections::HashMap;

/// Count how many times a history re-enters `status` after having left it.
///
/// The scan tracks the previous status, so consecutive duplicate entries to
/// the same status count as a single entry even if the filter upstream left
/// them in place. The first arrival is not a return: the result is
/// `max(0, entries - 1)`.
///
/// Unsorted input is tolerated; comparison against `status` is exact and
/// case-sensitive.
pub fn count_status_returns(history: &[StatusHistoryEntry], status: &str) -> u32 {
    if history.is_empty() {
        return 0;
    }

    let mut ordered: Vec<&StatusHistoryEntry> = history.iter().collect();
    ordered.sort_by_key(|e| e.start);

    let mut entries = 0u32;
    let mut previous: Option<&str> = None;
    for entry in ordered {
        let current = entry.status_display.as_str();
        if current == status && previous != Some(status) {
            entries += 1;
        }
        previous = Some(current);
    }
    entries.saturating_sub(1)
}

/// Per-run memoization of return counts keyed by (task key, status).
///
/// Hierarchy traversal reaches the same related task from several roots;
/// the count only needs computing once per report run. The cache is
/// process-local and discarded with the run.
#[derive(Debug, Default)]
pub struct ReturnsCache {
    counts: HashMap<(String, String), u32>,
}

impl ReturnsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached count for (task_key, status), computing and storing
    /// it on first use.
    pub fn count_with<F>(&mut self, task_key: &str, status: &str, compute: F) -> u32
    where
        F: FnOnce() -> u32,
    {
        let key = (task_key.to_string(), status.to_string());
        if let Some(&cached) = self.counts.get(&key) {
            return cached;
        }
        let value = compute();
        self.counts.insert(key, value);
        value
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
