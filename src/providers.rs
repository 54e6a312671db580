//! Collaborator interfaces the analytics core consumes.
//!
//! The core never talks to storage directly; it is handed these seams by
//! constructor injection so tests can substitute in-memory fakes.
//! Implementations must fail soft: a storage or lookup error degrades to an
//! empty result with a logged warning, it never propagates into report
//! assembly.

use crate::types::{StatusHistoryEntry, TaskLink};
use std::collections::HashMap;

/// Source of raw status histories.
pub trait HistoryProvider {
    /// Raw, unfiltered entries in arbitrary order. Empty on not-found or
    /// storage error.
    fn task_history(&self, task_id: i64) -> Vec<StatusHistoryEntry>;

    /// Same as [`task_history`](Self::task_history), addressed by tracker key.
    fn task_history_by_key(&self, key: &str) -> Vec<StatusHistoryEntry>;

    /// Batch variant so hierarchy-wide scans avoid one round trip per key.
    /// Keys without stored history are absent from the result.
    fn histories_by_keys(&self, keys: &[String]) -> HashMap<String, Vec<StatusHistoryEntry>>;
}

/// Source of task link snapshots and existence checks.
pub trait TaskStore {
    /// Parsed link snapshots for the given keys. Keys that are unknown or
    /// fail to load are absent from the result.
    fn links_for(&self, keys: &[String]) -> HashMap<String, Vec<TaskLink>>;

    /// Keys of tasks whose snapshot carries an outward link of
    /// `relation_type` pointing at any of `keys`, grouped by the referenced
    /// key. This is the targeted per-level query hierarchy resolution relies
    /// on; implementations must not scan the whole task population.
    fn referencing(&self, keys: &[String], relation_type: &str) -> HashMap<String, Vec<String>>;

    /// Whether a task with this key exists in storage. Links may reference
    /// tasks that have since been deleted.
    fn task_exists(&self, key: &str) -> bool;
}
