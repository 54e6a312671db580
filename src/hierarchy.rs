//! Task hierarchy resolution over the typed link graph.
//!
//! A top-level task owns a closure of subordinate tasks reachable through a
//! directional relation (by default "subtask", inward). The graph is noisy:
//! links can point at deleted tasks, form cycles, or cross queues. Resolution
//! walks breadth-first with one batched lookup per level and an explicitly
//! owned visited set per call.

use crate::providers::TaskStore;
use crate::types::{LinkDirection, TaskLink};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Extract directly-related task keys of one relation type from a parsed
/// link snapshot.
///
/// Keeps links whose relation type matches exactly and whose direction is in
/// `allowed_directions`. When `queue_prefix` is given, the related key must
/// start with the prefix or the related queue name must match it. Malformed
/// snapshot entries were already dropped at parse time.
pub fn extract_related_keys(
    links: &[TaskLink],
    relation_type: &str,
    allowed_directions: &[LinkDirection],
    queue_prefix: Option<&str>,
) -> Vec<String> {
    links
        .iter()
        .filter(|link| link.relation_type == relation_type)
        .filter(|link| allowed_directions.contains(&link.direction))
        .filter(|link| match queue_prefix {
            None => true,
            Some(prefix) => {
                link.related_key.starts_with(prefix)
                    || link.related_queue.as_deref() == Some(prefix)
            }
        })
        .map(|link| link.related_key.clone())
        .collect()
}

/// Resolves subordinate-task closures from a [`TaskStore`].
///
/// The resolver is `Sync`; independent roots may be resolved concurrently.
/// A read-through cache of children per key is shared across resolutions
/// within one report run. It holds lookups only, never attribution, so two
/// roots with disjoint link graphs always produce disjoint hierarchies.
pub struct HierarchyResolver<S> {
    store: Arc<S>,
    relation_type: String,
    queue_prefix: Option<String>,
    children: Mutex<HashMap<String, Vec<String>>>,
}

impl<S: TaskStore> HierarchyResolver<S> {
    pub fn new(store: Arc<S>, relation_type: impl Into<String>) -> Self {
        Self {
            store,
            relation_type: relation_type.into(),
            queue_prefix: None,
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Restrict discovered descendants to one queue.
    pub fn with_queue_prefix(mut self, prefix: Option<String>) -> Self {
        self.queue_prefix = prefix;
        self
    }

    /// `[root] +` all transitive descendants, breadth-first.
    ///
    /// The visited set is owned by this call: a key already expanded in the
    /// current resolution is not expanded again, so cycles terminate and the
    /// key is still included once via whichever ancestor reached it first.
    /// When every lookup for the root fails, the result degrades to
    /// `[root]`.
    pub fn hierarchy(&self, root_key: &str) -> Vec<String> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(root_key.to_string());
        let mut order = vec![root_key.to_string()];
        let mut frontier = vec![root_key.to_string()];

        while !frontier.is_empty() {
            self.populate_children(&frontier);

            let cache = self.children.lock().unwrap();
            let mut next = Vec::new();
            for key in &frontier {
                let Some(children) = cache.get(key) else {
                    continue;
                };
                for child in children {
                    if visited.insert(child.clone()) {
                        order.push(child.clone());
                        next.push(child.clone());
                    }
                }
            }
            drop(cache);

            frontier = next;
        }

        debug!(root = root_key, size = order.len(), "resolved hierarchy");
        order
    }

    /// Resolve several roots in one pass.
    ///
    /// Each root's closure is computed independently; only the per-key
    /// children lookups are reused through the shared cache. A task
    /// discovered under one root is never attributed to another root that
    /// did not transitively reach it.
    pub fn hierarchies(&self, roots: &[String]) -> HashMap<String, Vec<String>> {
        roots
            .iter()
            .map(|root| (root.clone(), self.hierarchy(root)))
            .collect()
    }

    /// Fill the children cache for every frontier key not yet resolved.
    ///
    /// One batched lookup per level: the frontier tasks' own link snapshots
    /// (inward children, gated by existence) plus the reverse query for
    /// tasks that reference a frontier key outward. Never scans the task
    /// population.
    fn populate_children(&self, frontier: &[String]) {
        let missing: Vec<String> = {
            let cache = self.children.lock().unwrap();
            frontier
                .iter()
                .filter(|key| !cache.contains_key(*key))
                .cloned()
                .collect()
        };
        if missing.is_empty() {
            return;
        }

        let snapshots = self.store.links_for(&missing);
        let referencing = self.store.referencing(&missing, &self.relation_type);

        let mut resolved: Vec<(String, Vec<String>)> = Vec::with_capacity(missing.len());
        for key in missing {
            let mut children: Vec<String> = Vec::new();

            if let Some(links) = snapshots.get(&key) {
                for related in extract_related_keys(
                    links,
                    &self.relation_type,
                    &[LinkDirection::Inward],
                    self.queue_prefix.as_deref(),
                ) {
                    // The snapshot may reference tasks deleted since it was taken.
                    if self.store.task_exists(&related) {
                        children.push(related);
                    }
                }
            }

            if let Some(referrers) = referencing.get(&key) {
                for child in referrers {
                    if self
                        .queue_prefix
                        .as_deref()
                        .is_none_or(|prefix| child.starts_with(prefix))
                    {
                        children.push(child.clone());
                    }
                }
            }

            let mut seen = HashSet::new();
            children.retain(|child| seen.insert(child.clone()));
            resolved.push((key, children));
        }

        let mut cache = self.children.lock().unwrap();
        for (key, children) in resolved {
            cache.insert(key, children);
        }
    }
}
