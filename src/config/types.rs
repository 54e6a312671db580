//! Configuration types and defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Grouping axis for report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Author,
    Team,
}

/// Which literal status display names fill each semantic role.
///
/// Status names are opaque strings matched case-sensitively against the
/// tracker-supplied display values; no normalization is performed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMapping {
    /// Terminal statuses: the task shipped.
    #[serde(default = "default_done")]
    pub done: Vec<String>,

    /// Active development statuses.
    #[serde(default = "default_in_progress")]
    pub in_progress: Vec<String>,

    /// Discovery finished, ready to be picked up.
    #[serde(default = "default_ready_for_dev")]
    pub ready_for_dev: Vec<String>,

    /// Statuses whose dwell time counts as pause.
    #[serde(default = "default_paused")]
    pub paused: Vec<String>,

    /// Statuses whose re-entries are counted as returns.
    #[serde(default = "default_returns")]
    pub returns: Vec<String>,

    /// Statuses whose total dwell time is reported per task.
    #[serde(default)]
    pub tracked: Vec<String>,
}

impl Default for StatusMapping {
    fn default() -> Self {
        Self {
            done: default_done(),
            in_progress: default_in_progress(),
            ready_for_dev: default_ready_for_dev(),
            paused: default_paused(),
            returns: default_returns(),
            tracked: Vec::new(),
        }
    }
}

fn default_done() -> Vec<String> {
    vec!["Done".into(), "Closed".into()]
}

fn default_in_progress() -> Vec<String> {
    vec!["In Progress".into()]
}

fn default_ready_for_dev() -> Vec<String> {
    vec!["Ready for Dev".into()]
}

fn default_paused() -> Vec<String> {
    vec!["On Hold".into(), "Paused".into()]
}

fn default_returns() -> Vec<String> {
    vec!["Testing".into()]
}

/// How subordinate-task closures are discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Link relation type that defines the parent/child edge.
    #[serde(default = "default_relation_type")]
    pub relation_type: String,

    /// Restrict discovered descendants to keys/queues with this prefix.
    #[serde(default)]
    pub queue_prefix: Option<String>,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            relation_type: default_relation_type(),
            queue_prefix: None,
        }
    }
}

fn default_relation_type() -> String {
    "subtask".to_string()
}

/// Top-level report configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub status_mapping: StatusMapping,

    /// Minimum minutes a non-terminal, non-initial status must be held;
    /// shorter entries are treated as flicker.
    #[serde(default = "default_flicker_threshold_minutes")]
    pub flicker_threshold_minutes: i64,

    #[serde(default)]
    pub group_by: GroupBy,

    /// Author login -> team name. Unmapped authors group under their login.
    #[serde(default)]
    pub teams: HashMap<String, String>,

    /// Only report on tasks in this queue.
    #[serde(default)]
    pub queue: Option<String>,

    #[serde(default)]
    pub hierarchy: HierarchyConfig,

    /// Upper bound on concurrent per-root resolutions.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            status_mapping: StatusMapping::default(),
            flicker_threshold_minutes: default_flicker_threshold_minutes(),
            group_by: GroupBy::default(),
            teams: HashMap::new(),
            queue: None,
            hierarchy: HierarchyConfig::default(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_flicker_threshold_minutes() -> i64 {
    5
}

fn default_concurrency() -> usize {
    8
}

impl ReportConfig {
    /// Warn about configurations that will degrade output. Report generation
    /// still runs for whatever can be processed.
    pub fn validate(&self) {
        if self.status_mapping.done.is_empty() {
            warn!("status_mapping.done is empty; time-to-market will be undefined for every task");
        }
        if self.status_mapping.returns.is_empty() {
            warn!("status_mapping.returns is empty; no returns will be counted");
        }
        if self.flicker_threshold_minutes < 0 {
            warn!(
                minutes = self.flicker_threshold_minutes,
                "negative flicker threshold, treating as 0"
            );
        }
        if self.concurrency == 0 {
            warn!("concurrency 0 is treated as 1");
        }
    }

    /// Resolve the grouping value for an author under the configured axis.
    pub fn group_for(&self, author: Option<&str>) -> String {
        let author = author.unwrap_or("unassigned");
        match self.group_by {
            GroupBy::Author => author.to_string(),
            GroupBy::Team => self
                .teams
                .get(author)
                .cloned()
                .unwrap_or_else(|| author.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = ReportConfig::default();
        assert_eq!(config.flicker_threshold_minutes, 5);
        assert_eq!(config.group_by, GroupBy::Author);
        assert_eq!(config.hierarchy.relation_type, "subtask");
        assert!(!config.status_mapping.done.is_empty());
    }

    #[test]
    fn group_for_author_axis_uses_login() {
        let config = ReportConfig::default();
        assert_eq!(config.group_for(Some("ivanov")), "ivanov");
        assert_eq!(config.group_for(None), "unassigned");
    }

    #[test]
    fn group_for_team_axis_maps_through_table() {
        let mut config = ReportConfig {
            group_by: GroupBy::Team,
            ..Default::default()
        };
        config.teams.insert("ivanov".into(), "billing".into());

        assert_eq!(config.group_for(Some("ivanov")), "billing");
        // Unmapped authors fall back to the login.
        assert_eq!(config.group_for(Some("petrov")), "petrov");
    }

    #[test]
    fn yaml_roundtrip_with_partial_fields() {
        let yaml = r#"
status_mapping:
  done: ["Закрыт"]
  returns: ["Тестирование", "Внешний тест"]
group_by: team
teams:
  ivanov: billing
queue: FULLSTACK
hierarchy:
  queue_prefix: FULLSTACK
"#;

        let config: ReportConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.status_mapping.done, vec!["Закрыт"]);
        assert_eq!(config.status_mapping.returns.len(), 2);
        // Unspecified sections keep their defaults.
        assert_eq!(config.status_mapping.in_progress, vec!["In Progress"]);
        assert_eq!(config.flicker_threshold_minutes, 5);
        assert_eq!(config.group_by, GroupBy::Team);
        assert_eq!(config.hierarchy.relation_type, "subtask");
        assert_eq!(config.hierarchy.queue_prefix.as_deref(), Some("FULLSTACK"));
    }
}
