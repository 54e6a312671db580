//! End-to-end report assembly over a seeded database.

use cadence::config::{GroupBy, ReportConfig, StatusMapping};
use cadence::db::Database;
use cadence::db::import::import_snapshot;
use cadence::report::{ReportAssembler, ReportWindow};
use cadence::types::StatusHistoryEntry;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

fn entry(status: &str, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> StatusHistoryEntry {
    StatusHistoryEntry {
        status: status.to_lowercase(),
        status_display: status.to_string(),
        start,
        end,
    }
}

fn config() -> ReportConfig {
    ReportConfig {
        status_mapping: StatusMapping {
            done: vec!["Closed".into()],
            in_progress: vec!["In Progress".into()],
            ready_for_dev: vec!["Ready".into()],
            paused: vec!["On Hold".into()],
            returns: vec!["Testing".into()],
            tracked: vec![],
        },
        ..Default::default()
    }
}

/// FULL-1 (parent, ivanov) with subtask FULL-2 (petrov, declared by the
/// child's outward link).
fn seed(db: &Database) {
    let parent = db
        .upsert_task("FULL-1", Some("Parent"), Some("ivanov"), Some("FULL"), day(10), &[])
        .unwrap();
    for e in [
        entry("Open", day(10), Some(day(11))),
        entry("Ready", day(11), Some(day(12))),
        entry("In Progress", day(12), Some(day(14))),
        entry("Testing", day(14), Some(day(15))),
        entry("In Progress", day(15), Some(day(16))),
        entry("Testing", day(16), Some(day(17))),
        entry("Closed", day(17), None),
    ] {
        db.insert_history_entry(parent, &e).unwrap();
    }

    let child = db
        .upsert_task(
            "FULL-2",
            Some("Child"),
            Some("petrov"),
            Some("FULL"),
            day(10),
            &[json!({
                "type": {"id": "subtask"},
                "direction": "outward",
                "object": {"key": "FULL-1"}
            })],
        )
        .unwrap();
    for e in [
        entry("Open", day(10), Some(day(11))),
        entry("Testing", day(11), Some(day(12))),
        entry("In Progress", day(12), Some(day(13))),
        entry("Testing", day(13), None),
    ] {
        db.insert_history_entry(child, &e).unwrap();
    }
}

#[tokio::test]
async fn report_joins_metrics_grouping_and_hierarchy_returns() {
    let db = Database::open_in_memory().unwrap();
    seed(&db);

    let assembler = ReportAssembler::new(Arc::new(db), config());
    let report = assembler.assemble(ReportWindow::default()).await.unwrap();

    assert_eq!(report.rows.len(), 2);
    let parent = &report.rows[0];
    assert_eq!(parent.key, "FULL-1");
    assert_eq!(parent.group, "ivanov");
    assert_eq!(parent.quarter, "2024-Q1");
    assert_eq!(parent.metrics.time_to_market_days, Some(7));
    assert_eq!(parent.metrics.time_to_delivery_days, Some(1));
    assert_eq!(parent.metrics.dev_lead_time_days, Some(5));
    assert_eq!(parent.metrics.pause_hours, Some(0));
    assert_eq!(parent.returns.get("Testing"), Some(&1));
    // Own return plus the child's one return.
    assert_eq!(parent.hierarchy_returns.get("Testing"), Some(&2));
    assert_eq!(parent.hierarchy_size, 2);

    let child = &report.rows[1];
    assert_eq!(child.key, "FULL-2");
    assert_eq!(child.group, "petrov");
    // Never closed: undefined, not zero.
    assert_eq!(child.metrics.time_to_market_days, None);
    assert_eq!(child.returns.get("Testing"), Some(&1));
    assert_eq!(child.hierarchy_size, 1);

    assert_eq!(report.summaries.len(), 2);
    let ivanov = report
        .summaries
        .iter()
        .find(|s| s.group == "ivanov")
        .unwrap();
    assert_eq!(ivanov.tasks, 1);
    assert_eq!(ivanov.avg_time_to_market_days, Some(7.0));

    let petrov = report
        .summaries
        .iter()
        .find(|s| s.group == "petrov")
        .unwrap();
    assert_eq!(petrov.avg_time_to_market_days, None);
}

#[tokio::test]
async fn report_window_excludes_tasks_outside_range() {
    let db = Database::open_in_memory().unwrap();
    seed(&db);

    let assembler = ReportAssembler::new(Arc::new(db), config());
    let window = ReportWindow {
        from: NaiveDate::from_ymd_opt(2024, 2, 1),
        to: None,
    };

    let report = assembler.assemble(window).await.unwrap();
    assert!(report.rows.is_empty());
    assert!(report.summaries.is_empty());
}

#[tokio::test]
async fn team_grouping_merges_authors() {
    let db = Database::open_in_memory().unwrap();
    seed(&db);

    let mut cfg = config();
    cfg.group_by = GroupBy::Team;
    cfg.teams.insert("ivanov".into(), "core".into());
    cfg.teams.insert("petrov".into(), "core".into());

    let assembler = ReportAssembler::new(Arc::new(db), cfg);
    let report = assembler.assemble(ReportWindow::default()).await.unwrap();

    assert!(report.rows.iter().all(|r| r.group == "core"));
    assert_eq!(report.summaries.len(), 1);
    let cell = &report.summaries[0];
    assert_eq!(cell.tasks, 2);
    // Only the closed task contributes to the average.
    assert_eq!(cell.avg_time_to_market_days, Some(7.0));
    // FULL-1's hierarchy includes FULL-2, whose own row counts again.
    assert_eq!(cell.total_returns.get("Testing"), Some(&3));
}

#[tokio::test]
async fn import_then_report_round_trip() {
    let db = Database::open_in_memory().unwrap();

    let snapshot = json!([
        {
            "key": "FULL-1",
            "author": "ivanov",
            "queue": "FULL",
            "created_at": "2024-01-10T00:00:00Z",
            "links": [],
            "history": [
                {"status": "open", "status_display": "Open",
                 "start": "2024-01-10T00:00:00Z", "end": "2024-01-12T00:00:00Z"},
                {"status": "closed", "status_display": "Closed",
                 "start": "2024-01-12T00:00:00Z"},
                {"bogus": true}
            ]
        },
        null,
        {"summary": "missing key and created_at"}
    ]);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{snapshot}").unwrap();

    let summary = import_snapshot(&db, file.path()).unwrap();
    assert_eq!(summary.tasks, 1);
    assert_eq!(summary.entries, 2);
    assert_eq!(summary.skipped_tasks, 2);
    assert_eq!(summary.skipped_entries, 1);

    let assembler = ReportAssembler::new(Arc::new(db), config());
    let report = assembler.assemble(ReportWindow::default()).await.unwrap();
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].metrics.time_to_market_days, Some(2));
}

#[tokio::test]
async fn reimport_replaces_history() {
    let db = Database::open_in_memory().unwrap();

    let first = json!([{
        "key": "FULL-1",
        "created_at": "2024-01-10T00:00:00Z",
        "history": [
            {"status": "open", "status_display": "Open", "start": "2024-01-10T00:00:00Z"}
        ]
    }]);
    let second = json!([{
        "key": "FULL-1",
        "created_at": "2024-01-10T00:00:00Z",
        "history": [
            {"status": "open", "status_display": "Open",
             "start": "2024-01-10T00:00:00Z", "end": "2024-01-11T00:00:00Z"},
            {"status": "closed", "status_display": "Closed", "start": "2024-01-11T00:00:00Z"}
        ]
    }]);

    for snapshot in [first, second] {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{snapshot}").unwrap();
        import_snapshot(&db, file.path()).unwrap();
    }

    let history = db.history_for_key("FULL-1").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].status_display, "Closed");
}
