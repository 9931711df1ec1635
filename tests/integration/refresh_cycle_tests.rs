//! Refresh cycle integration tests
//!
//! Drives the refresh loop against an in-memory row counter and checks the
//! published file and the HTTP rendering agree.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

use sormas_usage_exporter::config::RefreshConfig;
use sormas_usage_exporter::db::RowCounter;
use sormas_usage_exporter::error::DbError;
use sormas_usage_exporter::metrics::{self as usage_metrics, AppState, GaugeSnapshot};
use sormas_usage_exporter::publish::{SnapshotPublisher, SNAPSHOT_FILE_NAME};
use sormas_usage_exporter::{GaugeSet, RefreshLoop};

/// Row counter backed by a mutable table map
struct TableCounts(Mutex<HashMap<String, u64>>);

impl TableCounts {
    fn new(rows: &[(&str, u64)]) -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            rows.iter().map(|(t, n)| (t.to_string(), *n)).collect(),
        )))
    }

    fn set(&self, table: &str, count: u64) {
        self.0.lock().insert(table.to_string(), count);
    }
}

#[async_trait]
impl RowCounter for TableCounts {
    async fn count_rows(&self, table: &str) -> Result<u64, DbError> {
        self.0
            .lock()
            .get(table)
            .copied()
            .ok_or_else(|| DbError::Other(format!("missing table {}", table)))
    }
}

fn sormas_rows() -> Vec<(&'static str, u64)> {
    vec![
        ("contact", 10),
        ("cases", 3),
        ("events", 0),
        ("users", 5),
        ("person", 12),
        ("pg_stat_activity", 2),
        ("task", 7),
    ]
}

fn with_output(dir: &std::path::Path) -> RefreshConfig {
    RefreshConfig {
        interval_secs: 1,
        output_dir: Some(dir.to_path_buf()),
        ..RefreshConfig::default()
    }
}

fn values(snapshot: &GaugeSnapshot) -> Vec<(&'static str, u64)> {
    snapshot.iter().map(|(t, v)| (t.metric, v)).collect()
}

async fn scrape(gauges: Arc<GaugeSet>) -> String {
    let app = usage_metrics::router(AppState::new(gauges, None));
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_example_counts_reach_file_and_http() {
    let dir = tempfile::tempdir().unwrap();
    let gauges = Arc::new(GaugeSet::new());
    let refresh = RefreshLoop::new(
        TableCounts::new(&sormas_rows()),
        gauges.clone(),
        &with_output(dir.path()),
    );

    refresh.run_cycle().await.unwrap();

    let file = std::fs::read_to_string(dir.path().join(SNAPSHOT_FILE_NAME)).unwrap();
    let value_lines: Vec<&str> = file
        .lines()
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();
    assert_eq!(
        value_lines,
        vec![
            "sormas_usage_cases 3",
            "sormas_usage_contacts 10",
            "sormas_usage_events 0",
            "sormas_usage_persons 12",
            "sormas_usage_sessions 2",
            "sormas_usage_tasks 7",
            "sormas_usage_users 5",
        ]
    );

    assert_eq!(scrape(gauges).await, file);
}

#[tokio::test]
async fn test_unchanged_data_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let gauges = Arc::new(GaugeSet::new());
    let refresh = RefreshLoop::new(
        TableCounts::new(&sormas_rows()),
        gauges.clone(),
        &with_output(dir.path()),
    );
    let path = dir.path().join(SNAPSHOT_FILE_NAME);

    let first = refresh.run_cycle().await.unwrap();
    let first_file = std::fs::read(&path).unwrap();
    let second = refresh.run_cycle().await.unwrap();
    let second_file = std::fs::read(&path).unwrap();

    assert_eq!(values(&first), values(&second));
    assert_eq!(first_file, second_file);
}

#[tokio::test]
async fn test_changed_count_visible_after_next_cycle() {
    let gauges = Arc::new(GaugeSet::new());
    let counts = TableCounts::new(&sormas_rows());
    let refresh = RefreshLoop::new(
        counts.clone(),
        gauges.clone(),
        &RefreshConfig::default(),
    );

    refresh.run_cycle().await.unwrap();
    counts.set("cases", 4);
    assert_eq!(gauges.snapshot().get("cases"), Some(3));
    assert!(scrape(gauges.clone()).await.contains("\nsormas_usage_cases 3\n"));

    refresh.run_cycle().await.unwrap();
    assert_eq!(gauges.snapshot().get("cases"), Some(4));
    assert!(scrape(gauges).await.contains("\nsormas_usage_cases 4\n"));
}

#[tokio::test]
async fn test_every_metric_appears_once() {
    let dir = tempfile::tempdir().unwrap();
    let gauges = Arc::new(GaugeSet::new());
    let refresh = RefreshLoop::new(
        TableCounts::new(&sormas_rows()),
        gauges.clone(),
        &with_output(dir.path()),
    );
    refresh.run_cycle().await.unwrap();

    let file = std::fs::read_to_string(dir.path().join(SNAPSHOT_FILE_NAME)).unwrap();
    let body = scrape(gauges).await;
    for tracked in &usage_metrics::TRACKED_TABLES {
        let type_line = format!("# TYPE {} gauge", tracked.metric);
        assert_eq!(file.lines().filter(|l| *l == type_line).count(), 1);
        assert_eq!(body.lines().filter(|l| *l == type_line).count(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_readers_never_see_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = SnapshotPublisher::new(dir.path());
    let target = publisher.target_path().to_path_buf();

    let gauges = GaugeSet::new();
    let mut low = usage_metrics::CycleCounts::default();
    let mut high = usage_metrics::CycleCounts::default();
    for tracked in &usage_metrics::TRACKED_TABLES {
        low.record_named(tracked.name, 1);
        high.record_named(tracked.name, 1_000_000_000);
    }
    let low = gauges.apply(&low);
    let high = gauges.apply(&high);
    let valid = [
        usage_metrics::render_snapshot(&low),
        usage_metrics::render_snapshot(&high),
    ];

    publisher.publish(&low).await.unwrap();

    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let reader = {
        let stop = stop.clone();
        let valid = valid.clone();
        std::thread::spawn(move || {
            let mut reads = 0u64;
            loop {
                let content = std::fs::read_to_string(&target).unwrap();
                assert!(valid.contains(&content), "observed partial snapshot");
                reads += 1;
                if stop.load(std::sync::atomic::Ordering::Relaxed) {
                    return reads;
                }
            }
        })
    };

    for i in 0..200 {
        let snapshot = if i % 2 == 0 { &high } else { &low };
        publisher.publish(snapshot).await.unwrap();
    }
    stop.store(true, std::sync::atomic::Ordering::Relaxed);

    assert!(reader.join().unwrap() > 0);
}
