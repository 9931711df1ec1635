//! Exporter self-metrics
//!
//! Refresh loop health, recorded through the `metrics` facade and rendered by
//! the Prometheus recorder after the usage gauges on `/metrics`.

use anyhow::Result;
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const REFRESH_CYCLES_TOTAL: &str = "sormas_exporter_refresh_cycles_total";
pub const QUERY_FAILURES_TOTAL: &str = "sormas_exporter_query_failures_total";
pub const PUBLISH_FAILURES_TOTAL: &str = "sormas_exporter_publish_failures_total";
pub const REFRESH_DURATION_SECONDS: &str = "sormas_exporter_refresh_duration_seconds";
pub const LAST_REFRESH_TIMESTAMP: &str = "sormas_exporter_last_refresh_timestamp_seconds";

/// Install the global Prometheus recorder and describe the self-metrics
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    describe_counter!(REFRESH_CYCLES_TOTAL, "Completed refresh cycles");
    describe_counter!(QUERY_FAILURES_TOTAL, "Failed or timed out count queries, by table");
    describe_counter!(PUBLISH_FAILURES_TOTAL, "Failed snapshot file publishes");
    describe_histogram!(
        REFRESH_DURATION_SECONDS,
        Unit::Seconds,
        "Wall time of one refresh cycle"
    );
    describe_gauge!(
        LAST_REFRESH_TIMESTAMP,
        Unit::Seconds,
        "Unix time of the last completed refresh cycle"
    );
}

/// Periodically drain recorder buffers so summaries stay bounded
pub fn spawn_upkeep(handle: PrometheusHandle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            handle.run_upkeep();
        }
    })
}
