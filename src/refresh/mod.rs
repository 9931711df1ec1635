//! Refresh loop
//!
//! Periodically counts every tracked table, swaps the new values into the
//! gauge set and, when configured, publishes the snapshot file.
//!
//! The loop alternates between two states, starting in `Collecting`:
//! `Collecting` runs one cycle, `Sleeping` waits for the interval or a
//! shutdown signal.

use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::{PublishErrorPolicy, QueryErrorPolicy, RefreshConfig};
use crate::db::RowCounter;
use crate::error::RefreshError;
use crate::metrics::{
    CycleCounts, GaugeSet, GaugeSnapshot, LAST_REFRESH_TIMESTAMP,
    PUBLISH_FAILURES_TOTAL, QUERY_FAILURES_TOTAL, REFRESH_CYCLES_TOTAL,
    REFRESH_DURATION_SECONDS, TRACKED_TABLES,
};
use crate::publish::SnapshotPublisher;

/// Refresh loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Collecting,
    Sleeping,
}

/// Drives collection and publication
pub struct RefreshLoop<C> {
    counter: C,
    gauges: Arc<GaugeSet>,
    publisher: Option<SnapshotPublisher>,
    interval: Duration,
    on_query_error: QueryErrorPolicy,
    on_publish_error: PublishErrorPolicy,
}

impl<C: RowCounter> RefreshLoop<C> {
    /// Create a loop; file output is enabled when `config.output_dir` is set
    pub fn new(counter: C, gauges: Arc<GaugeSet>, config: &RefreshConfig) -> Self {
        Self {
            counter,
            gauges,
            publisher: config.output_dir.as_ref().map(SnapshotPublisher::new),
            interval: config.interval(),
            on_query_error: config.on_query_error,
            on_publish_error: config.on_publish_error,
        }
    }

    /// Run one collection cycle and return the snapshot it produced
    pub async fn run_cycle(&self) -> Result<Arc<GaugeSnapshot>, RefreshError> {
        let started = Instant::now();

        let mut counts = CycleCounts::default();
        for (idx, tracked) in TRACKED_TABLES.iter().enumerate() {
            match self.counter.count_rows(tracked.table).await {
                Ok(count) => counts.record(idx, count),
                Err(e) => {
                    counter!(QUERY_FAILURES_TOTAL, "table" => tracked.table).increment(1);
                    if self.on_query_error == QueryErrorPolicy::Abort {
                        error!(table = tracked.table, error = %e, "Count query failed");
                        return Err(e.into());
                    }
                    warn!(
                        table = tracked.table,
                        error = %e,
                        "Count query failed, keeping last known value"
                    );
                }
            }
        }

        // All queries are done; nothing below blocks on the database.
        let snapshot = self.gauges.apply(&counts);
        info!(
            generation = snapshot.generation(),
            failed = counts.failed_count(),
            counts = %snapshot,
            "Refresh cycle complete"
        );

        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(&snapshot).await {
                counter!(PUBLISH_FAILURES_TOTAL).increment(1);
                if self.on_publish_error == PublishErrorPolicy::Abort {
                    error!(error = %e, "Snapshot publish failed");
                    return Err(e.into());
                }
                warn!(error = %e, "Snapshot publish failed, skipping this cycle");
            }
        }

        counter!(REFRESH_CYCLES_TOTAL).increment(1);
        histogram!(REFRESH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        if let Ok(now) = SystemTime::now().duration_since(UNIX_EPOCH) {
            gauge!(LAST_REFRESH_TIMESTAMP).set(now.as_secs_f64());
        }

        Ok(snapshot)
    }

    /// Run until shutdown is signalled or a failure policy aborts
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), RefreshError> {
        info!(
            interval_secs = self.interval.as_secs(),
            file_output = ?self.publisher.as_ref().map(|p| p.target_path()),
            "Refresh loop started"
        );

        let mut state = LoopState::Collecting;
        loop {
            match state {
                LoopState::Collecting => {
                    self.run_cycle().await?;
                    state = LoopState::Sleeping;
                }
                LoopState::Sleeping => {
                    debug!(interval = ?self.interval, "Sleeping until next cycle");
                    tokio::select! {
                        _ = tokio::time::sleep(self.interval) => state = LoopState::Collecting,
                        _ = shutdown.changed() => {
                            info!("Refresh loop stopped");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
