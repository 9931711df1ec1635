//! Gauge set
//!
//! The owned set of usage gauges. Readers always get a whole snapshot from a
//! single completed refresh cycle; the writer swaps snapshots under a lock that
//! is held only for the pointer swap.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use super::tables::{index_of, TrackedTable, TRACKED_COUNT, TRACKED_TABLES};

/// Immutable gauge values from one refresh cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaugeSnapshot {
    /// Number of cycles applied so far (0 = initial, nothing collected yet)
    generation: u64,
    values: [u64; TRACKED_COUNT],
}

impl GaugeSnapshot {
    /// Cycle number this snapshot was produced by
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Value for a short metric name
    pub fn get(&self, name: &str) -> Option<u64> {
        index_of(name).map(|idx| self.values[idx])
    }

    /// All gauges in render order
    pub fn iter(&self) -> impl Iterator<Item = (&'static TrackedTable, u64)> + '_ {
        TRACKED_TABLES.iter().zip(self.values.iter().copied())
    }
}

impl fmt::Display for GaugeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (tracked, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", tracked.name, value)?;
        }
        Ok(())
    }
}

/// Counts gathered during one cycle; `None` marks a failed query
#[derive(Debug, Clone, Default)]
pub struct CycleCounts {
    values: [Option<u64>; TRACKED_COUNT],
}

impl CycleCounts {
    /// Record the count for the table at `idx`
    pub fn record(&mut self, idx: usize, count: u64) {
        self.values[idx] = Some(count);
    }

    /// Record a count by short name. Returns false for unknown names.
    pub fn record_named(&mut self, name: &str, count: u64) -> bool {
        match index_of(name) {
            Some(idx) => {
                self.record(idx, count);
                true
            }
            None => false,
        }
    }

    /// Number of failed queries
    pub fn failed_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }
}

/// Shared gauge set
///
/// The refresh loop is the only writer. HTTP rendering and the file publisher
/// take snapshots.
#[derive(Debug)]
pub struct GaugeSet {
    current: RwLock<Arc<GaugeSnapshot>>,
}

impl GaugeSet {
    /// Create a gauge set with every value at zero
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(GaugeSnapshot {
                generation: 0,
                values: [0; TRACKED_COUNT],
            })),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<GaugeSnapshot> {
        self.current.read().clone()
    }

    /// Apply one cycle's counts and return the new snapshot.
    ///
    /// Gauges whose query failed keep their previous value.
    pub fn apply(&self, counts: &CycleCounts) -> Arc<GaugeSnapshot> {
        let mut current = self.current.write();

        let mut values = current.values;
        for (slot, count) in values.iter_mut().zip(counts.values.iter()) {
            if let Some(count) = count {
                *slot = *count;
            }
        }

        let next = Arc::new(GaugeSnapshot {
            generation: current.generation + 1,
            values,
        });
        *current = next.clone();
        next
    }
}

impl Default for GaugeSet {
    fn default() -> Self {
        Self::new()
    }
}
