//! Metrics and observability
//!
//! The usage gauge set, its text rendering and HTTP surface, plus the
//! exporter's own Prometheus self-metrics.

mod api;
mod exporter;
mod gauges;
mod render;
mod tables;

pub use api::{router, serve, AppState};
pub use exporter::*;
pub use gauges::{CycleCounts, GaugeSet, GaugeSnapshot};
pub use render::{render_snapshot, CONTENT_TYPE};
pub use tables::{index_of, TrackedTable, TRACKED_COUNT, TRACKED_TABLES};
