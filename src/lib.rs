//! SORMAS usage exporter
//!
//! Periodically counts rows in a fixed set of SORMAS tables and exposes the
//! counts as Prometheus gauges over HTTP and, optionally, as an atomically
//! replaced textfile-collector snapshot.

pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod publish;
pub mod refresh;
pub mod util;

pub use config::Config;
pub use metrics::GaugeSet;
pub use refresh::RefreshLoop;

/// Exporter version for display
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
