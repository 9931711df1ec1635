//! Snapshot file publishing
//!
//! Writes the rendered gauge snapshot for a file-based collector such as the
//! node-exporter textfile collector.

mod writer;

pub use writer::{SnapshotPublisher, SNAPSHOT_FILE_NAME, TEMP_FILE_NAME};
