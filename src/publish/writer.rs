//! Atomic snapshot writer
//!
//! The snapshot is written to a temporary file next to the target, synced,
//! and renamed over the target. Readers of the target path see either the
//! previous complete file or the new one.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::PublishError;
use crate::metrics::{render_snapshot, GaugeSnapshot};

/// Name of the published snapshot file
pub const SNAPSHOT_FILE_NAME: &str = "sormas-usage.prom";
/// Name of the temporary file; the textfile collector ignores it
pub const TEMP_FILE_NAME: &str = "sormas-usage.prom.temp";

/// Publishes gauge snapshots into an output directory
#[derive(Debug, Clone)]
pub struct SnapshotPublisher {
    target: PathBuf,
    temp: PathBuf,
}

impl SnapshotPublisher {
    /// Publisher writing into `dir`; the directory must already exist
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            target: dir.join(SNAPSHOT_FILE_NAME),
            temp: dir.join(TEMP_FILE_NAME),
        }
    }

    /// Path readers poll
    pub fn target_path(&self) -> &Path {
        &self.target
    }

    /// Render and atomically publish a snapshot
    pub async fn publish(&self, snapshot: &GaugeSnapshot) -> Result<(), PublishError> {
        let body = render_snapshot(snapshot);
        self.write_atomic(body.as_bytes()).await?;
        debug!(
            path = ?self.target,
            generation = snapshot.generation(),
            bytes = body.len(),
            "Snapshot published"
        );
        Ok(())
    }

    async fn write_atomic(&self, data: &[u8]) -> Result<(), PublishError> {
        let write_err = |source: std::io::Error| PublishError::Write {
            path: self.temp.clone(),
            source,
        };

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp)
            .await
            .map_err(write_err)?;
        file.write_all(data).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        fs::rename(&self.temp, &self.target)
            .await
            .map_err(|source| PublishError::Rename {
                from: self.temp.clone(),
                to: self.target.clone(),
                source,
            })
    }
}
