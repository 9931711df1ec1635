//! Error types
//!
//! Library-level errors. The binary wraps these in `anyhow` at the boundary.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Row count query errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("count query on table {table} failed: {source}")]
    Query {
        table: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("count query on table {table} timed out after {timeout:?}")]
    Timeout { table: String, timeout: Duration },

    #[error("table {table} returned a negative row count ({count})")]
    NegativeCount { table: String, count: i64 },

    #[error("{0}")]
    Other(String),
}

/// Snapshot file publish errors
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to write temporary snapshot {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to rename {from:?} to {to:?}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that stop the refresh loop
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("aborting refresh loop on query failure: {0}")]
    Query(#[from] DbError),

    #[error("aborting refresh loop on publish failure: {0}")]
    Publish(#[from] PublishError),
}
