//! Database access
//!
//! The refresh loop only needs row counts, so the database is reached
//! through the narrow [`RowCounter`] seam.

mod postgres;

pub use postgres::PostgresCounter;

use async_trait::async_trait;

use crate::error::DbError;

/// Counts the rows of a named table or view
#[async_trait]
pub trait RowCounter: Send + Sync {
    async fn count_rows(&self, table: &str) -> Result<u64, DbError>;
}

#[async_trait]
impl<T: RowCounter + ?Sized> RowCounter for std::sync::Arc<T> {
    async fn count_rows(&self, table: &str) -> Result<u64, DbError> {
        (**self).count_rows(table).await
    }
}
