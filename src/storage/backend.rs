//! Row store trait definition
//!
//! This module defines the `RowStore` trait that the publish loop writes
//! through. A store wraps exactly one open connection; it is created at the
//! start of a publish call and closed at its end.

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::{MetricRow, TableName};

/// Destination for metric rows
///
/// ## Error Handling
///
/// An insert into a table that does not exist must fail with
/// `StorageError::MissingTable` so the caller can schedule table creation.
/// All other failures map to `StorageError::Query`.
#[async_trait]
pub trait RowStore: Send {
    /// Insert a single row into `table`
    async fn insert_row(&mut self, table: &TableName, row: &MetricRow) -> StorageResult<()>;

    /// Create `table` and its `key_index` if the table is absent
    ///
    /// Fails with `StorageError::TableCreation` if either statement fails,
    /// including an index name collision on a table created by hand.
    async fn ensure_table(&mut self, table: &TableName) -> StorageResult<()>;

    /// Release the underlying connection
    async fn close(self) -> StorageResult<()>
    where
        Self: Sized;
}
