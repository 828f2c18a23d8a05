//! In-memory row store (no persistence)
//!
//! This store keeps tables in a map. It's useful for:
//! - Testing the publish loop without a database
//! - `--dry-run` publishing from the command line
//!
//! It follows the same table lifecycle as PostgreSQL: inserting into a table
//! that was never created fails with `StorageError::MissingTable`, and
//! creating `key_index` a second time in the same schema fails with a name
//! collision.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use super::backend::RowStore;
use super::error::{StorageError, StorageResult};
use super::schema::{INDEX_NAME, MetricRow, TableName};

/// In-memory row store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: HashMap<String, Vec<MetricRow>>,

    /// Schema-qualified index name to indexed table
    indexes: HashMap<String, String>,

    /// Statements executed so far, in order
    statements: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds `table` without its index, like a table
    /// created by hand
    pub fn with_table(table: &TableName) -> Self {
        let mut store = Self::new();
        store.tables.insert(table.as_str().to_string(), Vec::new());
        store
    }

    /// Rows written to `table`, or `None` if it does not exist
    pub fn rows(&self, table: &TableName) -> Option<&[MetricRow]> {
        self.tables.get(table.as_str()).map(Vec::as_slice)
    }

    pub fn has_table(&self, table: &TableName) -> bool {
        self.tables.contains_key(table.as_str())
    }

    pub fn has_index(&self, table: &TableName) -> bool {
        self.indexes.values().any(|t| t == table.as_str())
    }

    /// Number of statements issued against the store
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn insert_row(&mut self, table: &TableName, row: &MetricRow) -> StorageResult<()> {
        self.statements.push(table.insert_sql());

        match self.tables.get_mut(table.as_str()) {
            Some(rows) => {
                debug!("in-memory insert into {}: {} = {}", table, row.key, row.value);
                rows.push(row.clone());
                Ok(())
            }
            None => Err(StorageError::MissingTable {
                table: table.to_string(),
                message: format!("relation \"{}\" does not exist", table),
            }),
        }
    }

    async fn ensure_table(&mut self, table: &TableName) -> StorageResult<()> {
        self.statements.push(table.create_table_sql());
        self.tables.entry(table.as_str().to_string()).or_default();

        self.statements.push(table.create_index_sql());
        let index = format!("{}.{}", table.schema(), INDEX_NAME);
        if self.indexes.contains_key(&index) {
            return Err(StorageError::TableCreation {
                table: table.to_string(),
                message: format!("relation \"{}\" already exists", INDEX_NAME),
            });
        }
        self.indexes.insert(index, table.as_str().to_string());

        debug!("in-memory table {} created", table);
        Ok(())
    }

    async fn close(self) -> StorageResult<()> {
        debug!("closing in-memory store (no-op)");
        Ok(())
    }
}
