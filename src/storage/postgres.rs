//! PostgreSQL row store implementation
//!
//! This module provides a `RowStore` backed by a single `PgConnection`.
//!
//! ## Connection lifecycle
//!
//! - One connection per publish call, no pooling
//! - The connection is pinged right after the handshake
//! - `close` sends a graceful terminate; dropping the store also releases the socket
//!
//! ## Missing tables
//!
//! Inserts into a missing table are recognised by SQLSTATE `42P01`
//! (`undefined_table`) and reported as `StorageError::MissingTable`.

use async_trait::async_trait;
use sqlx::{Connection, PgConnection};
use tracing::{debug, error, info, instrument};

use super::backend::RowStore;
use super::error::{StorageError, StorageResult, is_undefined_table};
use super::schema::{MetricRow, TableName};
use crate::config::ConnectionConfig;

/// PostgreSQL row store
pub struct PostgresStore {
    conn: PgConnection,
    target: String,
}

impl PostgresStore {
    /// Open a connection and ping it
    ///
    /// Fails with `StorageError::Connection` if either the handshake or the
    /// ping fails; no other statement is issued.
    #[instrument(skip_all, fields(target = %config.target()))]
    pub async fn connect(config: &ConnectionConfig) -> StorageResult<Self> {
        let target = config.target();
        debug!("connecting to PostgreSQL");

        let mut conn = PgConnection::connect_with(&config.connect_options())
            .await
            .map_err(|e| {
                error!("connection to {} failed: {}", target, e);
                StorageError::Connection(e.to_string())
            })?;

        if let Err(e) = conn.ping().await {
            error!("ping to {} failed: {}", target, e);
            // the ping already failed, the terminate message is best effort
            let _ = conn.close().await;
            return Err(StorageError::Connection(e.to_string()));
        }

        info!("connected to PostgreSQL at {}", target);
        Ok(Self { conn, target })
    }
}

/// Message reported by the database, without the driver's prefix
fn database_message(err: &sqlx::Error) -> String {
    err.as_database_error()
        .map(|db_err| db_err.message().to_string())
        .unwrap_or_else(|| err.to_string())
}

/// Classify a failed insert; `42P01` means the table has to be created
fn insert_error(table: &TableName, err: sqlx::Error) -> StorageError {
    if is_undefined_table(&err) {
        StorageError::MissingTable {
            table: table.to_string(),
            message: database_message(&err),
        }
    } else {
        StorageError::from(err)
    }
}

#[async_trait]
impl RowStore for PostgresStore {
    #[instrument(skip_all, fields(table = %table, key = %row.key))]
    async fn insert_row(&mut self, table: &TableName, row: &MetricRow) -> StorageResult<()> {
        let sql = table.insert_sql();

        sqlx::query(&sql)
            .bind(row.time_posted)
            .bind(&row.key)
            .bind(&row.value)
            .execute(&mut self.conn)
            .await
            .map_err(|e| insert_error(table, e))?;

        debug!("inserted row {} = {}", row.key, row.value);
        Ok(())
    }

    #[instrument(skip_all, fields(table = %table))]
    async fn ensure_table(&mut self, table: &TableName) -> StorageResult<()> {
        for sql in [table.create_table_sql(), table.create_index_sql()] {
            debug!("executing: {}", sql);
            sqlx::query(&sql)
                .execute(&mut self.conn)
                .await
                .map_err(|e| StorageError::TableCreation {
                    table: table.to_string(),
                    message: database_message(&e),
                })?;
        }

        info!("created table {} with index", table);
        Ok(())
    }

    async fn close(self) -> StorageResult<()> {
        debug!("closing PostgreSQL connection to {}", self.target);
        self.conn.close().await.map_err(StorageError::from)
    }
}
