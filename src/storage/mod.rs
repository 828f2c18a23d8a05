//! Row stores for metric persistence
//!
//! This module provides a trait-based abstraction for the destination of
//! metric rows.
//!
//! ## Design
//!
//! - **Trait-based**: `RowStore` lets the publish loop run against PostgreSQL or memory
//! - **Async**: All operations are async and driven by Tokio
//! - **Row-at-a-time**: one insert per metric, no transaction around the batch
//!
//! ## Stores
//!
//! - **PostgreSQL** (default): one connection per publish call
//! - **In-Memory**: No persistence, for tests and dry runs
//!
//! ## Usage
//!
//! ```no_run
//! use pg_metrics_publisher::config::ConnectionConfig;
//! use pg_metrics_publisher::storage::{RowStore, postgres::PostgresStore};
//!
//! # async fn example(config: ConnectionConfig) -> anyhow::Result<()> {
//! let mut store = PostgresStore::connect(&config).await?;
//! store.ensure_table(&config.table).await?;
//! store.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-postgres")]
pub mod postgres;
pub mod schema;

pub use backend::RowStore;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use schema::{MetricRow, TableName};
