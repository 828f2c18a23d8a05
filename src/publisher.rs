//! The publish operation
//!
//! ## Flow
//!
//! ```text
//! decode batch → process config → connect + ping → for each metric:
//!     encode key/value ─(unsupported)→ abort
//!     insert row ─(missing table)→ create table + index, return insert error
//!                ─(other failure)→ abort
//! → close connection
//! ```
//!
//! There are no retries. A missing table is created as a side effect so
//! that the host's *next* publish call succeeds; the current call still
//! fails with the original insert error. Rows inserted before a failing
//! metric stay committed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConfigMap, ConnectionConfig};
use crate::error::{PublishError, PublishResult};
use crate::plugin::{self, PluginMeta, decode_batch};
use crate::policy::{self, ConfigPolicy, PolicyError};
use crate::storage::schema::posted_at;
#[cfg(feature = "storage-postgres")]
use crate::storage::postgres::PostgresStore;
use crate::storage::{MetricRow, RowStore, StorageError, TableName};
use crate::Metric;

/// A plugin that persists metric batches handed over by the host
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Decode `content` and persist every metric it holds
    async fn publish(
        &self,
        content_type: &str,
        content: &[u8],
        config: &ConfigMap,
    ) -> PublishResult<()>;

    /// Options this publisher understands
    fn config_policy(&self) -> Result<ConfigPolicy, PolicyError>;

    /// Static identity reported to the host
    fn meta(&self) -> PluginMeta;
}

/// Process the host's options and build the connection config
pub fn connection_config(config: &ConfigMap) -> PublishResult<ConnectionConfig> {
    let processed = policy::publisher_policy()?.process(config).map_err(|e| {
        error!("invalid configuration: {}", e);
        PublishError::Config(e)
    })?;

    ConnectionConfig::from_config_map(&processed).map_err(|e| {
        error!("invalid configuration: {}", e);
        PublishError::Config(e)
    })
}

/// Write `batch` into `table`, one row per metric, in order
///
/// All rows share the timestamp derived from `now`. Returns the number of
/// rows written; on failure, rows written so far are not rolled back.
#[instrument(skip_all, fields(table = %table, count = batch.len()))]
pub async fn write_batch<S: RowStore>(
    store: &mut S,
    table: &TableName,
    batch: &[Metric],
    now: DateTime<Utc>,
) -> PublishResult<usize> {
    let time_posted = posted_at(now);
    let mut written = 0;

    for metric in batch {
        let row = MetricRow::from_metric(metric, time_posted).map_err(|e| {
            error!("cannot encode metric {}: {}", metric.key(), e);
            PublishError::UnsupportedType(e)
        })?;

        match store.insert_row(table, &row).await {
            Ok(()) => written += 1,
            Err(err @ StorageError::MissingTable { .. }) => {
                warn!("table {} does not exist, creating it", table);
                if let Err(create_err) = store.ensure_table(table).await {
                    error!("{}", create_err);
                    return Err(create_err.into());
                }
                error!("{}", err);
                return Err(err.into());
            }
            Err(err) => {
                error!("insert of {} failed: {}", row.key, err);
                return Err(err.into());
            }
        }
    }

    debug!("wrote {} rows", written);
    Ok(written)
}

/// Publisher writing to PostgreSQL
///
/// Holds no state: every call opens its own connection from the options it
/// is given and closes it before returning.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresPublisher;

impl PostgresPublisher {
    pub fn new() -> Self {
        Self
    }

    /// Run one publish call to completion on a dedicated runtime
    ///
    /// For hosts without an async runtime. Must not be called from within
    /// a Tokio runtime.
    #[cfg(feature = "storage-postgres")]
    pub fn publish_blocking(
        &self,
        content_type: &str,
        content: &[u8],
        config: &ConfigMap,
    ) -> PublishResult<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(PublishError::Runtime)?;

        runtime.block_on(self.publish(content_type, content, config))
    }
}

#[cfg(feature = "storage-postgres")]
#[async_trait]
impl Publisher for PostgresPublisher {
    #[instrument(skip_all, fields(content_type = %content_type, bytes = content.len()))]
    async fn publish(
        &self,
        content_type: &str,
        content: &[u8],
        config: &ConfigMap,
    ) -> PublishResult<()> {
        info!("publishing started");
        let batch = decode_batch(content_type, content)?;
        let connection = connection_config(config)?;
        debug!("publishing {} metrics to {:?}", batch.len(), connection);

        let mut store = PostgresStore::connect(&connection).await?;
        let result = write_batch(&mut store, &connection.table, &batch, Utc::now()).await;

        if let Err(e) = store.close().await {
            warn!("failed to close connection: {}", e);
        }

        let written = result?;
        info!("published {} metrics to {}", written, connection.table);
        Ok(())
    }

    fn config_policy(&self) -> Result<ConfigPolicy, PolicyError> {
        policy::publisher_policy().cloned()
    }

    fn meta(&self) -> PluginMeta {
        plugin::meta()
    }
}
