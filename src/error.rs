//! Error type returned by a publish call
//!
//! Every failure is reported to the host as-is: there is no local recovery
//! and no partial-success signalling. Store-level failures keep their
//! [`StorageError`] classification so callers can tell a missing table from
//! a refused connection.

use crate::encode::UnsupportedType;
use crate::policy::{ConfigError, PolicyError};
use crate::storage::StorageError;

/// Result type alias for publish operations
pub type PublishResult<T> = Result<T, PublishError>;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Content type is not one the plugin declared
    #[error("unknown content type '{0}'")]
    UnknownContentType(String),

    /// The batch could not be decoded
    #[error("failed to decode metric batch: {0}")]
    Decode(#[from] serde_json::Error),

    /// A metric value the encoder does not support
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedType),

    /// Options missing, mistyped, or out of range
    #[error("invalid publisher configuration: {0}")]
    Config(#[from] ConfigError),

    /// The declared config policy itself is broken
    #[error("invalid config policy: {0}")]
    Policy(#[from] PolicyError),

    /// The runtime for a blocking publish could not be started
    #[error("failed to start publish runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// Connection, insert, or table creation failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PublishError {
    /// Whether the failure was the missing-table case that schedules table creation
    pub fn is_missing_table(&self) -> bool {
        matches!(self, PublishError::Storage(StorageError::MissingTable { .. }))
    }

    /// Whether the failure happened before any query was issued
    pub fn is_connection(&self) -> bool {
        matches!(self, PublishError::Storage(StorageError::Connection(_)))
    }
}
