//! Error types for storage operations

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// SQLSTATE reported by PostgreSQL for `undefined_table`
pub const UNDEFINED_TABLE: &str = "42P01";

/// Errors that can occur while writing rows
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Connecting or pinging the database failed
    #[error("failed to connect to storage backend: {0}")]
    Connection(String),

    /// The insert hit a table that does not exist yet
    #[error("table {table} does not exist: {message}")]
    MissingTable { table: String, message: String },

    /// Any other failed statement
    #[error("storage query failed: {0}")]
    Query(String),

    /// `CREATE TABLE` or `CREATE INDEX` failed
    #[error("failed to create table {table}: {message}")]
    TableCreation { table: String, message: String },

    /// Table name is not a plain (optionally schema-qualified) SQL identifier
    #[error("invalid table name '{0}'")]
    InvalidIdentifier(String),
}

#[cfg(feature = "storage-postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::Query("no rows found".to_string()),
            _ => StorageError::Query(err.to_string()),
        }
    }
}

/// Whether the driver reported `undefined_table`
#[cfg(feature = "storage-postgres")]
pub fn is_undefined_table(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNDEFINED_TABLE),
        _ => false,
    }
}
