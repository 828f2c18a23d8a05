//! Table schema and metric row definitions
//!
//! Every metric becomes one row of a fixed four-column table:
//!
//! | column         | type                       |
//! |----------------|----------------------------|
//! | `id`           | `SERIAL PRIMARY KEY`       |
//! | `time_posted`  | `timestamp with time zone` |
//! | `key_column`   | `VARCHAR(200)`             |
//! | `value_column` | `VARCHAR(200)`             |
//!
//! plus a secondary index `key_index` on `key_column`. The table is created
//! lazily, the first time an insert reports that it does not exist.
//!
//! Values are always bound as parameters. The table name cannot be bound,
//! so it is validated as a plain SQL identifier before it reaches any
//! statement text.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, SubsecRound, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};
use crate::Metric;
use crate::encode::UnsupportedType;

/// Column definitions of the metrics table
pub const TABLE_COLUMNS: &str = "(id SERIAL PRIMARY KEY, time_posted timestamp with time zone, key_column VARCHAR(200), value_column VARCHAR(200))";

/// Name of the secondary index on `key_column`
pub const INDEX_NAME: &str = "key_index";

/// Schema of unqualified table names
pub const DEFAULT_SCHEMA: &str = "public";

/// PostgreSQL truncates identifiers longer than this
const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$")
        .unwrap_or_else(|e| panic!("identifier pattern is invalid: {e}"))
});

/// A validated, optionally schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    pub fn parse(name: &str) -> StorageResult<Self> {
        let valid = IDENTIFIER.is_match(name)
            && name
                .split('.')
                .all(|segment| segment.len() <= MAX_IDENTIFIER_LEN);

        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(StorageError::InvalidIdentifier(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Schema the table lives in; unqualified names resolve to `public`
    pub fn schema(&self) -> &str {
        self.0
            .split_once('.')
            .map_or(DEFAULT_SCHEMA, |(schema, _)| schema)
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table
    pub fn create_table_sql(&self) -> String {
        format!("CREATE TABLE IF NOT EXISTS {} {}", self.0, TABLE_COLUMNS)
    }

    /// `CREATE INDEX` statement for `key_index`
    pub fn create_index_sql(&self) -> String {
        format!("CREATE INDEX {} on {} (key_column)", INDEX_NAME, self.0)
    }

    /// Parameterised insert; binds `time_posted`, `key_column`, `value_column`
    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (id, time_posted, key_column, value_column) VALUES (DEFAULT, $1, $2, $3)",
            self.0
        )
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TableName {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TableName> for String {
    fn from(table: TableName) -> Self {
        table.0
    }
}

/// A single row written to the metrics table
///
/// The `id` column is assigned by the database and therefore not part of
/// the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRow {
    /// When the publish call wrote the row (whole seconds, UTC)
    pub time_posted: DateTime<Utc>,

    /// Dotted namespace of the metric
    pub key: String,

    /// Encoded metric value
    pub value: String,
}

impl MetricRow {
    /// Convert a metric into a row, failing on unsupported value types
    pub fn from_metric(metric: &Metric, time_posted: DateTime<Utc>) -> Result<Self, UnsupportedType> {
        Ok(Self {
            time_posted,
            key: metric.key(),
            value: metric.encoded_value()?,
        })
    }
}

/// Timestamp shared by all rows of one publish call
///
/// Rows carry RFC3339 precision, so sub-second digits are dropped.
pub fn posted_at(now: DateTime<Utc>) -> DateTime<Utc> {
    now.trunc_subsecs(0)
}
