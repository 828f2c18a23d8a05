use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::policy::{self, ConfigError};
use crate::storage::TableName;

/// Environment variable consulted when no password is configured
const PASSWORD_ENV: &str = "PGPASSWORD";

/// Typed option value supplied by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConfigValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Int(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::Str(_) => "string",
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

/// Flat mapping of option name to value, as handed over by the host
pub type ConfigMap = HashMap<String, ConfigValue>;

/// Everything needed to reach the destination table
///
/// Built fresh for every publish call and never cached.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub table: TableName,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("table", &self.table)
            .finish()
    }
}

impl ConnectionConfig {
    /// Build the connection config from a processed option map
    pub fn from_config_map(config: &ConfigMap) -> Result<Self, ConfigError> {
        let port = get_int(config, policy::PORT)?;
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| ConfigError::OutOfRange {
                key: policy::PORT.to_string(),
                value: port,
            })?;

        let table_name = get_str(config, policy::TABLE_NAME)?;
        let table = TableName::parse(table_name)
            .map_err(|_| ConfigError::InvalidTableName(table_name.to_string()))?;

        Ok(Self {
            hostname: get_str(config, policy::HOSTNAME)?.to_string(),
            port,
            username: get_str(config, policy::USERNAME)?.to_string(),
            password: get_str(config, policy::PASSWORD)?.to_string(),
            database: get_str(config, policy::DATABASE)?.to_string(),
            table,
        })
    }

    /// `user@host:port/database`, safe to log
    pub fn target(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.hostname, self.port, self.database
        )
    }

    /// Driver options; TLS is disabled
    #[cfg(feature = "storage-postgres")]
    pub fn connect_options(&self) -> sqlx::postgres::PgConnectOptions {
        sqlx::postgres::PgConnectOptions::new()
            .host(&self.hostname)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(sqlx::postgres::PgSslMode::Disable)
    }
}

fn get_str<'a>(config: &'a ConfigMap, key: &str) -> Result<&'a str, ConfigError> {
    match config.get(key) {
        Some(ConfigValue::Str(value)) => Ok(value.as_str()),
        Some(other) => Err(ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: policy::RuleKind::String,
            found: other.type_name(),
        }),
        None => Err(ConfigError::Missing(key.to_string())),
    }
}

fn get_int(config: &ConfigMap, key: &str) -> Result<i64, ConfigError> {
    match config.get(key) {
        Some(ConfigValue::Int(value)) => Ok(*value),
        Some(other) => Err(ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: policy::RuleKind::Integer,
            found: other.type_name(),
        }),
        None => Err(ConfigError::Missing(key.to_string())),
    }
}

/// Fill a missing password from `PGPASSWORD`
pub fn apply_env_password(config: &mut ConfigMap) {
    if config.contains_key(policy::PASSWORD) {
        return;
    }
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        trace!("using password from {PASSWORD_ENV}");
        config.insert(policy::PASSWORD.to_string(), ConfigValue::Str(password));
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<ConfigMap> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config: &ConfigMap| trace!("loaded {} options from {path}", config.len()))
}
