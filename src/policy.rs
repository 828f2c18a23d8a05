//! Configuration policy
//!
//! The host asks the publisher which options it understands before the
//! first publish call. A [`ConfigPolicy`] lists those options as rules
//! (key, type, presence, default) and processes the host's option map
//! against them. Processing only checks type and presence: a wrong hostname
//! still passes and fails later, when the connection is opened.
//!
//! Policies are assembled with [`ConfigPolicyBuilder`], which validates the
//! rules themselves and reports mistakes as [`PolicyError`] instead of
//! panicking. The publisher's own policy is built once per process and
//! shared by every publish call.

use std::collections::HashSet;
use std::sync::LazyLock;

use serde::Serialize;

use crate::config::{ConfigMap, ConfigValue};

pub const USERNAME: &str = "username";
pub const PASSWORD: &str = "password";
pub const DATABASE: &str = "database";
pub const TABLE_NAME: &str = "table_name";
pub const HOSTNAME: &str = "hostname";
pub const PORT: &str = "port";

pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PORT: i64 = 5432;

/// Errors in the declaration of a policy
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("config rule with empty key")]
    EmptyKey,

    #[error("config rule '{0}' declared twice")]
    DuplicateKey(String),

    #[error("default of config rule '{key}' is not of type {expected}")]
    DefaultTypeMismatch { key: String, expected: RuleKind },
}

/// Errors in a host-supplied option map
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("required option '{0}' is missing")]
    Missing(String),

    #[error("option '{key}' must be of type {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: RuleKind,
        found: &'static str,
    },

    #[error("option '{key}' is out of range: {value}")]
    OutOfRange { key: String, value: i64 },

    #[error("option 'table_name' is not a valid table name: '{0}'")]
    InvalidTableName(String),
}

/// Type of value a rule accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    String,
    Integer,
}

impl RuleKind {
    fn accepts(self, value: &ConfigValue) -> bool {
        matches!(
            (self, value),
            (RuleKind::String, ConfigValue::Str(_)) | (RuleKind::Integer, ConfigValue::Int(_))
        )
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleKind::String => write!(f, "string"),
            RuleKind::Integer => write!(f, "integer"),
        }
    }
}

/// A single declared option
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigRule {
    pub key: String,
    pub kind: RuleKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ConfigValue>,
    pub description: String,
}

impl ConfigRule {
    fn new(key: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            key: key.into(),
            kind,
            required: false,
            default: None,
            description: String::new(),
        }
    }

    pub fn string(key: impl Into<String>) -> Self {
        Self::new(key, RuleKind::String)
    }

    pub fn integer(key: impl Into<String>) -> Self {
        Self::new(key, RuleKind::Integer)
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<ConfigValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Builder for [`ConfigPolicy`]
#[derive(Debug, Default)]
pub struct ConfigPolicyBuilder {
    rules: Vec<ConfigRule>,
}

impl ConfigPolicyBuilder {
    #[must_use]
    pub fn rule(mut self, rule: ConfigRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Validate the declared rules
    pub fn build(self) -> Result<ConfigPolicy, PolicyError> {
        let mut seen = HashSet::new();

        for rule in &self.rules {
            if rule.key.is_empty() {
                return Err(PolicyError::EmptyKey);
            }
            if !seen.insert(rule.key.as_str()) {
                return Err(PolicyError::DuplicateKey(rule.key.clone()));
            }
            if let Some(default) = &rule.default
                && !rule.kind.accepts(default)
            {
                return Err(PolicyError::DefaultTypeMismatch {
                    key: rule.key.clone(),
                    expected: rule.kind,
                });
            }
        }

        Ok(ConfigPolicy { rules: self.rules })
    }
}

/// The set of options a publisher understands
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigPolicy {
    rules: Vec<ConfigRule>,
}

impl ConfigPolicy {
    pub fn builder() -> ConfigPolicyBuilder {
        ConfigPolicyBuilder::default()
    }

    pub fn rules(&self) -> &[ConfigRule] {
        &self.rules
    }

    pub fn rule(&self, key: &str) -> Option<&ConfigRule> {
        self.rules.iter().find(|rule| rule.key == key)
    }

    /// Check the host's options against the rules and fill in defaults
    ///
    /// Rules are checked in declaration order and the first violation is
    /// returned. Keys without a rule are passed through unchanged.
    pub fn process(&self, config: &ConfigMap) -> Result<ConfigMap, ConfigError> {
        let mut processed = config.clone();

        for rule in &self.rules {
            match config.get(&rule.key) {
                Some(value) if !rule.kind.accepts(value) => {
                    return Err(ConfigError::TypeMismatch {
                        key: rule.key.clone(),
                        expected: rule.kind,
                        found: value.type_name(),
                    });
                }
                Some(_) => {}
                None => match &rule.default {
                    Some(default) => {
                        processed.insert(rule.key.clone(), default.clone());
                    }
                    None if rule.required => return Err(ConfigError::Missing(rule.key.clone())),
                    None => {}
                },
            }
        }

        Ok(processed)
    }
}

static PUBLISHER_POLICY: LazyLock<Result<ConfigPolicy, PolicyError>> =
    LazyLock::new(build_publisher_policy);

/// Policy of the PostgreSQL publisher, validated on first use
pub fn publisher_policy() -> Result<&'static ConfigPolicy, PolicyError> {
    PUBLISHER_POLICY.as_ref().map_err(Clone::clone)
}

fn build_publisher_policy() -> Result<ConfigPolicy, PolicyError> {
    ConfigPolicy::builder()
        .rule(
            ConfigRule::string(USERNAME)
                .required()
                .describe("Username to login to the PostgreSQL server"),
        )
        .rule(
            ConfigRule::string(PASSWORD)
                .required()
                .describe("Password to login to the PostgreSQL server"),
        )
        .rule(
            ConfigRule::string(DATABASE)
                .required()
                .describe("The postgresql database that data will be pushed to"),
        )
        .rule(ConfigRule::string(TABLE_NAME).required().describe(
            "The postgresql table within the database where information will be stored",
        ))
        .rule(
            ConfigRule::string(HOSTNAME)
                .required()
                .with_default(DEFAULT_HOSTNAME)
                .describe("The postgresql server ip or domain name"),
        )
        .rule(
            ConfigRule::integer(PORT)
                .required()
                .with_default(DEFAULT_PORT)
                .describe("The postgresql server port number"),
        )
        .build()
}
