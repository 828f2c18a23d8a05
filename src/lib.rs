pub mod config;
pub mod encode;
pub mod error;
pub mod plugin;
pub mod policy;
pub mod publisher;
pub mod storage;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use encode::{MetricValue, UnsupportedType};
pub use error::{PublishError, PublishResult};

/// An ordered group of metrics delivered in one publish call
pub type Batch = Vec<Metric>;

/// A single timestamped, namespaced observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub namespace: Vec<NamespaceElement>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub unit: String,
    /// Dynamically typed payload, classified by the encoder at write time
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Metric {
    pub fn new<S: AsRef<str>>(
        namespace: &[S],
        timestamp: DateTime<Utc>,
        data: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            namespace: namespace
                .iter()
                .map(|segment| NamespaceElement::new(segment.as_ref()))
                .collect(),
            timestamp,
            tags: BTreeMap::new(),
            unit: String::new(),
            data: data.into(),
        }
    }

    /// Dotted namespace, stored in `key_column`
    pub fn key(&self) -> String {
        encode::namespace_key(&self.namespace)
    }

    /// Stored form of the payload, stored in `value_column`
    pub fn encoded_value(&self) -> Result<String, UnsupportedType> {
        encode::encode(&self.data)
    }
}

/// One segment of a metric namespace
///
/// On the wire a segment is either a bare string or an object carrying at
/// least a `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawNamespaceElement")]
pub struct NamespaceElement {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NamespaceElement {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            name: None,
            description: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNamespaceElement {
    Static(String),
    Element {
        #[serde(alias = "Value")]
        value: String,
        #[serde(default, alias = "Name")]
        name: Option<String>,
        #[serde(default, alias = "Description")]
        description: Option<String>,
    },
}

impl From<RawNamespaceElement> for NamespaceElement {
    fn from(raw: RawNamespaceElement) -> Self {
        match raw {
            RawNamespaceElement::Static(value) => NamespaceElement::new(value),
            RawNamespaceElement::Element {
                value,
                name,
                description,
            } => NamespaceElement {
                value,
                name: name.filter(|n| !n.is_empty()),
                description: description.filter(|d| !d.is_empty()),
            },
        }
    }
}
