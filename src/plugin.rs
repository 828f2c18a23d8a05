//! Plugin identity and wire format
//!
//! The host routes batches by content type. This publisher declares a
//! single self-describing format, `snap.json`: a JSON array of metric
//! records.
//!
//! ```json
//! [
//!   {
//!     "namespace": ["intel", "cpu", "load"],
//!     "timestamp": "2016-03-01T12:00:00Z",
//!     "tags": {"host": "node-1"},
//!     "unit": "",
//!     "data": 0.42
//!   }
//! ]
//! ```
//!
//! Any other content type is rejected before decoding is attempted.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::Batch;
use crate::error::{PublishError, PublishResult};

pub const PLUGIN_NAME: &str = "postgresql";
pub const PLUGIN_VERSION: u32 = 9;

/// Content type of a JSON encoded metric batch
pub const SNAP_JSON_CONTENT_TYPE: &str = "snap.json";

/// Role the plugin plays for the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    Collector,
    Processor,
    Publisher,
}

/// Static plugin identity reported to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMeta {
    pub name: String,
    pub version: u32,
    pub plugin_type: PluginType,
    pub accepted_content_types: Vec<String>,
    pub returned_content_types: Vec<String>,
}

impl PluginMeta {
    pub fn accepts(&self, content_type: &str) -> bool {
        self.accepted_content_types
            .iter()
            .any(|accepted| accepted == content_type)
    }
}

/// Metadata of the PostgreSQL publisher
pub fn meta() -> PluginMeta {
    PluginMeta {
        name: PLUGIN_NAME.to_string(),
        version: PLUGIN_VERSION,
        plugin_type: PluginType::Publisher,
        accepted_content_types: vec![SNAP_JSON_CONTENT_TYPE.to_string()],
        returned_content_types: vec![SNAP_JSON_CONTENT_TYPE.to_string()],
    }
}

/// Decode a serialized batch
///
/// The whole batch is decoded up front; a single malformed record fails
/// the call.
pub fn decode_batch(content_type: &str, content: &[u8]) -> PublishResult<Batch> {
    if content_type != SNAP_JSON_CONTENT_TYPE {
        error!("unknown content type '{}'", content_type);
        return Err(PublishError::UnknownContentType(content_type.to_string()));
    }

    serde_json::from_slice(content).map_err(|e| {
        error!("error decoding batch ({} bytes): {}", content.len(), e);
        PublishError::Decode(e)
    })
}
