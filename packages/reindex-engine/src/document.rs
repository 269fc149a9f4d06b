//! Content item model
//!
//! A `Document` is an opaque payload plus a metadata map. The only
//! metadata field the engine itself interprets is the source tag used
//! for identity derivation and group-scoped deletion; everything else
//! travels through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key holding the default source tag
pub const SOURCE_KEY: &str = "source";

/// A content item: payload plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque content payload
    pub page_content: String,
    /// Arbitrary metadata; the `source` field tags the logical group
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    /// Create a document with empty metadata
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }

    /// Create a document with the given metadata map
    pub fn with_metadata(page_content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    /// Create a document tagged with a source
    pub fn with_source(page_content: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert(SOURCE_KEY.to_string(), Value::String(source.into()));
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    /// The source tag, when present and a string
    pub fn source(&self) -> Option<&str> {
        self.metadata_str(SOURCE_KEY)
    }

    /// A metadata field as a string, when present and a string
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}
