//! Source-id assignment
//!
//! Resolves one document to an optional group id, which scopes
//! incremental deletion. The variant is picked at configuration time;
//! the engine never inspects types at runtime.

use std::fmt;
use std::sync::Arc;

use crate::document::Document;

/// Caller-supplied assignment function
pub type SourceIdFn = Arc<dyn Fn(&Document) -> Option<String> + Send + Sync>;

/// How a document resolves to its group id
#[derive(Clone, Default)]
pub enum SourceIdAssigner {
    /// No group assignment (incompatible with incremental cleanup)
    #[default]
    None,
    /// Read a metadata field as the group id
    MetadataKey(String),
    /// Arbitrary caller-supplied function
    Custom(SourceIdFn),
}

impl SourceIdAssigner {
    /// Assign from a fixed metadata field
    pub fn metadata_key(key: impl Into<String>) -> Self {
        Self::MetadataKey(key.into())
    }

    /// Assign with a caller-supplied function
    pub fn custom(f: impl Fn(&Document) -> Option<String> + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Resolve one document to its optional group id
    ///
    /// A missing metadata field, or a non-string value, resolves to
    /// `None`; under incremental cleanup the engine turns that into a
    /// fatal configuration error.
    pub fn assign(&self, doc: &Document) -> Option<String> {
        match self {
            Self::None => None,
            Self::MetadataKey(key) => doc.metadata_str(key).map(String::from),
            Self::Custom(f) => f(doc),
        }
    }
}

impl fmt::Debug for SourceIdAssigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "SourceIdAssigner::None"),
            Self::MetadataKey(key) => write!(f, "SourceIdAssigner::MetadataKey({key:?})"),
            Self::Custom(_) => write!(f, "SourceIdAssigner::Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_assigns_nothing() {
        let doc = Document::with_source("data", "a.txt");
        assert_eq!(SourceIdAssigner::None.assign(&doc), None);
    }

    #[test]
    fn test_metadata_key_reads_field() {
        let assigner = SourceIdAssigner::metadata_key("source");
        let doc = Document::with_source("data", "a.txt");
        assert_eq!(assigner.assign(&doc), Some("a.txt".to_string()));
    }

    #[test]
    fn test_metadata_key_missing_field_is_none() {
        let assigner = SourceIdAssigner::metadata_key("origin");
        let doc = Document::with_source("data", "a.txt");
        assert_eq!(assigner.assign(&doc), None);
    }

    #[test]
    fn test_metadata_key_non_string_is_none() {
        let assigner = SourceIdAssigner::metadata_key("page");
        let mut doc = Document::new("data");
        doc.metadata
            .insert("page".to_string(), serde_json::Value::from(3));
        assert_eq!(assigner.assign(&doc), None);
    }

    #[test]
    fn test_custom_function() {
        let assigner =
            SourceIdAssigner::custom(|doc| doc.source().map(|s| format!("group:{s}")));
        let doc = Document::with_source("data", "a.txt");
        assert_eq!(assigner.assign(&doc), Some("group:a.txt".to_string()));
    }

    #[test]
    fn test_default_is_none() {
        assert!(SourceIdAssigner::default().is_none());
    }
}
