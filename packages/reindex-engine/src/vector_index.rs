//! Content index port
//!
//! The searchable store the reconciliation engine writes into. The
//! engine only needs upsert-at-explicit-id and delete-by-id; anything
//! else (embedding, similarity search, transport) belongs to the
//! implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::document::Document;
use crate::error::{IndexError, Result};

/// Content index abstraction
///
/// # Capability contract
///
/// Deletion by id is mandatory for any cleanup mode; the engine probes
/// `supports_delete` before processing the first batch and refuses to
/// start when it is false.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert documents at the given explicit ids
    ///
    /// `ids` has the same order and length as `documents`; writing an
    /// existing id replaces that entry.
    async fn add_documents(&self, documents: &[Document], ids: &[String]) -> Result<()>;

    /// Remove entries by id; absent ids are not an error
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Whether delete-by-id is actually implemented
    fn supports_delete(&self) -> bool {
        true
    }
}

/// In-memory content index
///
/// Reference implementation for tests and demos; stores documents in a
/// map keyed by id.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    docs: Arc<Mutex<HashMap<String, Document>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().expect("index mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs
            .lock()
            .expect("index mutex poisoned")
            .contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.docs
            .lock()
            .expect("index mutex poisoned")
            .get(id)
            .cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.docs
            .lock()
            .expect("index mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn add_documents(&self, documents: &[Document], ids: &[String]) -> Result<()> {
        if documents.len() != ids.len() {
            return Err(IndexError::vector_index(format!(
                "got {} documents for {} ids",
                documents.len(),
                ids.len()
            )));
        }

        let mut docs = self.docs.lock().expect("index mutex poisoned");
        for (id, doc) in ids.iter().zip(documents) {
            docs.insert(id.clone(), doc.clone());
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut docs = self.docs.lock().expect("index mutex poisoned");
        for id in ids {
            docs.remove(id);
        }
        Ok(())
    }
}
