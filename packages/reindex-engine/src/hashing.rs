//! Deterministic content identity
//!
//! # Identity derivation
//!
//! An item's uid is derived in two stages: a content hash over the
//! payload and a source hash over the source tag, combined into a
//! single identity hash. Identical `(content, source)` pairs yield the
//! identical uid across runs, processes and machines; this is what
//! makes reconciliation runs idempotent and lets previously-written
//! records be recognized later.
//!
//! Each stage is a UUIDv5 over a fixed namespace of the hex SHA-256
//! digest of the input, so identifiers are fixed-width, UUID-shaped,
//! and collision-resistant for any practical item count.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::document::Document;

/// Fixed namespace for identity UUIDs. Changing this invalidates every
/// previously-written record, so it never changes.
const IDENTITY_NAMESPACE: Uuid = Uuid::from_u128(1984);

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Hash a string into a UUID-shaped identifier
pub fn hash_string_to_uuid(input: &str) -> String {
    let digest = hex(Sha256::digest(input.as_bytes()).as_slice());
    Uuid::new_v5(&IDENTITY_NAMESPACE, digest.as_bytes()).to_string()
}

/// A document paired with its derived identity
///
/// `hash` is always the derived identity hash; `uid` equals `hash`
/// unless the caller supplied an explicit override. Dedup is keyed on
/// `hash` either way, so an override cannot smuggle a duplicate
/// payload past the deduplicator.
#[derive(Debug, Clone, PartialEq)]
pub struct HashedDocument {
    pub uid: String,
    pub hash: String,
    pub content_hash: String,
    pub source_hash: String,
    document: Document,
}

impl HashedDocument {
    /// Hash a document, optionally overriding the uid
    ///
    /// Pure and infallible; empty content and absent source are valid
    /// inputs (the source hash falls back to the empty string).
    pub fn from_document(document: Document, uid: Option<String>) -> Self {
        let content_hash = hash_string_to_uuid(&document.page_content);
        let source_hash = hash_string_to_uuid(document.source().unwrap_or(""));
        let hash = hash_string_to_uuid(&format!("{content_hash}{source_hash}"));
        let uid = uid.unwrap_or_else(|| hash.clone());

        Self {
            uid,
            hash,
            content_hash,
            source_hash,
            document,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}
