//! Reconciliation engine
//!
//! Drives one indexing run: consumes documents in fixed-size batches,
//! derives identities, checks the record store to decide add/skip,
//! writes new content into the vector index, restamps every surviving
//! key in the record store, and finally retires stale records according
//! to the configured cleanup mode.
//!
//! # Watermark and group accumulation
//!
//! The run watermark `t0` is read once from the record store's clock
//! before the first batch. Every upsert during the run asserts
//! `time_at_least = t0`, so a store whose clock drifts backwards fails
//! loudly instead of stamping a non-monotonic time.
//!
//! Group ids observed in *every* batch accumulate in a run context that
//! is consumed only by the post-pass deletion. Scoping deletion to the
//! final batch's groups would delete records belonging to groups seen
//! in earlier batches of the same run; the accumulator exists to rule
//! that out.
//!
//! # Idempotence
//!
//! Running twice over an unchanged document set yields all-skips on the
//! second run: identities are unchanged, existence checks find every
//! key, and no touched group holds a record older than the new `t0`.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use reindex_storage::{KeyFilter, RecordManager};

use crate::batch::{batches, deduplicate_in_order};
use crate::document::Document;
use crate::error::{IndexError, Result};
use crate::hashing::HashedDocument;
use crate::source_id::SourceIdAssigner;
use crate::vector_index::VectorIndex;

/// Stale-record cleanup mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupMode {
    /// No deletion pass
    #[default]
    None,
    /// Delete stale records only within groups touched by this run
    Incremental,
    /// Delete every stale record in the namespace, in bounded pages
    Full,
}

impl CleanupMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupMode::None => "none",
            CleanupMode::Incremental => "incremental",
            CleanupMode::Full => "full",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(CleanupMode::None),
            "incremental" => Ok(CleanupMode::Incremental),
            "full" => Ok(CleanupMode::Full),
            _ => Err(IndexError::config(format!(
                "cleanup should be one of 'incremental', 'full' or 'none', got '{s}'"
            ))),
        }
    }
}

impl std::fmt::Display for CleanupMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Run-level configuration (not persisted)
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Documents consumed from the source per batch
    pub batch_size: usize,
    /// Stale-record cleanup mode
    pub cleanup: CleanupMode,
    /// How documents resolve to group ids
    pub source_id: SourceIdAssigner,
    /// Re-add existing documents instead of skipping them
    pub force_update: bool,
    /// Page size for the full-mode deletion sweep
    pub cleanup_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            cleanup: CleanupMode::None,
            source_id: SourceIdAssigner::None,
            force_update: false,
            cleanup_batch_size: 1000,
        }
    }
}

/// Per-key decision recorded in the operation log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Ins,
    Upd,
    Skip,
    Del,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Ins => "INS",
            Operation::Upd => "UPD",
            Operation::Skip => "SKIP",
            Operation::Del => "DEL",
        }
    }
}

/// One operation-log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOperation {
    pub key: String,
    pub operation: Operation,
}

/// Result summary of one reconciliation run
///
/// Created once per run and returned to the caller; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexResult {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub deleted: usize,
    /// Ordered log of per-key decisions
    pub operations: Vec<KeyOperation>,
}

impl IndexResult {
    fn log(&mut self, key: String, operation: Operation) {
        debug!(%key, op = operation.as_str(), "index decision");
        self.operations.push(KeyOperation { key, operation });
    }
}

/// Run-wide state threaded through every batch
///
/// Holds the watermark and the accumulated group-id set; merged after
/// each batch, consumed only at the deletion pass.
struct RunContext {
    index_start_time: f64,
    group_ids: BTreeSet<String>,
}

impl RunContext {
    fn new(index_start_time: f64) -> Self {
        Self {
            index_start_time,
            group_ids: BTreeSet::new(),
        }
    }

    fn absorb(&mut self, groups: impl IntoIterator<Item = String>) {
        self.group_ids.extend(groups);
    }
}

/// Reconciliation engine over one record-store namespace
pub struct Indexer<R, V> {
    record_manager: R,
    vector_index: V,
    config: IndexConfig,
}

impl<R: RecordManager, V: VectorIndex> Indexer<R, V> {
    /// Create an indexer with default configuration
    pub fn new(record_manager: R, vector_index: V) -> Self {
        Self::with_config(record_manager, vector_index, IndexConfig::default())
    }

    pub fn with_config(record_manager: R, vector_index: V, config: IndexConfig) -> Self {
        Self {
            record_manager,
            vector_index,
            config,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn record_manager(&self) -> &R {
        &self.record_manager
    }

    pub fn vector_index(&self) -> &V {
        &self.vector_index
    }

    /// Recover the collaborators, e.g. to re-run with another config
    pub fn into_parts(self) -> (R, V) {
        (self.record_manager, self.vector_index)
    }

    /// Run one reconciliation pass over the given documents
    ///
    /// Batches are processed strictly in source order; the deletion
    /// pass runs only after every batch has been observed. A failed run
    /// leaves already-committed batches in place and is safe to re-run
    /// from scratch.
    pub async fn run<I>(&self, docs: I) -> Result<IndexResult>
    where
        I: IntoIterator<Item = Document>,
    {
        self.check_config()?;

        let index_start_time = self.record_manager.get_time().await?;
        let mut ctx = RunContext::new(index_start_time);
        let mut result = IndexResult::default();

        info!(
            namespace = self.record_manager.namespace(),
            cleanup = %self.config.cleanup,
            batch_size = self.config.batch_size,
            index_start_time,
            "starting reconciliation run"
        );

        for doc_batch in batches(self.config.batch_size, docs) {
            self.process_batch(doc_batch, &mut ctx, &mut result).await?;
        }

        match self.config.cleanup {
            CleanupMode::Incremental => self.cleanup_incremental(&ctx, &mut result).await?,
            CleanupMode::Full => self.cleanup_full(&ctx, &mut result).await?,
            CleanupMode::None => {}
        }

        info!(
            added = result.added,
            updated = result.updated,
            skipped = result.skipped,
            deleted = result.deleted,
            "reconciliation run finished"
        );
        Ok(result)
    }

    /// Fail fast on configuration problems, before any state mutates
    fn check_config(&self) -> Result<()> {
        if self.config.batch_size == 0 {
            return Err(IndexError::config("batch_size must be positive"));
        }
        if self.config.cleanup == CleanupMode::Full && self.config.cleanup_batch_size == 0 {
            return Err(IndexError::config(
                "cleanup_batch_size must be positive for full cleanup",
            ));
        }
        if self.config.cleanup == CleanupMode::Incremental && self.config.source_id.is_none() {
            return Err(IndexError::config(
                "a source id assigner is required when cleanup mode is incremental",
            ));
        }
        if !self.vector_index.supports_delete() {
            return Err(IndexError::config(
                "vector index does not support deletion by id",
            ));
        }
        Ok(())
    }

    async fn process_batch(
        &self,
        batch: Vec<Document>,
        ctx: &mut RunContext,
        result: &mut IndexResult,
    ) -> Result<()> {
        let hashed: Vec<HashedDocument> = deduplicate_in_order(
            batch
                .into_iter()
                .map(|doc| HashedDocument::from_document(doc, None)),
        )
        .collect();

        let source_ids: Vec<Option<String>> = hashed
            .iter()
            .map(|doc| self.config.source_id.assign(doc.document()))
            .collect();

        if self.config.cleanup == CleanupMode::Incremental {
            for (doc, source_id) in hashed.iter().zip(&source_ids) {
                if source_id.is_none() {
                    let preview: String = doc.document().page_content.chars().take(100).collect();
                    return Err(IndexError::config(format!(
                        "source ids are required when cleanup mode is incremental; \
                         document starting with {preview:?} was not assigned one"
                    )));
                }
            }
        }

        let uids: Vec<String> = hashed.iter().map(|doc| doc.uid.clone()).collect();
        let exists_batch = self.record_manager.exists(&uids).await?;

        let mut ids_to_index: Vec<String> = Vec::new();
        let mut docs_to_index: Vec<Document> = Vec::new();
        let mut uids_to_refresh: Vec<String> = Vec::new();
        let mut force_readded: HashSet<String> = HashSet::new();

        for (hashed_doc, doc_exists) in hashed.into_iter().zip(exists_batch) {
            if doc_exists {
                if self.config.force_update {
                    force_readded.insert(hashed_doc.uid.clone());
                } else {
                    uids_to_refresh.push(hashed_doc.uid);
                    continue;
                }
            }
            ids_to_index.push(hashed_doc.uid.clone());
            docs_to_index.push(hashed_doc.into_document());
        }

        result.skipped += uids_to_refresh.len();
        for uid in uids_to_refresh {
            result.log(uid, Operation::Skip);
        }

        if !docs_to_index.is_empty() {
            self.vector_index
                .add_documents(&docs_to_index, &ids_to_index)
                .await?;

            result.added += ids_to_index.len() - force_readded.len();
            result.updated += force_readded.len();
            for uid in ids_to_index {
                let operation = if force_readded.contains(&uid) {
                    Operation::Upd
                } else {
                    Operation::Ins
                };
                result.log(uid, operation);
            }
        }

        // Restamp every surviving uid of the batch, skipped ones
        // included, so nothing supplied this run looks stale to the
        // deletion pass.
        self.record_manager
            .update(&uids, Some(&source_ids), Some(ctx.index_start_time))
            .await?;

        ctx.absorb(source_ids.into_iter().flatten());

        debug!(batch_keys = uids.len(), "batch committed");
        Ok(())
    }

    async fn cleanup_incremental(&self, ctx: &RunContext, result: &mut IndexResult) -> Result<()> {
        // Scope to every group touched by any batch of this run. An
        // empty set means the run supplied no documents at all; with no
        // touched groups the whole namespace is considered in scope, so
        // an empty source retires everything it previously indexed.
        let mut filter = KeyFilter::default().before(ctx.index_start_time);
        if !ctx.group_ids.is_empty() {
            filter = filter.group_ids(ctx.group_ids.iter().cloned().collect());
        }

        let uids_to_delete = self.record_manager.list_keys(filter).await?;
        if uids_to_delete.is_empty() {
            return Ok(());
        }

        self.vector_index.delete(&uids_to_delete).await?;
        self.record_manager.delete_keys(&uids_to_delete).await?;

        result.deleted += uids_to_delete.len();
        for uid in uids_to_delete {
            result.log(uid, Operation::Del);
        }
        Ok(())
    }

    async fn cleanup_full(&self, ctx: &RunContext, result: &mut IndexResult) -> Result<()> {
        loop {
            let uids_to_delete = self
                .record_manager
                .list_keys(
                    KeyFilter::default()
                        .before(ctx.index_start_time)
                        .limit(self.config.cleanup_batch_size),
                )
                .await?;
            if uids_to_delete.is_empty() {
                return Ok(());
            }

            self.vector_index.delete(&uids_to_delete).await?;
            self.record_manager.delete_keys(&uids_to_delete).await?;

            result.deleted += uids_to_delete.len();
            for uid in uids_to_delete {
                result.log(uid, Operation::Del);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::InMemoryVectorIndex;
    use async_trait::async_trait;
    use reindex_storage::SqliteRecordManager;

    #[test]
    fn test_cleanup_mode_roundtrip() {
        for mode in &[CleanupMode::None, CleanupMode::Incremental, CleanupMode::Full] {
            let parsed = CleanupMode::from_str(mode.as_str()).unwrap();
            assert_eq!(*mode, parsed);
        }
    }

    #[test]
    fn test_cleanup_mode_invalid() {
        let err = CleanupMode::from_str("partial").unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
    }

    #[test]
    fn test_config_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.cleanup, CleanupMode::None);
        assert!(config.source_id.is_none());
        assert!(!config.force_update);
        assert_eq!(config.cleanup_batch_size, 1000);
    }

    #[test]
    fn test_operation_serde_shape() {
        let op = KeyOperation {
            key: "uid".to_string(),
            operation: Operation::Ins,
        };
        let json = serde_json::to_string(&op).unwrap();
        assert_eq!(json, r#"{"key":"uid","operation":"INS"}"#);
    }

    #[test]
    fn test_run_context_accumulates_across_batches() {
        let mut ctx = RunContext::new(0.0);
        ctx.absorb(vec!["b".to_string()]);
        ctx.absorb(vec!["a".to_string(), "b".to_string()]);

        let groups: Vec<&str> = ctx.group_ids.iter().map(String::as_str).collect();
        assert_eq!(groups, vec!["a", "b"]);
    }

    fn sqlite_manager() -> SqliteRecordManager {
        let mgr = SqliteRecordManager::new_in_memory("test-ns").unwrap();
        mgr.create_schema().unwrap();
        mgr
    }

    #[tokio::test]
    async fn test_incremental_requires_source_id_assigner() {
        let indexer = Indexer::with_config(
            sqlite_manager(),
            InMemoryVectorIndex::new(),
            IndexConfig {
                cleanup: CleanupMode::Incremental,
                ..IndexConfig::default()
            },
        );

        let err = indexer.run(vec![Document::new("x")]).await.unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_rejected() {
        let indexer = Indexer::with_config(
            sqlite_manager(),
            InMemoryVectorIndex::new(),
            IndexConfig {
                batch_size: 0,
                ..IndexConfig::default()
            },
        );

        let err = indexer.run(Vec::new()).await.unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
    }

    /// Index without delete support; must be refused before any write.
    struct NoDeleteIndex;

    #[async_trait]
    impl VectorIndex for NoDeleteIndex {
        async fn add_documents(&self, _documents: &[Document], _ids: &[String]) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _ids: &[String]) -> Result<()> {
            Err(IndexError::vector_index("delete not implemented"))
        }

        fn supports_delete(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_missing_delete_capability_fails_fast() {
        let manager = sqlite_manager();
        let indexer = Indexer::new(manager, NoDeleteIndex);

        let err = indexer.run(vec![Document::new("x")]).await.unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));

        // Nothing was written before the refusal
        let keys = indexer
            .record_manager()
            .list_keys(KeyFilter::default())
            .await
            .unwrap();
        assert!(keys.is_empty());
    }
}
