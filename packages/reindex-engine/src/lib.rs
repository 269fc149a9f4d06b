//! Incremental indexing reconciliation engine
//!
//! Given a stream of documents, a durable record store (what was
//! indexed, and when) and a content index (the searchable artifacts),
//! computes a minimal-diff synchronization: after a run the content
//! index holds exactly the latest snapshot's items per logical group,
//! nothing stale, nothing duplicated.
//!
//! ## Invariants
//!
//! - **Idempotence**: re-running over an unchanged document set is all
//!   skips, zero adds and zero deletes.
//! - **One write per identity per batch**: duplicates within a batch
//!   collapse before any store call.
//! - **Run-wide deletion scope**: the incremental deletion pass sees
//!   the groups touched by *every* batch of the run, not only the last
//!   one.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reindex_engine::{
//!     CleanupMode, Document, IndexConfig, Indexer, InMemoryVectorIndex, SourceIdAssigner,
//! };
//! use reindex_storage::SqliteRecordManager;
//!
//! let record_manager = SqliteRecordManager::open("records.db", "my-index")?;
//! record_manager.create_schema()?;
//!
//! let indexer = Indexer::with_config(
//!     record_manager,
//!     InMemoryVectorIndex::new(),
//!     IndexConfig {
//!         cleanup: CleanupMode::Incremental,
//!         source_id: SourceIdAssigner::metadata_key("source"),
//!         ..IndexConfig::default()
//!     },
//! );
//!
//! let result = indexer.run(docs).await?;
//! println!("added {} skipped {}", result.added, result.skipped);
//! ```

// Public modules
pub mod batch;
pub mod document;
pub mod error;
pub mod hashing;
pub mod indexer;
pub mod source_id;
pub mod vector_index;

// Re-exports
pub use batch::{batches, deduplicate_in_order, Batches};
pub use document::{Document, SOURCE_KEY};
pub use error::{IndexError, Result};
pub use hashing::{hash_string_to_uuid, HashedDocument};
pub use indexer::{
    CleanupMode, IndexConfig, IndexResult, Indexer, KeyOperation, Operation,
};
pub use source_id::{SourceIdAssigner, SourceIdFn};
pub use vector_index::{InMemoryVectorIndex, VectorIndex};
