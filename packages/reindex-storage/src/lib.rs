//! Upsertion record store for incremental index reconciliation
//!
//! Tracks `(key, namespace, group_id, updated_at)` tuples so a
//! reconciliation run can tell which items it has already indexed and
//! which records predate the current run and are stale.
//!
//! ## Core Principles
//!
//! 1. **Server-side clock**: `updated_at` always comes from the store's
//!    own clock, so the run watermark is immune to client clock drift.
//! 2. **Key uniqueness**: at most one record per `(key, namespace)`.
//! 3. **Monotonic writes**: an upsert can assert a lower time bound and
//!    fails with a clock-skew error instead of writing a timestamp the
//!    store considers already-past.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reindex_storage::{KeyFilter, RecordManager, SqliteRecordManager};
//!
//! let store = SqliteRecordManager::open("records.db", "my-index")?;
//! store.create_schema()?;
//!
//! let t0 = store.get_time().await?;
//! store.update(&keys, Some(&group_ids), Some(t0)).await?;
//!
//! let stale = store.list_keys(KeyFilter::default().before(t0)).await?;
//! store.delete_keys(&stale).await?;
//! ```

pub mod domain;
pub mod error;

#[cfg(feature = "sqlite")]
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

// Domain re-exports
pub use domain::{KeyFilter, RecordManager, UpsertionRecord};

#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteRecordManager;
