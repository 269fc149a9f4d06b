//! Domain layer for the upsertion record store
//!
//! # Core Principles
//!
//! 1. **Server-side clock**: timestamps always come from the store's own
//!    clock, never the caller's, so the staleness watermark survives
//!    client/server clock drift.
//! 2. **Key uniqueness**: at most one record per `(key, namespace)`.
//! 3. **Namespace scoping**: a manager instance is bound to one namespace;
//!    every operation is implicitly scoped to it.
//!
//! # Domain Models
//!
//! - `UpsertionRecord`: tracks when a key was last written, and to which
//!   source group it belongs
//! - `KeyFilter`: query filters for `list_keys`
//!
//! # Port Trait
//!
//! - `RecordManager`: the record-store abstraction the reconciliation
//!   engine is written against
//!
//! # Examples
//!
//! ```rust,ignore
//! use reindex_storage::domain::{KeyFilter, RecordManager};
//!
//! async fn example(store: impl RecordManager) -> Result<()> {
//!     let t0 = store.get_time().await?;
//!
//!     store
//!         .update(&["uid-1".into()], Some(&[Some("src-a".into())]), Some(t0))
//!         .await?;
//!
//!     let stale = store
//!         .list_keys(KeyFilter::default().before(t0))
//!         .await?;
//!     store.delete_keys(&stale).await?;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

// ═══════════════════════════════════════════════════════════════════════════
// Domain Models
// ═══════════════════════════════════════════════════════════════════════════

/// A single upsertion record
///
/// Tracks the last time a key was written into a namespace, and the
/// logical source group the key belongs to. The timestamp is an epoch
/// value in seconds read from the store's own clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertionRecord {
    /// Record key (the item's deterministic uid)
    pub key: String,
    /// Namespace the record belongs to (tenant/collection scope)
    pub namespace: String,
    /// Optional source group used to scope incremental deletion
    pub group_id: Option<String>,
    /// Last write time (epoch seconds, store clock)
    pub updated_at: f64,
}

impl UpsertionRecord {
    /// Create a new record
    pub fn new(
        key: impl Into<String>,
        namespace: impl Into<String>,
        group_id: Option<String>,
        updated_at: f64,
    ) -> Self {
        Self {
            key: key.into(),
            namespace: namespace.into(),
            group_id,
            updated_at,
        }
    }
}

/// Query filters for [`RecordManager::list_keys`]
///
/// All provided filters are ANDed together. Time bounds are exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFilter {
    /// Only keys with `updated_at < before`
    pub before: Option<f64>,
    /// Only keys with `updated_at > after`
    pub after: Option<f64>,
    /// Only keys whose `group_id` is one of these
    pub group_ids: Option<Vec<String>>,
    /// Result size cap
    pub limit: Option<usize>,
}

impl KeyFilter {
    pub fn before(mut self, before: f64) -> Self {
        self.before = Some(before);
        self
    }

    pub fn after(mut self, after: f64) -> Self {
        self.after = Some(after);
        self
    }

    pub fn group_ids(mut self, group_ids: Vec<String>) -> Self {
        self.group_ids = Some(group_ids);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Trait: RecordManager
// ═══════════════════════════════════════════════════════════════════════════

/// Record-store abstraction
///
/// The persistence layer that tracks which keys were upserted and when.
/// The reconciliation engine relies on exactly four capabilities:
/// existence checks, timestamped upserts, time/group-scoped key listing,
/// and key deletion, plus the store's own monotonic clock.
///
/// # Clock contract
///
/// `get_time` must be strictly non-decreasing across sequential calls
/// from one writer. Callers capture a run watermark from it and assert
/// it back via `update`'s `time_at_least` bound; a store that reads an
/// earlier time must fail the write with a clock-skew error rather than
/// silently stamping a non-monotonic timestamp.
///
/// # Implementations
///
/// - `SqliteRecordManager`: SQLite adapter (feature `sqlite`, default)
#[async_trait]
pub trait RecordManager: Send + Sync {
    /// Namespace this manager is bound to
    fn namespace(&self) -> &str;

    /// Current store time (epoch seconds, server-side clock)
    async fn get_time(&self) -> Result<f64>;

    /// Check which keys exist in the namespace
    ///
    /// # Returns
    ///
    /// One bool per input key, same order and length as `keys`.
    async fn exists(&self, keys: &[String]) -> Result<Vec<bool>>;

    /// Insert-or-update records for the given keys
    ///
    /// Every `(key, namespace)` row gets its `group_id` and `updated_at`
    /// replaced; `updated_at` is read once from the store clock for the
    /// whole call.
    ///
    /// # Arguments
    ///
    /// - `keys`: record keys to upsert
    /// - `group_ids`: one optional group per key; `None` means no groups
    /// - `time_at_least`: lower bound the store time must satisfy
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `group_ids` is present with a different length
    ///   than `keys`
    /// - `ClockSkew` if the store clock reads earlier than `time_at_least`
    async fn update(
        &self,
        keys: &[String],
        group_ids: Option<&[Option<String>]>,
        time_at_least: Option<f64>,
    ) -> Result<()>;

    /// List keys in the namespace matching all provided filters
    async fn list_keys(&self, filter: KeyFilter) -> Result<Vec<String>>;

    /// Delete records for the given keys; absent keys are ignored
    async fn delete_keys(&self, keys: &[String]) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
