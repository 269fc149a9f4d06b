//! SQLite adapter for [`RecordManager`]
//!
//! Single-file (or in-memory) record store. Timestamps come from the
//! database's own clock via `julianday('now')`, converted to epoch
//! seconds, so every writer observing the same database observes the
//! same clock.
//!
//! The connection is synchronous `rusqlite` behind a mutex; the async
//! port methods never hold the lock across an await point.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, ToSql};
use tracing::debug;

use crate::domain::{KeyFilter, RecordManager};
use crate::error::{Result, StorageError};

/// Epoch seconds from the SQLite server clock.
///
/// 2440587.5 is the julian day of the unix epoch.
const SERVER_TIME_SQL: &str = "SELECT (julianday('now') - 2440587.5) * 86400.0";

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS upsertion_record (
    key        TEXT NOT NULL,
    namespace  TEXT NOT NULL,
    group_id   TEXT,
    updated_at REAL NOT NULL,
    PRIMARY KEY (key, namespace)
);
CREATE INDEX IF NOT EXISTS idx_upsertion_namespace_updated_at
    ON upsertion_record (namespace, updated_at);
";

/// SQLite-backed record manager, bound to one namespace
pub struct SqliteRecordManager {
    conn: Arc<Mutex<Connection>>,
    namespace: String,
}

impl SqliteRecordManager {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>, namespace: impl Into<String>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            namespace: namespace.into(),
        })
    }

    /// Open a fresh in-memory database (one per manager)
    pub fn new_in_memory(namespace: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            namespace: namespace.into(),
        })
    }

    /// Create the record table and indexes; idempotent
    pub fn create_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        debug!(namespace = %self.namespace, "record schema ready");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::database("connection mutex poisoned"))
    }

    fn server_time(conn: &Connection) -> Result<f64> {
        let t: f64 = conn.query_row(SERVER_TIME_SQL, [], |row| row.get(0))?;
        Ok(t)
    }

    fn placeholders(n: usize) -> String {
        let mut s = String::with_capacity(n * 2);
        for i in 0..n {
            if i > 0 {
                s.push(',');
            }
            s.push('?');
        }
        s
    }
}

#[async_trait]
impl RecordManager for SqliteRecordManager {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get_time(&self) -> Result<f64> {
        let conn = self.lock()?;
        Self::server_time(&conn)
    }

    async fn exists(&self, keys: &[String]) -> Result<Vec<bool>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let sql = format!(
            "SELECT DISTINCT key FROM upsertion_record
             WHERE namespace = ? AND key IN ({})",
            Self::placeholders(keys.len())
        );

        let mut stmt = conn.prepare(&sql)?;
        let params = std::iter::once(&self.namespace).chain(keys.iter());
        let found: std::collections::HashSet<String> = stmt
            .query_map(params_from_iter(params), |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<_, _>>()?;

        Ok(keys.iter().map(|k| found.contains(k)).collect())
    }

    async fn update(
        &self,
        keys: &[String],
        group_ids: Option<&[Option<String>]>,
        time_at_least: Option<f64>,
    ) -> Result<()> {
        if let Some(groups) = group_ids {
            if groups.len() != keys.len() {
                return Err(StorageError::invalid_input(format!(
                    "number of keys ({}) does not match number of group ids ({})",
                    keys.len(),
                    groups.len()
                )));
            }
        }

        let mut conn = self.lock()?;

        // One clock read per call; every row of this upsert shares it.
        let update_time = Self::server_time(&conn)?;
        if let Some(at_least) = time_at_least {
            if update_time < at_least {
                return Err(StorageError::clock_skew(update_time, at_least));
            }
        }

        if keys.is_empty() {
            return Ok(());
        }

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO upsertion_record (key, namespace, group_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key, namespace) DO UPDATE SET
                     group_id   = excluded.group_id,
                     updated_at = excluded.updated_at",
            )?;

            for (i, key) in keys.iter().enumerate() {
                let group = group_ids.and_then(|g| g[i].as_deref());
                stmt.execute(params![key, self.namespace, group, update_time])?;
            }
        }
        tx.commit()?;

        debug!(
            namespace = %self.namespace,
            keys = keys.len(),
            update_time,
            "upserted records"
        );
        Ok(())
    }

    async fn list_keys(&self, filter: KeyFilter) -> Result<Vec<String>> {
        // An empty group filter can match nothing.
        if matches!(&filter.group_ids, Some(groups) if groups.is_empty()) {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;

        let mut sql = String::from("SELECT key FROM upsertion_record WHERE namespace = ?");
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(self.namespace.clone())];

        if let Some(after) = filter.after {
            sql.push_str(" AND updated_at > ?");
            params.push(Box::new(after));
        }
        if let Some(before) = filter.before {
            sql.push_str(" AND updated_at < ?");
            params.push(Box::new(before));
        }
        if let Some(groups) = &filter.group_ids {
            sql.push_str(&format!(
                " AND group_id IN ({})",
                Self::placeholders(groups.len())
            ));
            for group in groups {
                params.push(Box::new(group.clone()));
            }
        }
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let mut stmt = conn.prepare(&sql)?;
        let keys = stmt
            .query_map(params_from_iter(params.iter().map(|p| p.as_ref())), |row| {
                row.get::<_, String>(0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(keys)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let conn = self.lock()?;
        let sql = format!(
            "DELETE FROM upsertion_record WHERE namespace = ? AND key IN ({})",
            Self::placeholders(keys.len())
        );

        let params = std::iter::once(&self.namespace).chain(keys.iter());
        let deleted = conn.execute(&sql, params_from_iter(params))?;

        debug!(namespace = %self.namespace, deleted, "deleted records");
        Ok(())
    }
}
