//! SQLite storage backend
//!
//! Nodes live in one table keyed by `(label, key)`, relationships in
//! another keyed by all five of their identifying columns, so uniqueness of
//! both is enforced by primary keys rather than by the writers.

use super::traits::{GraphStore, GraphTxn, OpenStore, StorageError, StorageResult, StoredNode};
use crate::graph::{Label, MergeSpec, NodeKey, Properties, RelType, TimestampPolicy};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Default wait for a locked database before a write gives up
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite-backed graph store
///
/// Statements run synchronously on the calling task, so an async timeout
/// cannot interrupt one mid-statement; lock waits are bounded by the busy
/// timeout instead (see [`SqliteStore::set_busy_timeout`]).
///
/// One connection behind an async mutex. A transaction holds the lock for
/// its whole lifetime, so concurrent workers queue on `begin()`. `close()`
/// takes the same lock and therefore waits for in-flight transactions.
pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- One row per (label, key); properties exclude key and timestamps
            CREATE TABLE IF NOT EXISTS nodes (
                label TEXT NOT NULL,
                key INTEGER NOT NULL,
                properties_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (label, key)
            );

            -- Property-less, directional, at most one per (type, source, target)
            CREATE TABLE IF NOT EXISTS relationships (
                rel_type TEXT NOT NULL,
                source_label TEXT NOT NULL,
                source_key INTEGER NOT NULL,
                target_label TEXT NOT NULL,
                target_key INTEGER NOT NULL,
                PRIMARY KEY (rel_type, source_label, source_key, target_label, target_key),
                FOREIGN KEY (source_label, source_key) REFERENCES nodes(label, key),
                FOREIGN KEY (target_label, target_key) REFERENCES nodes(label, key)
            );

            CREATE INDEX IF NOT EXISTS idx_relationships_target
                ON relationships(target_label, target_key);

            PRAGMA foreign_keys = ON;

            -- Readers are not blocked by the single writer
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Change how long a write waits on a locked database file
    pub async fn set_busy_timeout(&self, timeout: Duration) -> StorageResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;
        conn.busy_timeout(timeout)?;
        Ok(())
    }

    fn row_to_node(
        key: NodeKey,
        properties_json: String,
        created_at: String,
        updated_at: String,
    ) -> StorageResult<StoredNode> {
        Ok(StoredNode {
            key,
            properties: serde_json::from_str(&properties_json)?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

fn parse_timestamp(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::DateParse(e.to_string()))
}

/// Fixed-width UTC timestamps compare correctly as text
fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

#[async_trait]
impl GraphStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn verify(&self) -> StorageResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;
        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        if one != 1 {
            return Err(StorageError::Connection("handshake returned unexpected value".into()));
        }
        Ok(())
    }

    async fn begin(&self) -> StorageResult<Box<dyn GraphTxn>> {
        let guard = self.conn.clone().lock_owned().await;
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteTxn {
            conn: guard,
            finished: false,
        }))
    }

    async fn load_node(&self, key: &NodeKey) -> StorageResult<Option<StoredNode>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;

        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT properties_json, created_at, updated_at FROM nodes WHERE label = ?1 AND key = ?2",
                params![key.label.as_str(), key.value],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(props, created, updated)| Self::row_to_node(*key, props, created, updated))
            .transpose()
    }

    async fn count_nodes(&self, label: Label) -> StorageResult<usize> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE label = ?1",
            params![label.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn count_edges(&self, rel: RelType) -> StorageResult<usize> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM relationships WHERE rel_type = ?1",
            params![rel.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn edge_exists(&self, rel: RelType, from: &NodeKey, to: &NodeKey) -> StorageResult<bool> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(StorageError::Closed)?;
        let exists: bool = conn.query_row(
            r#"
            SELECT COUNT(*) > 0 FROM relationships
            WHERE rel_type = ?1
              AND source_label = ?2 AND source_key = ?3
              AND target_label = ?4 AND target_key = ?5
            "#,
            params![rel.as_str(), from.label.as_str(), from.value, to.label.as_str(), to.value],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn close(&self) -> StorageResult<()> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| StorageError::Database(e))?;
        }
        Ok(())
    }
}

/// An open `BEGIN IMMEDIATE` transaction holding the connection lock
pub struct SqliteTxn {
    conn: OwnedMutexGuard<Option<Connection>>,
    finished: bool,
}

impl SqliteTxn {
    fn conn(&self) -> StorageResult<&Connection> {
        self.conn.as_ref().ok_or(StorageError::Closed)
    }

    fn node_exists(conn: &Connection, key: &NodeKey) -> StorageResult<bool> {
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM nodes WHERE label = ?1 AND key = ?2",
            params![key.label.as_str(), key.value],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// On failure `finished` stays false and `Drop` issues the rollback
    fn finish(&mut self, statement: &str) -> StorageResult<()> {
        self.conn()?.execute_batch(statement)?;
        self.finished = true;
        Ok(())
    }
}

#[async_trait]
impl GraphTxn for SqliteTxn {
    async fn merge_node(&mut self, spec: &MergeSpec) -> StorageResult<()> {
        let conn = self.conn()?;
        // serde_json writes non-finite floats as null, which json_patch
        // would treat as a delete
        let storable: Properties = spec
            .properties
            .iter()
            .filter_map(|(name, value)| value.clone().finite().map(|v| (name.clone(), v)))
            .collect();
        let properties = serde_json::to_string(&storable)?;
        let now = timestamp_now();

        // json_patch only overwrites keys present in the incoming object
        let sql = match spec.timestamps {
            TimestampPolicy::Upsert => {
                r#"
                INSERT INTO nodes (label, key, properties_json, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT(label, key) DO UPDATE SET
                    properties_json = json_patch(nodes.properties_json, excluded.properties_json),
                    updated_at = max(nodes.updated_at, excluded.updated_at)
                "#
            }
            TimestampPolicy::EnsureExists => {
                r#"
                INSERT INTO nodes (label, key, properties_json, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT(label, key) DO NOTHING
                "#
            }
        };

        conn.execute(sql, params![spec.key.label.as_str(), spec.key.value, properties, now])?;
        Ok(())
    }

    async fn merge_edge(&mut self, rel: RelType, from: &NodeKey, to: &NodeKey) -> StorageResult<()> {
        let conn = self.conn()?;
        for key in [from, to] {
            if !Self::node_exists(conn, key)? {
                return Err(StorageError::MissingEndpoint { rel, key: *key });
            }
        }

        conn.execute(
            r#"
            INSERT INTO relationships (rel_type, source_label, source_key, target_label, target_key)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT DO NOTHING
            "#,
            params![rel.as_str(), from.label.as_str(), from.value, to.label.as_str(), to.value],
        )?;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.finish("COMMIT")
    }

    async fn rollback(mut self: Box<Self>) -> StorageResult<()> {
        self.finish("ROLLBACK")
    }
}

impl Drop for SqliteTxn {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(conn) = self.conn.as_ref() {
            let _ = conn.execute_batch("ROLLBACK");
        }
    }
}
