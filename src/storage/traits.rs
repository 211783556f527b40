//! Storage trait definitions

use crate::graph::{Label, MergeSpec, NodeKey, Properties, RelType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[cfg(feature = "neo4j")]
    #[error("Neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Store is closed")]
    Closed,

    #[error("Duplicate key: {0}")]
    Conflict(NodeKey),

    #[error("{rel} endpoint {key} does not exist")]
    MissingEndpoint { rel: RelType, key: NodeKey },

    #[error("{rel} cannot connect {key}")]
    InvalidEndpoint { rel: RelType, key: NodeKey },

    #[error("Write timed out after {0:?}")]
    Timeout(Duration),
}

impl StorageError {
    /// A concurrent writer created or locked the same key; retrying the
    /// whole transaction is expected to succeed.
    pub fn is_conflict(&self) -> bool {
        use rusqlite::ffi;

        match self {
            Self::Conflict(_) => true,
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => {
                matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
            }
            #[cfg(feature = "neo4j")]
            Self::Neo4j(e) => e.to_string().contains("ConstraintValidationFailed"),
            _ => false,
        }
    }

    /// The store itself is unreachable or closed, as opposed to a single
    /// write failing.
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Closed => true,
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::NotADatabase
                    | rusqlite::ErrorCode::DatabaseCorrupt
            ),
            #[cfg(feature = "neo4j")]
            Self::Neo4j(e) => matches!(
                e,
                neo4rs::Error::ConnectionError | neo4rs::Error::IOError { .. }
            ),
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A node as read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub key: NodeKey,
    /// Entity properties, excluding the key and timestamps
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredNode {
    /// True when the node carries nothing beyond key and timestamps
    pub fn is_minimal(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Trait for graph storage backends
///
/// Implementations must be thread-safe (Send + Sync): workers acquire
/// transactions concurrently.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Round-trip to the store to prove the connection works
    async fn verify(&self) -> StorageResult<()>;

    /// Start a transaction. The transaction owns its session until it is
    /// committed, rolled back, or dropped (which rolls back).
    async fn begin(&self) -> StorageResult<Box<dyn GraphTxn>>;

    // === Reads ===

    async fn load_node(&self, key: &NodeKey) -> StorageResult<Option<StoredNode>>;

    async fn count_nodes(&self, label: Label) -> StorageResult<usize>;

    async fn count_edges(&self, rel: RelType) -> StorageResult<usize>;

    async fn edge_exists(&self, rel: RelType, from: &NodeKey, to: &NodeKey) -> StorageResult<bool>;

    /// Release the connection. Calling it again is a no-op.
    async fn close(&self) -> StorageResult<()>;
}

/// One open write transaction
#[async_trait]
pub trait GraphTxn: Send {
    /// Upsert a node according to `spec`
    async fn merge_node(&mut self, spec: &MergeSpec) -> StorageResult<()>;

    /// Upsert the single `rel` edge between two existing nodes
    async fn merge_edge(&mut self, rel: RelType, from: &NodeKey, to: &NodeKey) -> StorageResult<()>;

    async fn commit(self: Box<Self>) -> StorageResult<()>;

    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
