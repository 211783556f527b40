//! Connection manager: lifecycle of the one shared store
//!
//! Opened once before any record is processed and closed once after the
//! last transaction has finished. Writers never reach the store through
//! globals; they receive a transaction handle from [`ConnectionManager::session`].

use super::sqlite::SqliteStore;
use super::traits::{GraphStore, GraphTxn, OpenStore, StorageError, StorageResult};
use crate::config::{Backend, ConfigError, GraphConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Opening the connection failed; nothing may be processed
#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("handshake with {target} failed: {source}")]
    Handshake {
        target: String,
        #[source]
        source: StorageError,
    },
}

pub struct ConnectionManager {
    store: Arc<dyn GraphStore>,
    closed: AtomicBool,
}

impl ConnectionManager {
    /// Select the backend from `config.uri`, connect, and verify
    pub async fn open(config: &GraphConfig, write_timeout: Duration) -> Result<Self, OpenError> {
        let target = config.redacted_uri();
        let handshake = |source: StorageError| OpenError::Handshake {
            target: target.clone(),
            source,
        };

        let store: Arc<dyn GraphStore> = match config.backend()? {
            Backend::Sqlite(path) => {
                let store = SqliteStore::open(&path).map_err(handshake)?;
                store.set_busy_timeout(write_timeout).await.map_err(handshake)?;
                Arc::new(store)
            }
            Backend::SqliteMemory => Arc::new(SqliteStore::open_in_memory().map_err(handshake)?),
            Backend::Neo4j => Self::open_neo4j(config).await.map_err(handshake)?,
        };

        let manager = Self::with_store(store).await.map_err(handshake)?;
        info!(target = %target, database = %config.database, "connected to graph store");
        Ok(manager)
    }

    #[cfg(feature = "neo4j")]
    async fn open_neo4j(config: &GraphConfig) -> StorageResult<Arc<dyn GraphStore>> {
        let store = super::neo4j::Neo4jStore::connect(config).await?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "neo4j"))]
    async fn open_neo4j(config: &GraphConfig) -> StorageResult<Arc<dyn GraphStore>> {
        Err(StorageError::Connection(
            ConfigError::FeatureDisabled(config.redacted_uri()).to_string(),
        ))
    }

    /// Wrap an already-open store; runs the handshake
    pub async fn with_store(store: Arc<dyn GraphStore>) -> StorageResult<Self> {
        if let Err(e) = store.verify().await {
            error!(backend = store.backend(), error = %e, "graph store handshake failed");
            return Err(e);
        }
        Ok(Self {
            store,
            closed: AtomicBool::new(false),
        })
    }

    /// Acquire a transaction. It is released on commit, rollback or drop.
    pub async fn session(&self) -> StorageResult<Box<dyn GraphTxn>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        self.store.begin().await
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Release the connection; later calls do nothing
    pub async fn close(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.store.close().await?;
        info!(backend = self.store.backend(), "closed graph store connection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Label, MergeSpec, NodeKey};

    fn memory_config() -> GraphConfig {
        GraphConfig::default().with_uri("sqlite::memory:")
    }

    #[tokio::test]
    async fn open_in_memory_store() {
        let manager = ConnectionManager::open(&memory_config(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(manager.store().backend(), "sqlite");
        assert!(!manager.is_closed());
    }

    #[tokio::test]
    async fn unsupported_uri_fails_to_open() {
        let config = GraphConfig::default().with_uri("redis://localhost");
        let err = ConnectionManager::open(&config, Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, OpenError::Config(ConfigError::UnsupportedUri(_))));
    }

    #[tokio::test]
    async fn unreadable_sqlite_file_fails_handshake() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-db");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        let config = GraphConfig::default().with_uri(format!("sqlite://{}", path.display()));
        let err = ConnectionManager::open(&config, Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, OpenError::Handshake { .. }));
    }

    #[cfg(not(feature = "neo4j"))]
    #[tokio::test]
    async fn neo4j_uri_without_feature_is_fatal() {
        let err = ConnectionManager::open(&GraphConfig::default(), Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, OpenError::Handshake { .. }));
    }

    #[tokio::test]
    async fn session_commits_through_store() {
        let manager = ConnectionManager::open(&memory_config(), Duration::from_secs(1))
            .await
            .unwrap();

        let mut txn = manager.session().await.unwrap();
        txn.merge_node(&MergeSpec::minimal(NodeKey::person(1))).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(manager.store().count_nodes(Label::Person).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_sessions() {
        let manager = ConnectionManager::open(&memory_config(), Duration::from_secs(1))
            .await
            .unwrap();
        manager.close().await.unwrap();
        manager.close().await.unwrap();

        let err = manager.session().await.err().unwrap();
        assert!(err.is_connection());
    }
}
