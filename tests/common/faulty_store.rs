//! Store wrapper that fails chosen operations

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use talegraph::{
    GraphStore, GraphTxn, Label, MergeSpec, NodeKey, OpenStore, RelType, SqliteStore, StorageError,
    StorageResult, StoredNode,
};

/// Which operations should fail
#[derive(Debug, Default)]
pub struct Faults {
    /// `verify()` reports the store unreachable
    pub refuse_handshake: bool,
    /// `merge_edge` fails when either endpoint is this node
    pub fail_edges_touching: Option<NodeKey>,
    /// `merge_node` on this node hangs far past any write timeout
    pub stall_node: Option<NodeKey>,
    /// `merge_node` reports a duplicate-key conflict this many times
    pub conflicts: AtomicUsize,
    /// `commit` waits this long before committing
    pub commit_delay: Option<Duration>,
}

pub struct FaultyStore {
    inner: SqliteStore,
    faults: Arc<Faults>,
    begins: AtomicUsize,
    active: Arc<AtomicUsize>,
    peak: AtomicUsize,
}

impl FaultyStore {
    pub fn new(faults: Faults) -> Self {
        Self {
            inner: SqliteStore::open_in_memory().expect("in-memory store"),
            faults: Arc::new(faults),
            begins: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
        }
    }

    /// Transactions started so far
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    /// Most transactions open or waiting to open at the same time
    pub fn peak_active(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphStore for FaultyStore {
    fn backend(&self) -> &'static str {
        "faulty-sqlite"
    }

    async fn verify(&self) -> StorageResult<()> {
        if self.faults.refuse_handshake {
            return Err(StorageError::Connection("connection refused".into()));
        }
        self.inner.verify().await
    }

    async fn begin(&self) -> StorageResult<Box<dyn GraphTxn>> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        let active = ActiveGuard::enter(self.active.clone());
        self.peak.fetch_max(active.count(), Ordering::SeqCst);

        let inner = self.inner.begin().await?;
        Ok(Box::new(FaultyTxn {
            inner,
            faults: self.faults.clone(),
            _active: active,
        }))
    }

    async fn load_node(&self, key: &NodeKey) -> StorageResult<Option<StoredNode>> {
        self.inner.load_node(key).await
    }

    async fn count_nodes(&self, label: Label) -> StorageResult<usize> {
        self.inner.count_nodes(label).await
    }

    async fn count_edges(&self, rel: RelType) -> StorageResult<usize> {
        self.inner.count_edges(rel).await
    }

    async fn edge_exists(&self, rel: RelType, from: &NodeKey, to: &NodeKey) -> StorageResult<bool> {
        self.inner.edge_exists(rel, from, to).await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

/// Counts a transaction as active from `begin` until it is finished or dropped
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }

    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct FaultyTxn {
    inner: Box<dyn GraphTxn>,
    faults: Arc<Faults>,
    _active: ActiveGuard,
}

#[async_trait]
impl GraphTxn for FaultyTxn {
    async fn merge_node(&mut self, spec: &MergeSpec) -> StorageResult<()> {
        if self.faults.stall_node == Some(spec.key) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let pending = self.faults.conflicts.load(Ordering::SeqCst);
        if pending > 0 {
            self.faults.conflicts.store(pending - 1, Ordering::SeqCst);
            return Err(StorageError::Conflict(spec.key));
        }
        self.inner.merge_node(spec).await
    }

    async fn merge_edge(&mut self, rel: RelType, from: &NodeKey, to: &NodeKey) -> StorageResult<()> {
        if let Some(bad) = self.faults.fail_edges_touching {
            if bad == *from || bad == *to {
                return Err(StorageError::Connection(format!("lost connection writing {}", rel)));
            }
        }
        self.inner.merge_edge(rel, from, to).await
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        if let Some(delay) = self.faults.commit_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        self.inner.rollback().await
    }
}
