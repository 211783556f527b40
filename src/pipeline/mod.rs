//! Graph persistence pipeline
//!
//! Records are pulled lazily from the producer and handed to a bounded set
//! of concurrent workers. Each worker runs one record's transaction through
//! the [`TransactionCoordinator`]. Records are independent, so no ordering
//! holds between them.

mod coordinator;
mod router;
mod writer;

pub use coordinator::{RecordOutcome, RecordState, TransactionCoordinator};
pub use router::{RejectionReason, WriteOp, WritePlan};
pub use writer::{write_node, write_relationship};

use crate::config::GraphConfig;
use crate::record::Record;
use crate::storage::{ConnectionManager, GraphStore, OpenError, StorageError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that end a run. Per-record failures never appear here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to open graph store: {0}")]
    Open(#[from] OpenError),

    #[error("graph store connection lost: {0}")]
    Connection(#[source] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Maximum transactions in flight
    pub workers: usize,
    /// Upper bound on one record's write sequence
    pub write_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl PipelineOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }
}

/// Per-run counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub committed: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.committed + self.rejected + self.failed
    }

    fn record(&mut self, outcome: &RecordOutcome) {
        match outcome.state() {
            RecordState::Committed => self.committed += 1,
            RecordState::Rejected => self.rejected += 1,
            _ => self.failed += 1,
        }
    }
}

pub struct Pipeline {
    connection: Arc<ConnectionManager>,
    coordinator: Arc<TransactionCoordinator>,
    options: PipelineOptions,
}

impl Pipeline {
    /// Connect using `config`. Fails before any record is processed if the
    /// store cannot be reached.
    pub async fn open(config: &GraphConfig, options: PipelineOptions) -> Result<Self, PipelineError> {
        let connection = ConnectionManager::open(config, options.write_timeout).await?;
        Ok(Self::from_connection(connection, options))
    }

    /// Run over an already-open store
    pub async fn with_store(store: Arc<dyn GraphStore>, options: PipelineOptions) -> Result<Self, PipelineError> {
        let target = store.backend().to_string();
        let connection = ConnectionManager::with_store(store)
            .await
            .map_err(|source| OpenError::Handshake { target, source })?;
        Ok(Self::from_connection(connection, options))
    }

    fn from_connection(connection: ConnectionManager, options: PipelineOptions) -> Self {
        let connection = Arc::new(connection);
        let coordinator = Arc::new(TransactionCoordinator::new(connection.clone(), options.write_timeout));
        Self {
            connection,
            coordinator,
            options,
        }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        self.connection.store()
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Write a single record in its own transaction
    pub async fn process(&self, record: &Record) -> Result<RecordOutcome, PipelineError> {
        self.coordinator
            .process(record)
            .await
            .map_err(PipelineError::Connection)
    }

    /// Write every record, at most `workers` at a time.
    ///
    /// On a connection-level failure no further records are pulled; the
    /// transactions already in flight finish before the error is returned.
    pub async fn run<I>(&self, records: I) -> Result<RunSummary, PipelineError>
    where
        I: IntoIterator<Item = Record>,
    {
        let permits = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let mut tasks: JoinSet<Result<RecordOutcome, StorageError>> = JoinSet::new();
        let mut summary = RunSummary::default();
        let mut fatal: Option<StorageError> = None;

        let mut records = records.into_iter();
        loop {
            // Wait for a free worker before pulling the next record
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            while let Some(joined) = tasks.try_join_next() {
                Self::collect(joined, &mut summary, &mut fatal);
            }
            if fatal.is_some() {
                break;
            }
            let Some(record) = records.next() else {
                break;
            };

            let coordinator = self.coordinator.clone();
            tasks.spawn(async move {
                let outcome = coordinator.process(&record).await;
                drop(permit);
                outcome
            });
        }

        // Drain in-flight transactions
        while let Some(joined) = tasks.join_next().await {
            Self::collect(joined, &mut summary, &mut fatal);
        }

        info!(
            committed = summary.committed,
            rejected = summary.rejected,
            failed = summary.failed,
            "run finished"
        );

        match fatal {
            Some(e) => Err(PipelineError::Connection(e)),
            None => Ok(summary),
        }
    }

    fn collect(
        joined: Result<Result<RecordOutcome, StorageError>, JoinError>,
        summary: &mut RunSummary,
        fatal: &mut Option<StorageError>,
    ) {
        match joined {
            Ok(Ok(outcome)) => summary.record(&outcome),
            Ok(Err(e)) => {
                if fatal.is_none() {
                    *fatal = Some(e);
                }
            }
            Err(e) => {
                error!(error = %e, "worker task failed");
                summary.failed += 1;
            }
        }
    }

    /// Close the connection. Safe to call more than once.
    pub async fn close(&self) -> Result<(), PipelineError> {
        self.connection.close().await.map_err(PipelineError::Connection)
    }
}

/// Open, run every record, then close
pub async fn ingest<I>(config: &GraphConfig, options: PipelineOptions, records: I) -> Result<RunSummary, PipelineError>
where
    I: IntoIterator<Item = Record>,
{
    let pipeline = Pipeline::open(config, options).await?;
    let result = pipeline.run(records).await;
    if let Err(e) = pipeline.close().await {
        error!(error = %e, "failed to close graph store");
    }
    result
}
