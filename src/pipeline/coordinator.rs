//! Transaction coordinator: one atomic unit per record
//!
//! ```text
//! Received ──plan rejected──────────────▶ Rejected
//!    │
//!    ▼
//! Writing ──all writes ok + commit──────▶ Committed
//!    │
//!    └──write error / timeout──────────▶ RolledBack
//! ```
//!
//! Failures of a single record are contained here. Only a failure to get a
//! session at all (the store is unreachable or closed) escapes as fatal.
//!
//! The write timeout is enforced at await points. Backends that block the
//! thread inside a call (SQLite) are bounded there by their own busy
//! timeout, which the connection manager sets to the same value.

use super::router::{RejectionReason, WritePlan};
use crate::record::{Record, RecordKind};
use crate::storage::{ConnectionManager, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Received,
    Writing,
    Committed,
    RolledBack,
    Rejected,
}

/// Final result for one record
#[derive(Debug)]
pub enum RecordOutcome {
    Committed {
        kind: RecordKind,
        key: i64,
        writes: usize,
    },
    Rejected {
        kind: RecordKind,
        reason: RejectionReason,
    },
    RolledBack {
        kind: RecordKind,
        key: i64,
        error: StorageError,
    },
}

impl RecordOutcome {
    pub fn state(&self) -> RecordState {
        match self {
            Self::Committed { .. } => RecordState::Committed,
            Self::Rejected { .. } => RecordState::Rejected,
            Self::RolledBack { .. } => RecordState::RolledBack,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Committed { kind, .. } | Self::Rejected { kind, .. } | Self::RolledBack { kind, .. } => *kind,
        }
    }
}

enum AttemptError {
    /// Could not obtain a session; the pipeline must stop
    Fatal(StorageError),
    /// The record's transaction failed and was rolled back
    Write(StorageError),
}

pub struct TransactionCoordinator {
    connection: Arc<ConnectionManager>,
    write_timeout: Duration,
}

impl TransactionCoordinator {
    pub fn new(connection: Arc<ConnectionManager>, write_timeout: Duration) -> Self {
        Self {
            connection,
            write_timeout,
        }
    }

    /// Write one record atomically.
    ///
    /// Returns `Err` only for connection-level failures. A conflict with a
    /// concurrent writer is retried once.
    pub async fn process(&self, record: &Record) -> Result<RecordOutcome, StorageError> {
        let kind = record.kind();
        debug!(%kind, key = ?record.key(), state = ?RecordState::Received, "record received");

        let plan = match WritePlan::for_record(record) {
            Ok(plan) => plan,
            Err(reason) => {
                warn!(%kind, %reason, "record rejected");
                return Ok(RecordOutcome::Rejected { kind, reason });
            }
        };

        let mut retried = false;
        loop {
            match self.attempt(&plan).await {
                Ok(writes) => {
                    debug!(%kind, key = plan.key, writes, state = ?RecordState::Committed, "record committed");
                    return Ok(RecordOutcome::Committed {
                        kind,
                        key: plan.key,
                        writes,
                    });
                }
                Err(AttemptError::Fatal(e)) => {
                    error!(%kind, key = plan.key, error = %e, "connection unavailable");
                    return Err(e);
                }
                Err(AttemptError::Write(e)) if e.is_conflict() && !retried => {
                    warn!(%kind, key = plan.key, error = %e, "write conflict, retrying record");
                    retried = true;
                }
                Err(AttemptError::Write(e)) => {
                    error!(%kind, key = plan.key, error = %e, state = ?RecordState::RolledBack, "record rolled back");
                    return Ok(RecordOutcome::RolledBack {
                        kind,
                        key: plan.key,
                        error: e,
                    });
                }
            }
        }
    }

    async fn attempt(&self, plan: &WritePlan) -> Result<usize, AttemptError> {
        // One deadline covers session, writes and commit
        let deadline = Instant::now() + self.write_timeout;
        let timed_out = || StorageError::Timeout(self.write_timeout);

        let mut txn = match timeout_at(deadline, self.connection.session()).await {
            Ok(Ok(txn)) => txn,
            Ok(Err(e)) if e.is_connection() => return Err(AttemptError::Fatal(e)),
            Ok(Err(e)) => return Err(AttemptError::Write(e)),
            Err(_) => return Err(AttemptError::Write(timed_out())),
        };
        debug!(kind = %plan.kind, key = plan.key, state = ?RecordState::Writing, "transaction open");

        let result = match timeout_at(deadline, plan.apply(txn.as_mut())).await {
            Ok(result) => result,
            Err(_) => Err(timed_out()),
        };

        match result {
            // A commit cut off by the deadline drops the transaction, which
            // rolls it back
            Ok(writes) => match timeout_at(deadline, txn.commit()).await {
                Ok(Ok(())) => Ok(writes),
                Ok(Err(e)) => Err(AttemptError::Write(e)),
                Err(_) => Err(AttemptError::Write(timed_out())),
            },
            Err(e) => {
                match tokio::time::timeout(self.write_timeout, txn.rollback()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(rollback_err)) => {
                        warn!(kind = %plan.kind, key = plan.key, error = %rollback_err, "rollback failed");
                    }
                    Err(_) => {
                        warn!(kind = %plan.kind, key = plan.key, "rollback timed out, transaction dropped");
                    }
                }
                Err(AttemptError::Write(e))
            }
        }
    }
}
