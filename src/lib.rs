//! Talegraph: idempotent graph persistence for a fiction catalog
//!
//! Takes typed records (works, reviews, author profiles) in any order, any
//! number of times, and merges them into a property graph without
//! duplicate nodes or edges.
//!
//! # Core Concepts
//!
//! - **Merge**: every write is create-if-absent, update-if-present
//! - **Minimal nodes**: a referenced entity exists with only its key and
//!   timestamps until its full record arrives, then is upgraded in place
//! - **Per-record transactions**: all writes implied by one record commit
//!   or roll back together; a failed record never stops the run
//!
//! # Example
//!
//! ```no_run
//! use talegraph::{ingest, GraphConfig, PipelineOptions, Record, Work};
//!
//! # async fn demo() -> Result<(), talegraph::PipelineError> {
//! let config = GraphConfig::from_env();
//! let records = vec![Record::from(Work {
//!     work_id: Some(89034),
//!     author_id: Some(555),
//!     ..Default::default()
//! })];
//! let summary = ingest(&config, PipelineOptions::default(), records).await?;
//! assert_eq!(summary.committed, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod graph;
pub mod pipeline;
pub mod record;
pub mod storage;

pub use config::{Backend, ConfigError, GraphConfig};
pub use graph::{Label, MergeSpec, NodeKey, Properties, PropertyValue, RelType, TimestampPolicy};
pub use pipeline::{
    ingest, Pipeline, PipelineError, PipelineOptions, RecordOutcome, RecordState, RejectionReason,
    RunSummary, TransactionCoordinator,
};
pub use record::{PersonProfile, Record, RecordKind, Review, Work};
pub use storage::{
    ConnectionManager, GraphStore, GraphTxn, OpenError, OpenStore, SqliteStore, StorageError,
    StorageResult, StoredNode,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
