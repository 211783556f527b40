//! Storage backends
//!
//! Backends implement `GraphStore` / `GraphTxn`. `SqliteStore` is always
//! available; `Neo4jStore` is behind the `neo4j` feature.

mod connection;
#[cfg(feature = "neo4j")]
mod neo4j;
mod sqlite;
mod traits;

pub use connection::{ConnectionManager, OpenError};
#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jStore;
pub use sqlite::SqliteStore;
pub use traits::{GraphStore, GraphTxn, OpenStore, StorageError, StorageResult, StoredNode};
