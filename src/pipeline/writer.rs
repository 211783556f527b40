//! Node and relationship writers
//!
//! Both run inside a caller-provided transaction and never commit.

use crate::graph::{MergeSpec, NodeKey, RelType};
use crate::storage::{GraphTxn, StorageError, StorageResult};
use tracing::debug;

/// Upsert one node
pub async fn write_node(txn: &mut dyn GraphTxn, spec: &MergeSpec) -> StorageResult<()> {
    debug!(
        node = %spec.key,
        properties = spec.properties.len(),
        policy = ?spec.timestamps,
        "merging node"
    );
    txn.merge_node(spec).await
}

/// Upsert one edge, creating either endpoint in minimal form if missing.
///
/// Endpoints that already exist are not modified.
pub async fn write_relationship(
    txn: &mut dyn GraphTxn,
    rel: RelType,
    from: &NodeKey,
    to: &NodeKey,
) -> StorageResult<()> {
    let (from_label, to_label) = rel.endpoints();
    if from.label != from_label {
        return Err(StorageError::InvalidEndpoint { rel, key: *from });
    }
    if to.label != to_label {
        return Err(StorageError::InvalidEndpoint { rel, key: *to });
    }

    write_node(txn, &MergeSpec::ensure(*from)).await?;
    write_node(txn, &MergeSpec::ensure(*to)).await?;

    debug!(%rel, from = %from, to = %to, "merging relationship");
    txn.merge_edge(rel, from, to).await
}
