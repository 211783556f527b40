//! Neo4j storage backend (`neo4j` feature)
//!
//! Every merge is a single Cypher `MERGE` so the server enforces one node
//! per (label, key); uniqueness constraints are created at connect time so
//! concurrent creation of the same key surfaces as a constraint conflict
//! instead of a duplicate node.

use super::traits::{GraphStore, GraphTxn, StorageError, StorageResult, StoredNode};
use crate::config::GraphConfig;
use crate::graph::{Label, MergeSpec, NodeKey, Properties, PropertyValue, RelType, TimestampPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{query, BoltType, ConfigBuilder, Graph, Query, Txn};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Neo4j-backed graph store
///
/// `close()` takes the driver out of the store; its pool shuts down once
/// transactions still holding a handle finish.
pub struct Neo4jStore {
    graph: RwLock<Option<Graph>>,
}

impl Neo4jStore {
    /// Connect and create the per-label uniqueness constraints
    pub async fn connect(config: &GraphConfig) -> StorageResult<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self {
            graph: RwLock::new(Some(graph)),
        };
        store.ensure_constraints().await?;
        Ok(store)
    }

    async fn ensure_constraints(&self) -> StorageResult<()> {
        for label in Label::ALL {
            let cypher = format!(
                "CREATE CONSTRAINT {}_key IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
                label.as_str().to_lowercase(),
                label,
                label.key_field()
            );
            self.graph().await?.run(query(&cypher)).await?;
            debug!(%label, "uniqueness constraint ensured");
        }
        Ok(())
    }

    /// Handle to the driver, or `Closed` after `close()`
    async fn graph(&self) -> StorageResult<Graph> {
        self.graph.read().await.clone().ok_or(StorageError::Closed)
    }

    async fn fetch_count(&self, q: Query) -> StorageResult<usize> {
        let mut rows = self.graph().await?.execute(q).await?;
        let Some(row) = rows.next().await? else {
            return Ok(0);
        };
        let count: i64 = row.get("count").map_err(|e| StorageError::Decode(e.to_string()))?;
        Ok(count as usize)
    }
}

/// Property names come from input; quote them as identifiers
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn to_bolt(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::String(s) => BoltType::from(s.clone()),
        PropertyValue::Int(i) => BoltType::from(*i),
        PropertyValue::Float(f) => BoltType::from(*f),
        PropertyValue::Bool(b) => BoltType::from(*b),
        PropertyValue::List(items) => BoltType::from(items.iter().map(to_bolt).collect::<Vec<_>>()),
    }
}

/// Build the `MERGE` statement for a spec
fn merge_node_query(spec: &MergeSpec) -> Query {
    let mut cypher = format!(
        "MERGE (n:{} {{{}: $key}})\nON CREATE SET n.created_at = datetime(), n.updated_at = datetime()",
        spec.key.label,
        spec.key_field()
    );

    if spec.timestamps == TimestampPolicy::Upsert {
        cypher.push_str("\nON MATCH SET n.updated_at = datetime()");

        let assignments: Vec<String> = spec
            .properties
            .keys()
            .enumerate()
            .map(|(i, name)| format!("n.{} = $p{}", quote_ident(name), i))
            .collect();
        if !assignments.is_empty() {
            cypher.push_str("\nSET ");
            cypher.push_str(&assignments.join(", "));
        }
    }

    let mut q = query(&cypher).param("key", spec.key.value);
    if spec.timestamps == TimestampPolicy::Upsert {
        for (i, value) in spec.properties.values().enumerate() {
            q = q.param(&format!("p{}", i), to_bolt(value));
        }
    }
    q
}

fn merge_edge_query(rel: RelType, from: &NodeKey, to: &NodeKey) -> Query {
    let cypher = format!(
        "MATCH (a:{} {{{}: $from}}), (b:{} {{{}: $to}})\nMERGE (a)-[:{}]->(b)",
        from.label,
        from.key_field(),
        to.label,
        to.key_field(),
        rel
    );
    query(&cypher).param("from", from.value).param("to", to.value)
}

fn json_to_property(value: serde_json::Value) -> Option<PropertyValue> {
    PropertyValue::from_json(&value)
}

#[async_trait]
impl GraphStore for Neo4jStore {
    fn backend(&self) -> &'static str {
        "neo4j"
    }

    async fn verify(&self) -> StorageResult<()> {
        self.graph()
            .await?
            .run(query("RETURN 1"))
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    async fn begin(&self) -> StorageResult<Box<dyn GraphTxn>> {
        let txn = self.graph().await?.start_txn().await?;
        Ok(Box::new(Neo4jTxn { txn: Some(txn) }))
    }

    async fn load_node(&self, key: &NodeKey) -> StorageResult<Option<StoredNode>> {
        let graph = self.graph().await?;
        let cypher = format!(
            "MATCH (n:{} {{{}: $key}})\nRETURN n {{ .*, created_at: toString(n.created_at), updated_at: toString(n.updated_at) }} AS props",
            key.label,
            key.key_field()
        );
        let mut rows = graph.execute(query(&cypher).param("key", key.value)).await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let mut raw: HashMap<String, serde_json::Value> =
            row.get("props").map_err(|e| StorageError::Decode(e.to_string()))?;
        let mut timestamp = |name: &str| -> StorageResult<DateTime<Utc>> {
            let value = raw
                .remove(name)
                .and_then(|v| v.as_str().map(str::to_string))
                .ok_or_else(|| StorageError::Decode(format!("{} missing on {}", name, key)))?;
            DateTime::parse_from_rfc3339(&value)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| StorageError::DateParse(e.to_string()))
        };
        let created_at = timestamp("created_at")?;
        let updated_at = timestamp("updated_at")?;
        raw.remove(key.key_field());

        let properties: Properties = raw
            .into_iter()
            .filter_map(|(name, value)| json_to_property(value).map(|v| (name, v)))
            .collect();

        Ok(Some(StoredNode {
            key: *key,
            properties,
            created_at,
            updated_at,
        }))
    }

    async fn count_nodes(&self, label: Label) -> StorageResult<usize> {
        let cypher = format!("MATCH (n:{}) RETURN count(n) AS count", label);
        self.fetch_count(query(&cypher)).await
    }

    async fn count_edges(&self, rel: RelType) -> StorageResult<usize> {
        let (from, to) = rel.endpoints();
        let cypher = format!("MATCH (:{})-[r:{}]->(:{}) RETURN count(r) AS count", from, rel, to);
        self.fetch_count(query(&cypher)).await
    }

    async fn edge_exists(&self, rel: RelType, from: &NodeKey, to: &NodeKey) -> StorageResult<bool> {
        let cypher = format!(
            "MATCH (a:{} {{{}: $from}})-[r:{}]->(b:{} {{{}: $to}}) RETURN count(r) AS count",
            from.label,
            from.key_field(),
            rel,
            to.label,
            to.key_field()
        );
        let count = self
            .fetch_count(query(&cypher).param("from", from.value).param("to", to.value))
            .await?;
        Ok(count > 0)
    }

    async fn close(&self) -> StorageResult<()> {
        // Dropping the last handle closes the pool's connections
        if let Some(graph) = self.graph.write().await.take() {
            drop(graph);
            info!("neo4j store closed");
        }
        Ok(())
    }
}

pub struct Neo4jTxn {
    txn: Option<Txn>,
}

impl Neo4jTxn {
    fn txn(&mut self) -> StorageResult<&mut Txn> {
        self.txn.as_mut().ok_or(StorageError::Closed)
    }
}

#[async_trait]
impl GraphTxn for Neo4jTxn {
    async fn merge_node(&mut self, spec: &MergeSpec) -> StorageResult<()> {
        let q = merge_node_query(spec);
        self.txn()?.run(q).await.map_err(|e| {
            let err = StorageError::Neo4j(e);
            if err.is_conflict() {
                StorageError::Conflict(spec.key)
            } else {
                err
            }
        })
    }

    async fn merge_edge(&mut self, rel: RelType, from: &NodeKey, to: &NodeKey) -> StorageResult<()> {
        let q = merge_edge_query(rel, from, to);
        self.txn()?.run(q).await?;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<()> {
        let txn = self.txn.take().ok_or(StorageError::Closed)?;
        txn.commit().await?;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StorageResult<()> {
        let txn = self.txn.take().ok_or(StorageError::Closed)?;
        txn.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_backtick_quoted() {
        assert_eq!(quote_ident("title"), "`title`");
        assert_eq!(quote_ident("a`b"), "`a``b`");
    }

    #[tokio::test]
    #[ignore = "needs a running Neo4j at NEO4J_URI"]
    async fn close_releases_the_driver() {
        let store = Neo4jStore::connect(&GraphConfig::from_env()).await.unwrap();
        store.verify().await.unwrap();

        store.close().await.unwrap();
        store.close().await.unwrap();

        assert!(store.graph.read().await.is_none());
        assert!(matches!(store.verify().await, Err(StorageError::Closed)));
        let err = store.begin().await.err().unwrap();
        assert!(err.is_connection());
    }

    #[test]
    fn property_lists_convert_to_bolt_lists() {
        let value = PropertyValue::from(vec!["fantasy".to_string()]);
        assert!(matches!(to_bolt(&value), BoltType::List(_)));
    }
}
