//! Common test utilities for pipeline integration tests
//!
//! Provides record builders for the catalog scenarios and a store wrapper
//! that injects failures into specific writes.

#![allow(dead_code)]

pub mod faulty_store;

pub use faulty_store::{Faults, FaultyStore};

use serde_json::json;
use std::sync::Arc;
use talegraph::{GraphStore, OpenStore, Pipeline, PipelineOptions, Record, SqliteStore};

/// Parse a record from its wire form
pub fn record(value: serde_json::Value) -> Record {
    serde_json::from_value(value).expect("valid record json")
}

/// The work from the catalog walkthrough: Work 89034 by author 555
pub fn nightmare_realm() -> Record {
    record(json!({
        "kind": "work",
        "work_id": 89034,
        "author_id": 555,
        "author_name": "Jane",
        "title": "Nightmare Realm Summoner",
        "url": "https://example.com/fiction/89034/nightmare-realm-summoner",
        "tags": ["fantasy", "litrpg"],
        "rating": 4.7,
        "follower_count": 12000,
        "last_updated": "2024-11-01",
        "scraped_at": "2024-12-01T00:00:00Z",
        "version": 1
    }))
}

/// Review 42 of Work 89034 by author 555
pub fn great_read() -> Record {
    record(json!({
        "kind": "review",
        "review_id": 42,
        "review_title": "Great read",
        "review_text": "...",
        "author_name": "Jane",
        "author_id": 555,
        "reviewed_at_time": "2024-12-02T10:00:00Z",
        "reviewed_at_chapter": "Ch.10",
        "overall_rating": 4.5,
        "work_id": 89034
    }))
}

pub fn review(review_id: i64, author_id: i64, work_id: i64) -> Record {
    record(json!({
        "kind": "review",
        "review_id": review_id,
        "author_id": author_id,
        "work_id": work_id,
        "overall_rating": 3.5
    }))
}

pub fn memory_store() -> Arc<dyn GraphStore> {
    Arc::new(SqliteStore::open_in_memory().expect("in-memory store"))
}

pub async fn pipeline_over(store: Arc<dyn GraphStore>) -> Pipeline {
    Pipeline::with_store(store, PipelineOptions::default())
        .await
        .expect("pipeline opens")
}

/// Let timestamps taken before and after this call differ
pub async fn tick() {
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
}
