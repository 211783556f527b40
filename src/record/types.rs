//! Record payloads
//!
//! Every non-key field is optional: an absent field means "unknown", and
//! unknown values are never written over known ones.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A catalogued work (one fiction page)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub work_id: Option<i64>,
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub author_id: Option<i64>,
    pub url: Option<String>,
    pub description: Option<String>,
    /// Ordered as shown on the source page
    pub tags: Option<Vec<String>>,
    pub rating: Option<f64>,
    pub follower_count: Option<i64>,
    pub last_updated: Option<String>,
    pub scraped_at: Option<String>,
    pub version: Option<i64>,
}

/// A review left on a work
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: Option<i64>,
    pub review_title: Option<String>,
    pub review_text: Option<String>,
    pub author_name: Option<String>,
    pub author_id: Option<i64>,
    /// ISO 8601 datetime string
    pub reviewed_at_time: Option<String>,
    pub reviewed_at_chapter: Option<String>,
    /// 0.0 to 5.0 in half-star steps
    pub overall_rating: Option<f64>,
    pub work_id: Option<i64>,

    // Only present when the reviewer opted into detailed ratings
    pub style_rating: Option<f64>,
    pub story_rating: Option<f64>,
    pub grammar_rating: Option<f64>,
    pub character_rating: Option<f64>,
}

/// A full author profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonProfile {
    pub author_id: Option<i64>,
    pub username: Option<String>,
    /// Any further profile fields. Nulls and nested objects are not written.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}
