//! Merge specifications (idempotent upserts)
//!
//! A [`MergeSpec`] says which node to upsert, which properties to set and
//! how timestamps behave. Building one performs no I/O. Minimal nodes and
//! full nodes go through the same spec type, so a minimal node written
//! first is upgraded in place when the full data arrives.

use super::property::{Properties, PropertyValue};
use super::schema::NodeKey;
use crate::record::{PersonProfile, Review, Work};

/// Property names owned by the writer, never taken from input
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// How `created_at` / `updated_at` are maintained by a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampPolicy {
    /// Set both on create, set only `updated_at` on match
    #[default]
    Upsert,
    /// Set both on create, leave an existing node untouched
    EnsureExists,
}

/// An idempotent upsert of one node
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSpec {
    pub key: NodeKey,
    /// Never contains the key field, timestamps, or absent values
    pub properties: Properties,
    pub timestamps: TimestampPolicy,
}

impl MergeSpec {
    /// Key-only merge: creates a minimal node or touches `updated_at`
    pub fn minimal(key: NodeKey) -> Self {
        Self {
            key,
            properties: Properties::new(),
            timestamps: TimestampPolicy::Upsert,
        }
    }

    /// Key-only merge that leaves an existing node as it is
    pub fn ensure(key: NodeKey) -> Self {
        Self {
            key,
            properties: Properties::new(),
            timestamps: TimestampPolicy::EnsureExists,
        }
    }

    pub fn builder(key: NodeKey) -> MergeBuilder {
        MergeBuilder {
            key,
            properties: Properties::new(),
        }
    }

    pub fn is_minimal(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn key_field(&self) -> &'static str {
        self.key.key_field()
    }
}

/// Accumulates "set if present" properties for a [`MergeSpec`]
#[derive(Debug, Clone)]
pub struct MergeBuilder {
    key: NodeKey,
    properties: Properties,
}

impl MergeBuilder {
    /// Set `name` when `value` is present; absent values are skipped so an
    /// existing property is never cleared by omission. Non-finite floats
    /// count as absent.
    pub fn set<V: Into<PropertyValue>>(mut self, name: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.insert(name, value.into());
        }
        self
    }

    /// Set a property from free-form JSON (nulls and objects are skipped)
    pub fn set_json(mut self, name: &str, value: &serde_json::Value) -> Self {
        if let Some(value) = PropertyValue::from_json(value) {
            self.insert(name, value);
        }
        self
    }

    fn insert(&mut self, name: &str, value: PropertyValue) {
        if name == self.key.key_field() || name == CREATED_AT || name == UPDATED_AT {
            return;
        }
        if let Some(value) = value.finite() {
            self.properties.insert(name.to_string(), value);
        }
    }

    pub fn build(self) -> MergeSpec {
        MergeSpec {
            key: self.key,
            properties: self.properties,
            timestamps: TimestampPolicy::Upsert,
        }
    }
}

/// Full Work merge
pub fn work_merge(work_id: i64, work: &Work) -> MergeSpec {
    MergeSpec::builder(NodeKey::work(work_id))
        .set("title", work.title.clone())
        .set("author_name", work.author_name.clone())
        .set("author_id", work.author_id)
        .set("url", work.url.clone())
        .set("description", work.description.clone())
        .set("tags", work.tags.clone())
        .set("rating", work.rating)
        .set("follower_count", work.follower_count)
        .set("last_updated", work.last_updated.clone())
        .set("scraped_at", work.scraped_at.clone())
        .set("version", work.version)
        .build()
}

/// Full Review merge, including whichever detailed ratings are present
pub fn review_merge(review_id: i64, review: &Review) -> MergeSpec {
    MergeSpec::builder(NodeKey::review(review_id))
        .set("review_title", review.review_title.clone())
        .set("review_text", review.review_text.clone())
        .set("author_name", review.author_name.clone())
        .set("author_id", review.author_id)
        .set("reviewed_at_time", review.reviewed_at_time.clone())
        .set("reviewed_at_chapter", review.reviewed_at_chapter.clone())
        .set("overall_rating", review.overall_rating)
        .set("work_id", review.work_id)
        .set("style_rating", review.style_rating)
        .set("story_rating", review.story_rating)
        .set("grammar_rating", review.grammar_rating)
        .set("character_rating", review.character_rating)
        .build()
}

/// Full Person merge from a profile
pub fn person_merge(author_id: i64, profile: &PersonProfile) -> MergeSpec {
    let builder = MergeSpec::builder(NodeKey::person(author_id)).set("username", profile.username.clone());
    profile
        .extra
        .iter()
        .fold(builder, |b, (name, value)| b.set_json(name, value))
        .build()
}
