//! Typed input records
//!
//! Records arrive from the extraction side already type-checked. The only
//! thing the pipeline enforces is that each record carries its own key.

mod types;

pub use types::{PersonProfile, Review, Work};

use serde::{Deserialize, Serialize};

/// Discriminant of a [`Record`], used for logging and outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Work,
    Review,
    Person,
}

impl RecordKind {
    /// Name of the record's own key field
    pub fn key_field(&self) -> &'static str {
        match self {
            Self::Work => "work_id",
            Self::Review => "review_id",
            Self::Person => "author_id",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Work => write!(f, "work"),
            Self::Review => write!(f, "review"),
            Self::Person => write!(f, "person"),
        }
    }
}

/// One unit of input. Each record is written in its own transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Work(Work),
    Review(Review),
    Person(PersonProfile),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Work(_) => RecordKind::Work,
            Self::Review(_) => RecordKind::Review,
            Self::Person(_) => RecordKind::Person,
        }
    }

    /// The record's own unique key, if present
    pub fn key(&self) -> Option<i64> {
        match self {
            Self::Work(w) => w.work_id,
            Self::Review(r) => r.review_id,
            Self::Person(p) => p.author_id,
        }
    }
}

impl From<Work> for Record {
    fn from(work: Work) -> Self {
        Self::Work(work)
    }
}

impl From<Review> for Record {
    fn from(review: Review) -> Self {
        Self::Review(review)
    }
}

impl From<PersonProfile> for Record {
    fn from(profile: PersonProfile) -> Self {
        Self::Person(profile)
    }
}
