//! Persisted graph schema
//!
//! Label and relationship type names are part of the stored format and
//! must not change.

use serde::{Deserialize, Serialize};

/// Node label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Work,
    Person,
    Review,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Work, Label::Person, Label::Review];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Person => "Person",
            Self::Review => "Review",
        }
    }

    /// The unique key property for nodes with this label
    pub fn key_field(&self) -> &'static str {
        match self {
            Self::Work => "work_id",
            Self::Person => "author_id",
            Self::Review => "review_id",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Work" => Some(Self::Work),
            "Person" => Some(Self::Person),
            "Review" => Some(Self::Review),
            _ => None,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship type. Relationships carry no properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelType {
    /// Person -> Work
    WroteWork,
    /// Person -> Review
    WroteReview,
    /// Review -> Work
    Reviews,
}

impl RelType {
    pub const ALL: [RelType; 3] = [RelType::WroteWork, RelType::WroteReview, RelType::Reviews];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WroteWork => "WROTE_WORK",
            Self::WroteReview => "WROTE_REVIEW",
            Self::Reviews => "REVIEWS",
        }
    }

    /// Required (source, target) labels
    pub fn endpoints(&self) -> (Label, Label) {
        match self {
            Self::WroteWork => (Label::Person, Label::Work),
            Self::WroteReview => (Label::Person, Label::Review),
            Self::Reviews => (Label::Review, Label::Work),
        }
    }
}

impl std::fmt::Display for RelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a node: its label plus its unique key value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub label: Label,
    pub value: i64,
}

impl NodeKey {
    pub fn new(label: Label, value: i64) -> Self {
        Self { label, value }
    }

    pub fn work(work_id: i64) -> Self {
        Self::new(Label::Work, work_id)
    }

    pub fn person(author_id: i64) -> Self {
        Self::new(Label::Person, author_id)
    }

    pub fn review(review_id: i64) -> Self {
        Self::new(Label::Review, review_id)
    }

    pub fn key_field(&self) -> &'static str {
        self.label.key_field()
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.label, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_names_round_trip() {
        for label in Label::ALL {
            assert_eq!(Label::parse(label.as_str()), Some(label));
        }
        assert_eq!(Label::parse("User"), None);
    }

    #[test]
    fn relationship_names_are_stable() {
        assert_eq!(RelType::WroteWork.as_str(), "WROTE_WORK");
        assert_eq!(RelType::WroteReview.as_str(), "WROTE_REVIEW");
        assert_eq!(RelType::Reviews.as_str(), "REVIEWS");
    }

    #[test]
    fn relationship_endpoints_are_directional() {
        assert_eq!(RelType::WroteWork.endpoints(), (Label::Person, Label::Work));
        assert_eq!(RelType::WroteReview.endpoints(), (Label::Person, Label::Review));
        assert_eq!(RelType::Reviews.endpoints(), (Label::Review, Label::Work));
    }

    #[test]
    fn node_key_display() {
        assert_eq!(NodeKey::person(555).to_string(), "Person(555)");
        assert_eq!(NodeKey::work(89034).key_field(), "work_id");
    }
}
