//! Record router: from one record to the ordered writes it implies
//!
//! Planning is pure, so a record that cannot be written (no key of its
//! own) is rejected before a transaction is ever opened.

use super::writer::{write_node, write_relationship};
use crate::graph::{person_merge, review_merge, work_merge, MergeSpec, NodeKey, RelType};
use crate::record::{Record, RecordKind};
use crate::storage::{GraphTxn, StorageResult};
use thiserror::Error;

/// Why a record was skipped without any write
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("{kind} record has no {field}")]
    MissingKey { kind: RecordKind, field: &'static str },
}

/// One write in a plan
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Node(MergeSpec),
    Edge {
        rel: RelType,
        from: NodeKey,
        to: NodeKey,
    },
}

/// All writes for one record, in execution order
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub kind: RecordKind,
    pub key: i64,
    pub ops: Vec<WriteOp>,
}

impl WritePlan {
    pub fn for_record(record: &Record) -> Result<Self, RejectionReason> {
        let kind = record.kind();
        let key = record.key().ok_or(RejectionReason::MissingKey {
            kind,
            field: kind.key_field(),
        })?;

        let mut ops = Vec::new();
        match record {
            Record::Work(work) => {
                let work_key = NodeKey::work(key);
                ops.push(WriteOp::Node(work_merge(key, work)));
                if let Some(author_id) = work.author_id {
                    let person = NodeKey::person(author_id);
                    ops.push(WriteOp::Node(MergeSpec::minimal(person)));
                    ops.push(WriteOp::Edge {
                        rel: RelType::WroteWork,
                        from: person,
                        to: work_key,
                    });
                }
            }
            Record::Review(review) => {
                let review_key = NodeKey::review(key);
                ops.push(WriteOp::Node(review_merge(key, review)));
                if let Some(author_id) = review.author_id {
                    let person = NodeKey::person(author_id);
                    ops.push(WriteOp::Node(MergeSpec::minimal(person)));
                    ops.push(WriteOp::Edge {
                        rel: RelType::WroteReview,
                        from: person,
                        to: review_key,
                    });
                }
                if let Some(work_id) = review.work_id {
                    ops.push(WriteOp::Edge {
                        rel: RelType::Reviews,
                        from: review_key,
                        to: NodeKey::work(work_id),
                    });
                }
            }
            Record::Person(profile) => {
                ops.push(WriteOp::Node(person_merge(key, profile)));
            }
        }

        Ok(Self { kind, key, ops })
    }

    /// Execute every write inside `txn`. Returns the number of writes.
    pub async fn apply(&self, txn: &mut dyn GraphTxn) -> StorageResult<usize> {
        for op in &self.ops {
            match op {
                WriteOp::Node(spec) => write_node(txn, spec).await?,
                WriteOp::Edge { rel, from, to } => write_relationship(txn, *rel, from, to).await?,
            }
        }
        Ok(self.ops.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PersonProfile, Review, Work};

    fn edges(plan: &WritePlan) -> Vec<(RelType, NodeKey, NodeKey)> {
        plan.ops
            .iter()
            .filter_map(|op| match op {
                WriteOp::Edge { rel, from, to } => Some((*rel, *from, *to)),
                WriteOp::Node(_) => None,
            })
            .collect()
    }

    #[test]
    fn work_with_author_plans_person_and_edge() {
        let record = Record::from(Work {
            work_id: Some(89034),
            author_id: Some(555),
            title: Some("Nightmare Realm Summoner".into()),
            ..Default::default()
        });
        let plan = WritePlan::for_record(&record).unwrap();

        assert_eq!(plan.kind, RecordKind::Work);
        assert_eq!(plan.key, 89034);
        assert_eq!(plan.ops.len(), 3);
        assert!(matches!(&plan.ops[0], WriteOp::Node(spec) if spec.key == NodeKey::work(89034)));
        assert!(matches!(&plan.ops[1], WriteOp::Node(spec) if spec.key == NodeKey::person(555) && spec.is_minimal()));
        assert_eq!(
            edges(&plan),
            vec![(RelType::WroteWork, NodeKey::person(555), NodeKey::work(89034))]
        );
    }

    #[test]
    fn work_without_author_writes_only_the_work() {
        let record = Record::from(Work {
            work_id: Some(1),
            ..Default::default()
        });
        let plan = WritePlan::for_record(&record).unwrap();
        assert_eq!(plan.ops.len(), 1);
    }

    #[test]
    fn review_plans_authorship_and_reviews_edges() {
        let record = Record::from(Review {
            review_id: Some(42),
            author_id: Some(555),
            work_id: Some(89034),
            ..Default::default()
        });
        let plan = WritePlan::for_record(&record).unwrap();

        assert_eq!(
            edges(&plan),
            vec![
                (RelType::WroteReview, NodeKey::person(555), NodeKey::review(42)),
                (RelType::Reviews, NodeKey::review(42), NodeKey::work(89034)),
            ]
        );
    }

    #[test]
    fn review_without_work_id_has_no_reviews_edge() {
        let record = Record::from(Review {
            review_id: Some(42),
            ..Default::default()
        });
        let plan = WritePlan::for_record(&record).unwrap();
        assert_eq!(plan.ops.len(), 1);
        assert!(edges(&plan).is_empty());
    }

    #[test]
    fn person_profile_is_a_single_full_merge() {
        let record = Record::from(PersonProfile {
            author_id: Some(7),
            username: Some("jane".into()),
            ..Default::default()
        });
        let plan = WritePlan::for_record(&record).unwrap();
        assert!(matches!(&plan.ops[..], [WriteOp::Node(spec)] if !spec.is_minimal()));
    }

    #[test]
    fn keyless_records_are_rejected() {
        let review = Record::from(Review {
            review_title: Some("Great read".into()),
            work_id: Some(1),
            ..Default::default()
        });
        assert_eq!(
            WritePlan::for_record(&review),
            Err(RejectionReason::MissingKey {
                kind: RecordKind::Review,
                field: "review_id"
            })
        );

        let work = Record::from(Work::default());
        assert!(WritePlan::for_record(&work).is_err());
    }
}
