//! Graph schema, property values and merge specifications

mod merge;
mod property;
mod schema;

pub use merge::{
    person_merge, review_merge, work_merge, MergeBuilder, MergeSpec, TimestampPolicy, CREATED_AT,
    UPDATED_AT,
};
pub use property::{Properties, PropertyValue};
pub use schema::{Label, NodeKey, RelType};
