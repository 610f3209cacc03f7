//! Data models.
//!
//! Generic [`Document`]s live in whitelisted [`Collection`]s. Typed records
//! ([`Theme`], [`FocusInitiative`], [`Topic`], [`Entity`], [`Relation`],
//! [`OrgNode`]) are lenient views over those documents.

mod document;
mod graph;
mod progress;
mod query;
mod records;
mod sync;

pub use document::{Collection, Document, Fields, fields_from_value};
pub use graph::{
    DiagramLink, DiagramNode, DiagramStats, LinkKind, NodeKind, RelationshipDiagram, TypeFilter,
};
pub use progress::{
    LogEntry, LogKind, RegenerationProgress, RegenerationStats, RegenerationStatus,
};
pub use query::{
    Condition, Operator, QueryConditions, SortDirection, compare_values, sort_order,
    validate_field_name, values_equal,
};
pub use records::{
    Entity, FocusInitiative, OrgNode, Relation, StringList, SyncFlag, Theme, Topic, TopicKey,
};
pub use sync::{
    OrgScope, RecordKind, SYNC_ATTEMPT_FIELD, SYNC_ERROR_FIELD, SYNC_FLAG_FIELD,
};
