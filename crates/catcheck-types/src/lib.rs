//! Core data model for catcheck: cluster members, check identifiers,
//! violation records and the error kinds a run accumulates.

pub mod check_id;
pub mod error_kind;
pub mod segment;
pub mod violation;

pub use check_id::CheckId;
pub use error_kind::{ErrorKind, RaisedError, SegmentFailure};
pub use segment::{COORDINATOR_CONTENT, Segment, SegmentRegistry};
pub use violation::{
    ExtraOrMissingIssue, IssueKind, PersistentViolation, Reportable, UniqueIndexViolation,
    Violation,
};
