//! Error kinds recorded during a run and the records that carry them.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::check_id::CheckId;

/// Classification of a recorded failure.
///
/// Kinds are ordered by severity; the process exit code of a failed run is
/// the highest code among the raised kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A removal artifact was generated for the issue.
    Remove,
    /// A segment's work unit failed; its contribution is missing.
    SegmentFailure,
    /// No automated remedy, or repair mode disabled.
    #[serde(rename = "NOREPAIR")]
    NoRepair,
}

impl ErrorKind {
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Remove => 1,
            Self::SegmentFailure => 2,
            Self::NoRepair => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remove => "REMOVE",
            Self::SegmentFailure => "SEGMENT_FAILURE",
            Self::NoRepair => "NOREPAIR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raised error kind with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaisedError {
    pub kind: ErrorKind,
    /// Check that raised it, when raised during a check run.
    pub check: Option<CheckId>,
    /// What the error is about: an issue key, a check name or a segment.
    pub subject: String,
    /// Repair artifact produced for the issue, if any.
    pub artifact: Option<PathBuf>,
    pub detail: Option<String>,
}

impl RaisedError {
    pub fn new(kind: ErrorKind, subject: impl Into<String>) -> Self {
        Self {
            kind,
            check: None,
            subject: subject.into(),
            artifact: None,
            detail: None,
        }
    }

    #[must_use]
    pub const fn with_check(mut self, check: CheckId) -> Self {
        self.check = Some(check);
        self
    }

    #[must_use]
    pub fn with_artifact(mut self, artifact: PathBuf) -> Self {
        self.artifact = Some(artifact);
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Failure marker for one segment's work unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentFailure {
    pub dbid: i32,
    pub content: i32,
    pub message: String,
}

impl SegmentFailure {
    #[must_use]
    pub fn report_line(&self) -> String {
        format!(
            "    dbid {} (content {}): {}",
            self.dbid, self.content, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_matches_exit_codes() {
        let mut kinds = vec![ErrorKind::NoRepair, ErrorKind::Remove, ErrorKind::SegmentFailure];
        kinds.sort();
        let codes: Vec<u8> = kinds.iter().map(|k| k.exit_code()).collect();
        assert_eq!(codes, vec![1, 2, 3], "case=ordered_codes");
        assert_eq!(kinds.iter().max(), Some(&ErrorKind::NoRepair));
    }

    #[test]
    fn kinds_serialize_screaming() {
        let json = serde_json::to_string(&ErrorKind::NoRepair).expect("serialize");
        assert_eq!(json, "\"NOREPAIR\"");
        assert_eq!(ErrorKind::NoRepair.to_string(), "NOREPAIR");
    }

    #[test]
    fn raised_error_builder_sets_payload() {
        let raised = RaisedError::new(ErrorKind::Remove, "pg_class.oid")
            .with_check(CheckId::MissingExtra)
            .with_artifact(PathBuf::from("/tmp/repair/pg_class_oid_extra.sql"));
        assert_eq!(raised.check, Some(CheckId::MissingExtra));
        assert!(raised.artifact.is_some());
        assert!(raised.detail.is_none());
    }
}
