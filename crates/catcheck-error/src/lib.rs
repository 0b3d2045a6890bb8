//! Error type shared by every catcheck crate.
//!
//! Only [`CatcheckError::UnknownCheck`] is meant to travel all the way to the
//! caller of a check run. Query, connect and segment-task failures are
//! normally caught by the orchestrator and recorded as error kinds instead.

use std::io;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, CatcheckError>;

#[derive(Debug, thiserror::Error)]
pub enum CatcheckError {
    /// A check name that is not present in the registry.
    #[error("unknown check: {name}")]
    UnknownCheck { name: String },

    /// A catalog query failed on some connection.
    #[error("query failed: {message} (sql: {sql})")]
    Query { sql: String, message: String },

    /// Could not open a connection to a cluster member.
    #[error("cannot connect to segment dbid {dbid}: {message}")]
    Connect { dbid: i32, message: String },

    /// A per-segment work unit failed or panicked.
    #[error("segment task for dbid {dbid} failed: {message}")]
    SegmentTask { dbid: i32, message: String },

    /// The repair generator could not produce an artifact.
    #[error("repair generation failed: {message}")]
    Repair { message: String },

    /// Invalid cluster layout, config file or option value.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CatcheckError {
    pub fn query(sql: impl Into<String>, message: impl ToString) -> Self {
        Self::Query {
            sql: sql.into(),
            message: message.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this is the lookup failure raised for an unregistered check.
    #[must_use]
    pub const fn is_lookup_failure(&self) -> bool {
        matches!(self, Self::UnknownCheck { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_check_is_lookup_failure() {
        let err = CatcheckError::UnknownCheck {
            name: "bogus".to_owned(),
        };
        assert!(err.is_lookup_failure(), "case=unknown_check_lookup");
        assert_eq!(err.to_string(), "unknown check: bogus");
    }

    #[test]
    fn other_variants_are_not_lookup_failures() {
        let err = CatcheckError::query("SELECT 1", "boom");
        assert!(!err.is_lookup_failure(), "case=query_not_lookup");
        assert!(err.to_string().contains("SELECT 1"));

        let io_err: CatcheckError = io::Error::other("disk").into();
        assert!(!io_err.is_lookup_failure(), "case=io_not_lookup");
    }
}
