//! Run-scoped verdict and error state.

use catcheck_types::{CheckId, ErrorKind, RaisedError, SegmentFailure, Violation};
use serde::Serialize;

/// What one check run left behind for the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckRun {
    pub check: CheckId,
    pub violations: Vec<Violation>,
    pub segment_failures: Vec<SegmentFailure>,
    /// Set when the check failed outright instead of producing findings.
    pub error: Option<String>,
}

impl CheckRun {
    #[must_use]
    pub fn new(check: CheckId) -> Self {
        Self {
            check,
            violations: Vec::new(),
            segment_failures: Vec::new(),
            error: None,
        }
    }

    /// Whether this run contributes a "Failed test" block.
    #[must_use]
    pub fn failed(&self) -> bool {
        !self.violations.is_empty() || !self.segment_failures.is_empty() || self.error.is_some()
    }
}

/// Verdict, raised errors and retained check runs for one invocation.
///
/// `check_status` starts true and only ever moves to false. Raised errors
/// are append-only.
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    database: String,
    check_status: bool,
    errors: Vec<RaisedError>,
    runs: Vec<CheckRun>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new("postgres")
    }
}

impl RunContext {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            check_status: true,
            errors: Vec::new(),
            runs: Vec::new(),
        }
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub const fn check_status(&self) -> bool {
        self.check_status
    }

    pub fn fail(&mut self) {
        self.check_status = false;
    }

    /// Record an error kind. Any raised kind fails the run.
    pub fn raise(&mut self, error: RaisedError) {
        self.check_status = false;
        self.errors.push(error);
    }

    #[must_use]
    pub fn errors(&self) -> &[RaisedError] {
        &self.errors
    }

    #[must_use]
    pub fn has_raised(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn errors_of(&self, kind: ErrorKind) -> impl Iterator<Item = &RaisedError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    pub fn record_run(&mut self, run: CheckRun) {
        self.runs.push(run);
    }

    #[must_use]
    pub fn runs(&self) -> &[CheckRun] {
        &self.runs
    }

    /// Violations plus segment failures plus outright check errors.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.runs
            .iter()
            .map(|run| {
                run.violations.len() + run.segment_failures.len() + usize::from(run.error.is_some())
            })
            .sum()
    }

    /// 0 on pass; otherwise the highest raised kind's code, NOREPAIR if a
    /// violation failed the run without raising anything.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.check_status {
            return 0;
        }
        self.errors
            .iter()
            .map(|e| e.kind)
            .max()
            .unwrap_or(ErrorKind::NoRepair)
            .exit_code()
    }
}
