//! Repair eligibility and repair script generation.
//!
//! ```text
//!   ExtraOrMissingIssue
//!        │
//!        ├─ missing ───────────────────────────► NOREPAIR
//!        ├─ extra, repair disabled ────────────► NOREPAIR
//!        └─ extra, repair enabled ─► generator ─► REMOVE + artifact ─► sink
//!                                      │ error
//!                                      └─────────► NOREPAIR
//! ```
//!
//! The classifier never touches the catalog; it only decides and records.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use catcheck_error::{CatcheckError, Result};
use catcheck_types::{CheckId, ErrorKind, ExtraOrMissingIssue, IssueKind, RaisedError};
use tracing::{Level, info, warn};

use crate::checks::{quote_ident, quote_literal};
use crate::context::RunContext;
use crate::sink::ReportSink;

pub trait RepairGenerator: Send + Sync {
    /// Produce a repair artifact for `issue` and return its path.
    fn create_repair_for_extra_or_missing(&self, issue: &ExtraOrMissingIssue) -> Result<PathBuf>;
}

/// Writes one SQL script per issue into a directory, created on demand.
#[derive(Debug, Clone)]
pub struct FileRepairGenerator {
    dir: PathBuf,
}

impl FileRepairGenerator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<table>_<attribute>_<kind>.sql`, restricted to filename-safe chars.
    #[must_use]
    pub fn file_name(issue: &ExtraOrMissingIssue) -> String {
        let sanitize = |s: &str| -> String {
            s.chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
                .collect()
        };
        format!(
            "{}_{}_{}.sql",
            sanitize(&issue.table),
            sanitize(&issue.attribute),
            issue.kind
        )
    }

    fn script(issue: &ExtraOrMissingIssue) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "-- catcheck repair: {} {} row(s) in {} keyed by {}",
            issue.entries.len(),
            issue.kind,
            issue.table,
            issue.attribute
        );
        let _ = writeln!(out, "-- run on each listed content id in utility mode");
        for (key, contents) in &issue.entries {
            for content in contents {
                let _ = writeln!(
                    out,
                    "-- content {content}\nDELETE FROM {} WHERE CAST({} AS TEXT) = {};",
                    quote_ident(&issue.table),
                    quote_ident(&issue.attribute),
                    quote_literal(key)
                );
            }
        }
        out
    }
}

impl RepairGenerator for FileRepairGenerator {
    fn create_repair_for_extra_or_missing(&self, issue: &ExtraOrMissingIssue) -> Result<PathBuf> {
        if issue.kind != IssueKind::Extra {
            return Err(CatcheckError::Repair {
                message: format!("no removal script for {} rows of {}", issue.kind, issue.subject()),
            });
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(Self::file_name(issue));
        fs::write(&path, Self::script(issue))?;
        info!(path = %path.display(), issue = %issue.subject(), "wrote repair script");
        Ok(path)
    }
}

/// Outcome for one classified issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairDecision {
    NoAction,
    FlagUnrepairable,
    GenerateArtifact(PathBuf),
}

pub struct RepairClassifier<'a> {
    generator: Option<&'a dyn RepairGenerator>,
    sink: &'a dyn ReportSink,
}

impl<'a> RepairClassifier<'a> {
    /// `generator == None` means repair mode is disabled.
    pub fn new(generator: Option<&'a dyn RepairGenerator>, sink: &'a dyn ReportSink) -> Self {
        Self { generator, sink }
    }

    #[must_use]
    pub fn repair_enabled(&self) -> bool {
        self.generator.is_some()
    }

    /// Decide every issue and record the resulting error kinds in `ctx`.
    /// A repeated `(table, attribute, kind)` key in the same batch is
    /// [`RepairDecision::NoAction`].
    pub fn classify(
        &self,
        issues: &[ExtraOrMissingIssue],
        check: Option<CheckId>,
        ctx: &mut RunContext,
    ) -> Vec<RepairDecision> {
        let mut seen = BTreeSet::new();
        issues
            .iter()
            .map(|issue| {
                if !seen.insert((issue.table.as_str(), issue.attribute.as_str(), issue.kind)) {
                    return RepairDecision::NoAction;
                }
                let decision = self.decide(issue);
                let kind = match decision {
                    RepairDecision::NoAction => return RepairDecision::NoAction,
                    RepairDecision::FlagUnrepairable => ErrorKind::NoRepair,
                    RepairDecision::GenerateArtifact(_) => ErrorKind::Remove,
                };
                let mut raised = RaisedError::new(kind, issue.subject());
                if let Some(check) = check {
                    raised = raised.with_check(check);
                }
                if let RepairDecision::GenerateArtifact(path) = &decision {
                    self.sink.print_repair_issues(path);
                    raised = raised.with_artifact(path.clone());
                }
                ctx.raise(raised);
                decision
            })
            .collect()
    }

    fn decide(&self, issue: &ExtraOrMissingIssue) -> RepairDecision {
        match (issue.kind, self.generator) {
            (IssueKind::Missing, _) | (IssueKind::Extra, None) => RepairDecision::FlagUnrepairable,
            (IssueKind::Extra, Some(generator)) => {
                match generator.create_repair_for_extra_or_missing(issue) {
                    Ok(path) => RepairDecision::GenerateArtifact(path),
                    Err(err) => {
                        warn!(issue = %issue.subject(), error = %err, "repair generation failed");
                        self.sink.log(
                            Level::ERROR,
                            &format!("Could not generate repair for {}: {err}", issue.subject()),
                        );
                        RepairDecision::FlagUnrepairable
                    }
                }
            }
        }
    }
}
