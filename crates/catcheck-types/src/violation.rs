//! Violation records produced by checks.
//!
//! Each record category is its own struct; [`Violation`] is the tagged union
//! the orchestrator retains between a check run and the report. Everything
//! here can render itself into a single report line via [`Reportable`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Render-to-line capability shared by every violation record.
pub trait Reportable {
    /// One indented report line describing the record.
    fn report_line(&self) -> String;
}

// ---------------------------------------------------------------------------
// Unique index violations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueIndexViolation {
    pub table_oid: i64,
    pub table_name: String,
    pub index_name: String,
    /// Comma separated indexed columns, as stored in the catalog.
    pub column_names: String,
    /// Content ids of the members holding duplicate keys.
    pub violated_segments: BTreeSet<i32>,
}

impl Reportable for UniqueIndexViolation {
    fn report_line(&self) -> String {
        format!(
            "    Table {} has a violated unique index: {}",
            self.table_name, self.index_name
        )
    }
}

// ---------------------------------------------------------------------------
// Extra / missing catalog rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Row present on a member where the coordinator has none.
    Extra,
    /// Row present on the coordinator but absent from a member.
    Missing,
}

impl IssueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extra => "extra",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All extra (or all missing) rows of one catalog table, keyed by attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraOrMissingIssue {
    pub table: String,
    pub attribute: String,
    pub kind: IssueKind,
    /// Offending key value -> content ids where the discrepancy was seen.
    pub entries: BTreeMap<String, BTreeSet<i32>>,
}

impl ExtraOrMissingIssue {
    pub fn new(table: impl Into<String>, attribute: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            table: table.into(),
            attribute: attribute.into(),
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn add_entry(&mut self, key: impl Into<String>, content: i32) {
        self.entries.entry(key.into()).or_default().insert(content);
    }

    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, content: i32) -> Self {
        self.add_entry(key, content);
        self
    }

    /// `(table, attribute)` pair the issue is keyed on.
    #[must_use]
    pub fn key(&self) -> (&str, &str) {
        (&self.table, &self.attribute)
    }

    /// Human-readable issue key used in error payloads, e.g. `pg_class.oid`.
    #[must_use]
    pub fn subject(&self) -> String {
        format!("{}.{}", self.table, self.attribute)
    }

    /// Union of content ids across all entries.
    #[must_use]
    pub fn contents(&self) -> BTreeSet<i32> {
        self.entries.values().flatten().copied().collect()
    }
}

impl Reportable for ExtraOrMissingIssue {
    fn report_line(&self) -> String {
        if self.entries.is_empty() {
            return format!(
                "    Table {} has {} rows keyed by {}",
                self.table, self.kind, self.attribute
            );
        }
        let contents = self
            .contents()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "    Table {} has {} {} row(s) keyed by {} on content(s) {}",
            self.table,
            self.entries.len(),
            self.kind,
            self.attribute,
            contents
        )
    }
}

// ---------------------------------------------------------------------------
// Persistent table violations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentViolation {
    pub dbid: i32,
    pub content: i32,
    pub relfilenode: i64,
    pub state: i64,
}

impl Reportable for PersistentViolation {
    fn report_line(&self) -> String {
        format!(
            "    Segment dbid {} (content {}) has a persistent entry without pg_class: relfilenode {}",
            self.dbid, self.content, self.relfilenode
        )
    }
}

// ---------------------------------------------------------------------------
// Tagged union
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Violation {
    UniqueIndex(UniqueIndexViolation),
    ExtraOrMissing(ExtraOrMissingIssue),
    Persistent(PersistentViolation),
}

impl Violation {
    /// The extra/missing payload, if this record carries one.
    #[must_use]
    pub fn as_extra_or_missing(&self) -> Option<&ExtraOrMissingIssue> {
        match self {
            Self::ExtraOrMissing(issue) => Some(issue),
            _ => None,
        }
    }
}

impl Reportable for Violation {
    fn report_line(&self) -> String {
        match self {
            Self::UniqueIndex(v) => v.report_line(),
            Self::ExtraOrMissing(v) => v.report_line(),
            Self::Persistent(v) => v.report_line(),
        }
    }
}

impl From<UniqueIndexViolation> for Violation {
    fn from(value: UniqueIndexViolation) -> Self {
        Self::UniqueIndex(value)
    }
}

impl From<ExtraOrMissingIssue> for Violation {
    fn from(value: ExtraOrMissingIssue) -> Self {
        Self::ExtraOrMissing(value)
    }
}

impl From<PersistentViolation> for Violation {
    fn from(value: PersistentViolation) -> Self {
        Self::Persistent(value)
    }
}
