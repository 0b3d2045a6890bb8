//! Summary report rendering.
//!
//! Rendering only reads the [`RunContext`]; rendering twice yields the same
//! lines and never re-runs a check.

use catcheck_types::{CheckId, RaisedError, Reportable};
use serde::Serialize;
use tracing::Level;

use crate::context::{CheckRun, RunContext};
use crate::sink::ReportSink;

const RULE: &str = "===================================================================";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub level: Level,
    pub text: String,
}

impl ReportLine {
    fn info(text: impl Into<String>) -> Self {
        Self {
            level: Level::INFO,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            level: Level::ERROR,
            text: text.into(),
        }
    }
}

#[must_use]
pub fn render_report(ctx: &RunContext) -> Vec<ReportLine> {
    let mut lines = vec![
        ReportLine::info("SUMMARY REPORT"),
        ReportLine::info(RULE),
        ReportLine::info(format!(
            "Completed {} test(s) on database '{}'",
            ctx.runs().len(),
            ctx.database()
        )),
    ];

    if ctx.check_status() {
        lines.push(ReportLine::info("Found no catalog issue"));
        return lines;
    }

    lines.push(ReportLine::error(format!(
        "Found a total of {} issue(s)",
        ctx.issue_count()
    )));

    for run in ctx.runs().iter().filter(|run| run.failed()) {
        lines.push(ReportLine::error(format!("Failed test '{}':", run.check)));
        if let Some(err) = &run.error {
            lines.push(ReportLine::error(format!("    {err}")));
        }
        lines.extend(
            run.violations
                .iter()
                .map(|v| ReportLine::error(v.report_line())),
        );
        if !run.segment_failures.is_empty() {
            lines.push(ReportLine::error("Segment failures:"));
            lines.extend(
                run.segment_failures
                    .iter()
                    .map(|f| ReportLine::error(f.report_line())),
            );
        }
    }

    // Errors raised outside any check, e.g. leaked-schema cleanup.
    for raised in ctx.errors().iter().filter(|e| e.check.is_none()) {
        let detail = raised
            .detail
            .as_deref()
            .map(|d| format!(": {d}"))
            .unwrap_or_default();
        lines.push(ReportLine::error(format!(
            "Error {} on {}{detail}",
            raised.kind, raised.subject
        )));
    }

    lines
}

/// Render and emit the report through `sink`.
pub fn checkcat_report(ctx: &RunContext, sink: &dyn ReportSink) -> Vec<ReportLine> {
    let lines = render_report(ctx);
    for line in &lines {
        sink.log(line.level, &line.text);
    }
    lines
}

/// Machine-readable run outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub database: String,
    pub passed: bool,
    pub exit_code: u8,
    pub checks: Vec<CheckId>,
    pub issue_count: usize,
    pub errors: Vec<RaisedError>,
    pub runs: Vec<CheckRun>,
}

impl RunSummary {
    pub fn to_json_pretty(&self) -> catcheck_error::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| catcheck_error::CatcheckError::config(format!("cannot encode summary: {err}")))
    }
}

impl From<&RunContext> for RunSummary {
    fn from(ctx: &RunContext) -> Self {
        Self {
            database: ctx.database().to_owned(),
            passed: ctx.check_status(),
            exit_code: ctx.exit_code(),
            checks: ctx.runs().iter().map(|run| run.check).collect(),
            issue_count: ctx.issue_count(),
            errors: ctx.errors().to_vec(),
            runs: ctx.runs().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use catcheck_types::{ErrorKind, SegmentFailure, UniqueIndexViolation, Violation};

    use super::*;
    use crate::sink::MemorySink;

    fn texts(lines: &[ReportLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn passing_run_reports_no_issue() {
        let mut ctx = RunContext::new("gpdb");
        ctx.record_run(CheckRun::new(CheckId::Persistent));
        let lines = render_report(&ctx);
        assert_eq!(
            texts(&lines),
            vec![
                "SUMMARY REPORT",
                RULE,
                "Completed 1 test(s) on database 'gpdb'",
                "Found no catalog issue"
            ]
        );
        assert!(lines.iter().all(|l| l.level == Level::INFO));
    }

    #[test]
    fn failing_run_lists_violations_and_segment_failures() {
        let mut ctx = RunContext::new("gpdb");
        let mut run = CheckRun::new(CheckId::UniqueIndexViolation);
        run.violations.push(Violation::from(UniqueIndexViolation {
            table_oid: 123,
            table_name: "stephen_table".to_owned(),
            index_name: "finger".to_owned(),
            column_names: "c1, c2".to_owned(),
            violated_segments: BTreeSet::from([-1, 8]),
        }));
        run.segment_failures.push(SegmentFailure {
            dbid: 4,
            content: 2,
            message: "connection refused".to_owned(),
        });
        ctx.record_run(run);
        ctx.raise(RaisedError::new(ErrorKind::NoRepair, "leaked_schemas").with_detail("denied"));

        let lines = render_report(&ctx);
        let text = texts(&lines);
        assert!(text.contains(&"Found a total of 2 issue(s)"));
        assert!(text.contains(&"Failed test 'unique_index_violation':"));
        assert!(text.contains(&"    Table stephen_table has a violated unique index: finger"));
        assert!(text.contains(&"Segment failures:"));
        assert!(text.contains(&"    dbid 4 (content 2): connection refused"));
        assert!(text.contains(&"Error NOREPAIR on leaked_schemas: denied"));
    }

    #[test]
    fn report_is_idempotent() {
        let mut ctx = RunContext::default();
        let mut run = CheckRun::new(CheckId::MissingExtra);
        run.error = Some("boom".to_owned());
        ctx.record_run(run);
        ctx.fail();

        let sink = MemorySink::new();
        let first = checkcat_report(&ctx, &sink);
        let second = checkcat_report(&ctx, &sink);
        assert_eq!(first, second, "case=idempotent_render");
        assert_eq!(sink.messages().len(), first.len() * 2);
    }

    #[test]
    fn summary_mirrors_context() {
        let mut ctx = RunContext::new("db1");
        ctx.record_run(CheckRun::new(CheckId::Persistent));
        ctx.raise(RaisedError::new(ErrorKind::Remove, "pg_class.oid"));
        let summary = RunSummary::from(&ctx);
        assert!(!summary.passed);
        assert_eq!(summary.exit_code, 1);
        assert_eq!(summary.checks, vec![CheckId::Persistent]);
        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["errors"][0]["kind"], "REMOVE");
    }
}
