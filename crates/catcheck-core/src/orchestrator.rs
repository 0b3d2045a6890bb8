//! Check orchestration.
//!
//! The orchestrator owns the run-wide collaborators and drives one check at
//! a time. Only an unknown check name escapes as an error; everything a
//! check finds or fails at is recorded in the [`RunContext`].

use std::sync::Arc;

use catcheck_error::Result;
use catcheck_types::{CheckId, ErrorKind, ExtraOrMissingIssue, RaisedError, SegmentRegistry};
use tracing::{Level, error, info};

use crate::connection::{Connection, Connector};
use crate::context::{CheckRun, RunContext};
use crate::registry::{Check, CheckEnv, CheckRegistry};
use crate::repair::{RepairClassifier, RepairGenerator};
use crate::sink::ReportSink;
use crate::task::{TaskLauncher, ThreadLauncher};

pub struct Orchestrator {
    registry: CheckRegistry,
    segments: SegmentRegistry,
    connector: Arc<dyn Connector>,
    launcher: Arc<dyn TaskLauncher>,
    sink: Arc<dyn ReportSink>,
    repair: Option<Arc<dyn RepairGenerator>>,
    batch_size: usize,
}

impl Orchestrator {
    /// Thread launcher, batch size 1 and repair disabled until configured.
    pub fn new(
        registry: CheckRegistry,
        segments: SegmentRegistry,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            registry,
            segments,
            connector,
            launcher: Arc::new(ThreadLauncher),
            sink,
            repair: None,
            batch_size: 1,
        }
    }

    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn TaskLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Enable repair mode with `generator`.
    #[must_use]
    pub fn with_repair_generator(mut self, generator: Arc<dyn RepairGenerator>) -> Self {
        self.repair = Some(generator);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    #[must_use]
    pub fn segments(&self) -> &SegmentRegistry {
        &self.segments
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Look up `name` and run it. Fails only when the name is unknown.
    pub fn run_one_check(
        &self,
        name: &str,
        coordinator: &dyn Connection,
        ctx: &mut RunContext,
    ) -> Result<()> {
        let (id, check) = self.registry.lookup(name)?;
        self.run_check(id, check, coordinator, ctx);
        Ok(())
    }

    /// Run every registered check in order, minus `skip`.
    pub fn run_all_checks(&self, coordinator: &dyn Connection, skip: &[CheckId], ctx: &mut RunContext) {
        for (id, check) in self.registry.all_checks() {
            if skip.contains(&id) {
                info!(check = %id, "check skipped");
                continue;
            }
            self.run_check(id, check, coordinator, ctx);
        }
    }

    /// Run the named checks in the given order. All names are resolved
    /// before anything runs.
    pub fn run_selected<S: AsRef<str>>(
        &self,
        names: &[S],
        coordinator: &dyn Connection,
        ctx: &mut RunContext,
    ) -> Result<()> {
        let resolved = names
            .iter()
            .map(|name| self.registry.lookup(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        for (id, check) in resolved {
            self.run_check(id, check, coordinator, ctx);
        }
        Ok(())
    }

    fn run_check(&self, id: CheckId, check: &dyn Check, coordinator: &dyn Connection, ctx: &mut RunContext) {
        info!(check = %id, batch_size = self.batch_size, "running check");
        let env = CheckEnv {
            coordinator,
            segments: &self.segments,
            connector: Arc::clone(&self.connector),
            launcher: self.launcher.as_ref(),
            batch_size: self.batch_size,
        };

        let mut run = CheckRun::new(id);
        match check.run_check(&env) {
            Err(err) => {
                error!(check = %id, error = %err, "check failed");
                self.sink
                    .log(Level::ERROR, &format!("[ERROR] check '{id}' failed: {err}"));
                ctx.raise(
                    RaisedError::new(ErrorKind::NoRepair, id.as_str())
                        .with_check(id)
                        .with_detail(err.to_string()),
                );
                run.error = Some(err.to_string());
            }
            Ok(findings) => {
                for failure in &findings.segment_failures {
                    ctx.raise(
                        RaisedError::new(ErrorKind::SegmentFailure, format!("dbid {}", failure.dbid))
                            .with_check(id)
                            .with_detail(failure.message.clone()),
                    );
                }

                if !findings.violations.is_empty() {
                    ctx.fail();
                    let issues: Vec<ExtraOrMissingIssue> = findings
                        .violations
                        .iter()
                        .filter_map(|v| v.as_extra_or_missing())
                        .cloned()
                        .collect();
                    if issues.len() < findings.violations.len() {
                        ctx.raise(RaisedError::new(ErrorKind::NoRepair, id.as_str()).with_check(id));
                    }
                    if !issues.is_empty() {
                        RepairClassifier::new(self.repair.as_deref(), self.sink.as_ref())
                            .classify(&issues, Some(id), ctx);
                    }
                }

                info!(
                    check = %id,
                    violations = findings.violations.len(),
                    segment_failures = findings.segment_failures.len(),
                    "check finished"
                );
                run.violations = findings.violations;
                run.segment_failures = findings.segment_failures;
            }
        }
        ctx.record_run(run);
    }
}
