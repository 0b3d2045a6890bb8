//! Check registry and the environment a check runs in.

use std::sync::Arc;

use catcheck_error::{CatcheckError, Result};
use catcheck_types::{CheckId, SegmentFailure, SegmentRegistry, Violation};

use crate::checks::{MissingExtraCheck, PersistentCheck, UniqueIndexCheck};
use crate::connection::{Connection, Connector, ResultSet};
use crate::scheduler::{BatchOutcome, BatchScheduler};
use crate::task::{SegmentJob, TaskLauncher};

/// Collaborators available to a running check.
pub struct CheckEnv<'a> {
    pub coordinator: &'a dyn Connection,
    pub segments: &'a SegmentRegistry,
    pub connector: Arc<dyn Connector>,
    pub launcher: &'a dyn TaskLauncher,
    pub batch_size: usize,
}

impl CheckEnv<'_> {
    /// Run `sql` on every primary (coordinator included) through the batch
    /// scheduler. Each worker opens its own connection.
    pub fn fan_out(&self, sql: &str) -> BatchOutcome<ResultSet> {
        let tasks = self
            .segments
            .primaries()
            .map(|segment| {
                let connector = Arc::clone(&self.connector);
                let target = segment.clone();
                let sql = sql.to_owned();
                let job: SegmentJob<ResultSet> = Box::new(move || {
                    let conn = connector.connect(&target)?;
                    conn.query(&sql)
                });
                self.launcher.launch(segment.clone(), job)
            })
            .collect();
        BatchScheduler::new(self.batch_size).run(tasks)
    }
}

/// What a check hands back to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckFindings {
    pub violations: Vec<Violation>,
    pub segment_failures: Vec<SegmentFailure>,
}

impl CheckFindings {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.segment_failures.is_empty()
    }
}

impl From<Vec<Violation>> for CheckFindings {
    fn from(violations: Vec<Violation>) -> Self {
        Self {
            violations,
            segment_failures: Vec::new(),
        }
    }
}

/// A named catalog check. Implementations hold no state between runs.
///
/// An `Err` means the check could not run at all; findings, including
/// per-segment failures, come back inside [`CheckFindings`].
pub trait Check: Send + Sync {
    fn run_check(&self, env: &CheckEnv<'_>) -> Result<CheckFindings>;
}

/// Checks keyed by [`CheckId`], kept in `CheckId::ALL` order.
#[derive(Default)]
pub struct CheckRegistry {
    checks: Vec<(CheckId, Box<dyn Check>)>,
}

impl CheckRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The shipped checks.
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .register(CheckId::UniqueIndexViolation, UniqueIndexCheck::default())
            .register(CheckId::MissingExtra, MissingExtraCheck::default())
            .register(CheckId::Persistent, PersistentCheck::default())
    }

    /// Add `check` under `id`, replacing any earlier registration.
    #[must_use]
    pub fn register(mut self, id: CheckId, check: impl Check + 'static) -> Self {
        let check: Box<dyn Check> = Box::new(check);
        if let Some(slot) = self.checks.iter_mut().find(|(existing, _)| *existing == id) {
            slot.1 = check;
        } else {
            self.checks.push((id, check));
            self.checks.sort_by_key(|(id, _)| *id);
        }
        self
    }

    /// Resolve a check by its string name.
    pub fn lookup(&self, name: &str) -> Result<(CheckId, &dyn Check)> {
        let id: CheckId = name.parse()?;
        self.get(id)
            .map(|check| (id, check))
            .ok_or_else(|| CatcheckError::UnknownCheck {
                name: name.to_owned(),
            })
    }

    #[must_use]
    pub fn get(&self, id: CheckId) -> Option<&dyn Check> {
        self.checks
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, check)| check.as_ref())
    }

    /// Registered checks in fixed order.
    pub fn all_checks(&self) -> impl Iterator<Item = (CheckId, &dyn Check)> {
        self.checks.iter().map(|(id, check)| (*id, check.as_ref()))
    }

    pub fn ids(&self) -> impl Iterator<Item = CheckId> + '_ {
        self.checks.iter().map(|(id, _)| *id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
