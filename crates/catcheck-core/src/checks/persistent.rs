use catcheck_error::Result;
use catcheck_types::{PersistentViolation, Violation};
use tracing::debug;

use crate::registry::{Check, CheckEnv, CheckFindings};

pub const PERSISTENT_ORPHAN_SQL: &str = "SELECT p.relfilenode_oid AS relfilenode, p.persistent_state AS state \
     FROM gp_persistent_relation_node p \
     LEFT JOIN pg_class c ON c.relfilenode = p.relfilenode_oid \
     WHERE p.persistent_state = 2 AND c.oid IS NULL \
     ORDER BY p.relfilenode_oid";

/// Created persistent-table entries with no `pg_class` relation, checked on
/// every primary.
#[derive(Debug, Clone)]
pub struct PersistentCheck {
    sql: String,
}

impl Default for PersistentCheck {
    fn default() -> Self {
        Self {
            sql: PERSISTENT_ORPHAN_SQL.to_owned(),
        }
    }
}

impl PersistentCheck {
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = sql.into();
        self
    }
}

impl Check for PersistentCheck {
    fn run_check(&self, env: &CheckEnv<'_>) -> Result<CheckFindings> {
        let outcome = env.fan_out(&self.sql);

        let mut violations = Vec::new();
        for (segment, rows) in outcome.successes() {
            for row in rows.dict_result() {
                let Some(relfilenode) = row.get("relfilenode").and_then(|v| v.as_i64()) else {
                    continue;
                };
                violations.push(Violation::from(PersistentViolation {
                    dbid: segment.dbid,
                    content: segment.content,
                    relfilenode,
                    state: row.get("state").and_then(|v| v.as_i64()).unwrap_or_default(),
                }));
            }
        }

        debug!(
            violations = violations.len(),
            waves = outcome.waves.len(),
            "persistent check complete"
        );
        Ok(CheckFindings {
            violations,
            segment_failures: outcome.failures().cloned().collect(),
        })
    }
}
