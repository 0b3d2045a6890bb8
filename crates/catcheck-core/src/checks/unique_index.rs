use std::collections::BTreeSet;

use catcheck_error::{CatcheckError, Result};
use catcheck_types::{UniqueIndexViolation, Violation};
use tracing::debug;

use super::quote_ident;
use crate::connection::Connection;
use crate::registry::{Check, CheckEnv, CheckFindings};

pub const UNIQUE_INDEX_DISCOVERY_SQL: &str = "SELECT table_oid, table_name, index_name, column_names \
     FROM catcheck_unique_index ORDER BY table_name, index_name";

/// Finds unique catalog indexes holding duplicate keys on any member.
///
/// Runs entirely over the coordinator connection: indexed relations are
/// expected to expose a `gp_segment_id` column covering every member.
#[derive(Debug, Clone)]
pub struct UniqueIndexCheck {
    discovery_sql: String,
}

impl Default for UniqueIndexCheck {
    fn default() -> Self {
        Self {
            discovery_sql: UNIQUE_INDEX_DISCOVERY_SQL.to_owned(),
        }
    }
}

struct UniqueIndex {
    table_oid: i64,
    table_name: String,
    index_name: String,
    column_names: String,
}

impl UniqueIndexCheck {
    #[must_use]
    pub fn with_discovery_sql(mut self, sql: impl Into<String>) -> Self {
        self.discovery_sql = sql.into();
        self
    }

    fn discover(&self, conn: &dyn Connection) -> Result<Vec<UniqueIndex>> {
        conn.query(&self.discovery_sql)?
            .dict_result()
            .into_iter()
            .map(|row| {
                let text = |column: &str| {
                    row.get(column)
                        .and_then(|v| v.to_text())
                        .ok_or_else(|| CatcheckError::query(&self.discovery_sql, format!("missing {column}")))
                };
                Ok(UniqueIndex {
                    table_oid: row.get("table_oid").and_then(|v| v.as_i64()).unwrap_or_default(),
                    table_name: text("table_name")?,
                    index_name: text("index_name")?,
                    column_names: text("column_names")?,
                })
            })
            .collect()
    }
}

/// Content ids holding more than one row per non-null key.
fn duplicate_key_sql(table: &str, columns: &[&str]) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let not_null = columns
        .iter()
        .map(|c| format!("{} IS NOT NULL", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!(
        "SELECT DISTINCT gp_segment_id FROM (\
         SELECT gp_segment_id FROM {table} WHERE {not_null} \
         GROUP BY gp_segment_id, {cols} HAVING count(*) > 1) AS violations \
         ORDER BY gp_segment_id",
        table = quote_ident(table)
    )
}

impl Check for UniqueIndexCheck {
    fn run_check(&self, env: &CheckEnv<'_>) -> Result<CheckFindings> {
        let indexes = self.discover(env.coordinator)?;
        let mut violations = Vec::new();

        for index in indexes {
            let columns: Vec<&str> = index
                .column_names
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect();
            if columns.is_empty() {
                debug!(index = %index.index_name, "unique index without columns skipped");
                continue;
            }

            let rows = env
                .coordinator
                .query(&duplicate_key_sql(&index.table_name, &columns))?;
            let violated_segments: BTreeSet<i32> = rows
                .get_result()
                .iter()
                .filter_map(|row| row.first().and_then(|v| v.as_i64()))
                .filter_map(|id| i32::try_from(id).ok())
                .collect();

            if !violated_segments.is_empty() {
                debug!(
                    table = %index.table_name,
                    index = %index.index_name,
                    segments = ?violated_segments,
                    "unique index violated"
                );
                violations.push(Violation::from(UniqueIndexViolation {
                    table_oid: index.table_oid,
                    table_name: index.table_name,
                    index_name: index.index_name,
                    column_names: index.column_names,
                    violated_segments,
                }));
            }
        }

        Ok(violations.into())
    }
}
