use std::collections::{BTreeMap, BTreeSet};

use catcheck_error::Result;
use catcheck_types::{ExtraOrMissingIssue, IssueKind, Violation};
use tracing::{debug, warn};

use super::{quote_ident, quote_literal};
use crate::connection::ResultSet;
use crate::registry::{Check, CheckEnv, CheckFindings};

const DEFAULT_TABLES: [(&str, &str); 4] = [
    ("pg_namespace", "oid"),
    ("pg_class", "oid"),
    ("pg_type", "oid"),
    ("pg_proc", "oid"),
];

/// Compares keyed catalog rows on every primary against the coordinator.
///
/// A key present on a segment but not on the coordinator is *extra*; a key
/// present on the coordinator but not on a segment is *missing*. Segments
/// that fail to answer are reported as segment failures and skipped.
#[derive(Debug, Clone)]
pub struct MissingExtraCheck {
    tables: Vec<(String, String)>,
}

impl Default for MissingExtraCheck {
    fn default() -> Self {
        Self::with_tables(DEFAULT_TABLES)
    }
}

/// table -> set of keys
type KeySets = BTreeMap<String, BTreeSet<String>>;

impl MissingExtraCheck {
    pub fn with_tables<T, A>(tables: impl IntoIterator<Item = (T, A)>) -> Self
    where
        T: Into<String>,
        A: Into<String>,
    {
        Self {
            tables: tables
                .into_iter()
                .map(|(table, attr)| (table.into(), attr.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn tables(&self) -> &[(String, String)] {
        &self.tables
    }

    fn key_query(&self) -> String {
        self.tables
            .iter()
            .map(|(table, attr)| {
                format!(
                    "SELECT {} AS tbl, CAST({} AS TEXT) AS key FROM {}",
                    quote_literal(table),
                    quote_ident(attr),
                    quote_ident(table)
                )
            })
            .collect::<Vec<_>>()
            .join(" UNION ALL ")
    }
}

fn key_sets(rows: &ResultSet) -> KeySets {
    let mut sets = KeySets::new();
    for row in rows.get_result() {
        let (Some(table), Some(key)) = (
            row.first().and_then(|v| v.to_text()),
            row.get(1).and_then(|v| v.to_text()),
        ) else {
            continue;
        };
        sets.entry(table).or_default().insert(key);
    }
    sets
}

impl Check for MissingExtraCheck {
    fn run_check(&self, env: &CheckEnv<'_>) -> Result<CheckFindings> {
        if self.tables.is_empty() {
            return Ok(CheckFindings::default());
        }

        let outcome = env.fan_out(&self.key_query());
        let segment_failures: Vec<_> = outcome.failures().cloned().collect();

        let Some(reference) = outcome
            .successes()
            .find(|(segment, _)| segment.is_coordinator())
            .map(|(_, rows)| key_sets(rows))
        else {
            warn!("coordinator catalog unavailable; skipping comparison");
            return Ok(CheckFindings {
                violations: Vec::new(),
                segment_failures,
            });
        };

        let mut issues: BTreeMap<(usize, IssueKind), ExtraOrMissingIssue> = BTreeMap::new();
        let empty = BTreeSet::new();

        for (segment, rows) in outcome.successes() {
            if segment.is_coordinator() {
                continue;
            }
            let observed = key_sets(rows);
            for (position, (table, attr)) in self.tables.iter().enumerate() {
                let expected = reference.get(table).unwrap_or(&empty);
                let actual = observed.get(table).unwrap_or(&empty);

                for key in actual.difference(expected) {
                    issues
                        .entry((position, IssueKind::Extra))
                        .or_insert_with(|| ExtraOrMissingIssue::new(table, attr, IssueKind::Extra))
                        .add_entry(key.clone(), segment.content);
                }
                for key in expected.difference(actual) {
                    issues
                        .entry((position, IssueKind::Missing))
                        .or_insert_with(|| ExtraOrMissingIssue::new(table, attr, IssueKind::Missing))
                        .add_entry(key.clone(), segment.content);
                }
            }
        }

        debug!(
            issues = issues.len(),
            failed_segments = segment_failures.len(),
            "missing/extra comparison complete"
        );
        Ok(CheckFindings {
            violations: issues.into_values().map(Violation::from).collect(),
            segment_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Value;

    fn rows(pairs: &[(&str, &str)]) -> ResultSet {
        ResultSet::new(
            vec!["tbl".to_owned(), "key".to_owned()],
            pairs
                .iter()
                .map(|(t, k)| vec![Value::Text((*t).to_owned()), Value::Text((*k).to_owned())])
                .collect(),
        )
    }

    #[test]
    fn key_query_unions_every_table() {
        let check = MissingExtraCheck::with_tables([("pg_class", "oid"), ("pg_type", "oid")]);
        assert_eq!(
            check.key_query(),
            "SELECT 'pg_class' AS tbl, CAST(\"oid\" AS TEXT) AS key FROM \"pg_class\" \
             UNION ALL SELECT 'pg_type' AS tbl, CAST(\"oid\" AS TEXT) AS key FROM \"pg_type\""
        );
    }

    #[test]
    fn key_sets_group_by_table() {
        let sets = key_sets(&rows(&[("pg_class", "1"), ("pg_class", "2"), ("pg_type", "9")]));
        assert_eq!(sets["pg_class"].len(), 2);
        assert!(sets["pg_type"].contains("9"));
    }

    #[test]
    fn default_tables_are_core_catalogs() {
        let check = MissingExtraCheck::default();
        assert_eq!(check.tables().len(), 4);
        assert_eq!(check.tables()[1], ("pg_class".to_owned(), "oid".to_owned()));
    }
}
