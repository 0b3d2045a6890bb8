//! Leaked temporary schema cleanup.
//!
//! A `pg_temp_<sess>` namespace whose session is gone is leftover state, not
//! an inconsistency: dropping it is logged but never fails the run.
//!
//! Discovery runs on the coordinator, which owns session state. On a live
//! cluster `DROP SCHEMA` on the coordinator reaches every segment. Catalog
//! snapshots are independent files, so the snapshot dropper repeats the
//! delete on every other primary, or `missing_extra` would later see the
//! segment copies as extra `pg_namespace` rows.

use std::sync::Arc;

use catcheck_error::Result;
use catcheck_types::{ErrorKind, RaisedError, SegmentRegistry};
use tracing::{Level, debug, error, warn};

use crate::checks::{quote_ident, quote_literal};
use crate::connection::{Connection, Connector};
use crate::context::RunContext;
use crate::sink::ReportSink;

/// Names of the form `pg_temp_<digits>` with no live `pg_stat_activity` row.
pub const LEAKED_SCHEMA_QUERY: &str = "SELECT n.nspname FROM pg_namespace n \
     WHERE substr(n.nspname, 1, 8) = 'pg_temp_' \
     AND length(n.nspname) > 8 \
     AND substr(n.nspname, 9) NOT GLOB '*[^0-9]*' \
     AND NOT EXISTS (SELECT 1 FROM pg_stat_activity a \
         WHERE a.sess_id = CAST(substr(n.nspname, 9) AS INTEGER)) \
     ORDER BY n.nspname";

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropReport {
    pub dropped: Vec<String>,
    /// `(schema, error)` for schemas that were not removed everywhere.
    pub failed: Vec<(String, String)>,
}

pub trait LeakedSchemaDropper {
    /// Find and drop leaked schemas. `Err` means discovery itself failed;
    /// per-schema drop errors land in [`DropReport::failed`].
    fn drop_leaked_schemas(&self, conn: &dyn Connection) -> Result<DropReport>;
}

/// How a leaked schema is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropStyle {
    /// `DROP SCHEMA ... CASCADE` on a live cluster.
    #[default]
    DropSchema,
    /// Delete the `pg_namespace` row; used on catalog snapshots.
    DeleteNamespaceRow,
}

impl DropStyle {
    #[must_use]
    pub fn statement(self, schema: &str) -> String {
        match self {
            Self::DropSchema => format!("DROP SCHEMA IF EXISTS {} CASCADE", quote_ident(schema)),
            Self::DeleteNamespaceRow => format!(
                "DELETE FROM pg_namespace WHERE nspname = {}",
                quote_literal(schema)
            ),
        }
    }
}

type MemberConnection = (i32, std::result::Result<Box<dyn Connection>, String>);

#[derive(Clone, Default)]
pub struct TempSchemaDropper {
    style: DropStyle,
    members: Option<(Arc<dyn Connector>, SegmentRegistry)>,
}

impl TempSchemaDropper {
    #[must_use]
    pub const fn new(style: DropStyle) -> Self {
        Self {
            style,
            members: None,
        }
    }

    /// Repeat every drop on the non-coordinator primaries of `segments`.
    #[must_use]
    pub fn with_segments(mut self, connector: Arc<dyn Connector>, segments: SegmentRegistry) -> Self {
        self.members = Some((connector, segments));
        self
    }

    fn member_connections(&self) -> Vec<MemberConnection> {
        let Some((connector, segments)) = &self.members else {
            return Vec::new();
        };
        segments
            .primaries()
            .filter(|segment| !segment.is_coordinator())
            .map(|segment| {
                let conn = connector.connect(segment).map_err(|err| err.to_string());
                (segment.dbid, conn)
            })
            .collect()
    }

    fn drop_everywhere(
        coordinator: &dyn Connection,
        members: &[MemberConnection],
        statement: &str,
    ) -> std::result::Result<(), String> {
        coordinator
            .execute(statement)
            .map_err(|err| format!("coordinator: {err}"))?;

        let errors: Vec<String> = members
            .iter()
            .filter_map(|(dbid, member)| {
                let outcome = match member {
                    Ok(conn) => conn.execute(statement).map(|_| ()).map_err(|err| err.to_string()),
                    Err(message) => Err(message.clone()),
                };
                outcome.err().map(|message| format!("dbid {dbid}: {message}"))
            })
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

impl LeakedSchemaDropper for TempSchemaDropper {
    fn drop_leaked_schemas(&self, conn: &dyn Connection) -> Result<DropReport> {
        let leaked: Vec<String> = conn
            .query(LEAKED_SCHEMA_QUERY)?
            .get_result()
            .iter()
            .filter_map(|row| row.first().and_then(|v| v.to_text()))
            .collect();

        let mut report = DropReport::default();
        if leaked.is_empty() {
            return Ok(report);
        }
        let members = self.member_connections();
        for schema in leaked {
            match Self::drop_everywhere(conn, &members, &self.style.statement(&schema)) {
                Ok(()) => {
                    debug!(schema = %schema, members = members.len(), "dropped leaked schema");
                    report.dropped.push(schema);
                }
                Err(message) => {
                    warn!(schema = %schema, error = %message, "leaked schema drop failed");
                    report.failed.push((schema, message));
                }
            }
        }
        Ok(report)
    }
}

/// Run `dropper` and report what it removed. Dropper failures are recorded
/// as NOREPAIR; found schemas raise nothing.
pub fn drop_leaked_schemas(
    dropper: &dyn LeakedSchemaDropper,
    conn: &dyn Connection,
    ctx: &mut RunContext,
    sink: &dyn ReportSink,
) -> Vec<String> {
    match dropper.drop_leaked_schemas(conn) {
        Ok(report) => {
            if !report.dropped.is_empty() {
                sink.log(
                    Level::INFO,
                    &format!(
                        "Found and dropped {} unbound temporary schemas",
                        report.dropped.len()
                    ),
                );
            }
            for (schema, message) in &report.failed {
                error!(schema = %schema, error = %message, "leaked schema cleanup failed");
                sink.log(
                    Level::ERROR,
                    &format!("[ERROR] dropping leaked schema {schema}: {message}"),
                );
                ctx.raise(
                    RaisedError::new(ErrorKind::NoRepair, "leaked_schemas")
                        .with_detail(format!("{schema}: {message}")),
                );
            }
            report.dropped
        }
        Err(err) => {
            error!(error = %err, "leaked schema cleanup failed");
            sink.log(Level::ERROR, &format!("[ERROR] dropping leaked schemas: {err}"));
            ctx.raise(
                RaisedError::new(ErrorKind::NoRepair, "leaked_schemas").with_detail(err.to_string()),
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use catcheck_error::CatcheckError;
    use parking_lot::Mutex;

    use super::*;
    use crate::connection::{ResultSet, Value};
    use crate::sink::MemorySink;
    use crate::snapshot::SnapshotConnection;

    struct Canned(Vec<&'static str>);

    impl LeakedSchemaDropper for Canned {
        fn drop_leaked_schemas(&self, _conn: &dyn Connection) -> Result<DropReport> {
            Ok(DropReport {
                dropped: self.0.iter().map(|s| (*s).to_owned()).collect(),
                failed: Vec::new(),
            })
        }
    }

    struct Failing;

    impl LeakedSchemaDropper for Failing {
        fn drop_leaked_schemas(&self, _conn: &dyn Connection) -> Result<DropReport> {
            Err(CatcheckError::query("SELECT nspname", "permission denied"))
        }
    }

    /// Lists fixed schema names; the execute calls numbered in `fail_on`
    /// (zero-based) error out.
    struct Flaky {
        schemas: Vec<&'static str>,
        fail_on: Vec<usize>,
        executed: Mutex<Vec<String>>,
    }

    impl Connection for Flaky {
        fn query(&self, _sql: &str) -> Result<ResultSet> {
            let rows = self
                .schemas
                .iter()
                .map(|s| vec![Value::Text((*s).to_owned())])
                .collect();
            Ok(ResultSet::new(vec!["nspname".to_owned()], rows))
        }

        fn execute(&self, sql: &str) -> Result<usize> {
            let mut executed = self.executed.lock();
            let call = executed.len();
            executed.push(sql.to_owned());
            if self.fail_on.contains(&call) {
                Err(CatcheckError::query("DROP", "lock timeout"))
            } else {
                Ok(1)
            }
        }
    }

    fn catalog() -> SnapshotConnection {
        let conn = SnapshotConnection::open_in_memory().expect("open");
        conn.execute_batch(
            "CREATE TABLE pg_namespace (oid INTEGER, nspname TEXT);
             CREATE TABLE pg_stat_activity (sess_id INTEGER);
             INSERT INTO pg_namespace VALUES
                (11, 'pg_catalog'), (2200, 'public'),
                (16400, 'pg_temp_7'), (16401, 'pg_temp_12');
             INSERT INTO pg_stat_activity VALUES (7);",
        )
        .expect("fixture");
        conn
    }

    fn namespaces(conn: &dyn Connection) -> Vec<String> {
        conn.query("SELECT nspname FROM pg_namespace ORDER BY oid")
            .expect("query")
            .get_result()
            .iter()
            .filter_map(|row| row[0].to_text())
            .collect()
    }

    #[test]
    fn no_leaked_schemas_is_silent() {
        let sink = MemorySink::new();
        let mut ctx = RunContext::default();
        let dropped = drop_leaked_schemas(&Canned(vec![]), &catalog(), &mut ctx, &sink);
        assert!(dropped.is_empty());
        assert!(sink.messages().is_empty(), "case=no_drop_line");
        assert!(ctx.check_status() && ctx.errors().is_empty());
    }

    #[test]
    fn leaked_schemas_are_logged_without_failing() {
        let sink = MemorySink::new();
        let mut ctx = RunContext::default();
        let dropped = drop_leaked_schemas(
            &Canned(vec!["schema1", "schema2"]),
            &catalog(),
            &mut ctx,
            &sink,
        );
        assert_eq!(dropped.len(), 2);
        assert_eq!(
            sink.messages(),
            vec!["Found and dropped 2 unbound temporary schemas"]
        );
        assert!(ctx.check_status(), "case=verdict_unaffected");
        assert!(ctx.errors().is_empty(), "case=no_error_kind");
    }

    #[test]
    fn dropper_failure_is_norepair() {
        let sink = MemorySink::new();
        let mut ctx = RunContext::default();
        let dropped = drop_leaked_schemas(&Failing, &catalog(), &mut ctx, &sink);
        assert!(dropped.is_empty());
        assert!(ctx.has_raised(ErrorKind::NoRepair), "case=dropper_error");
    }

    #[test]
    fn partial_drop_keeps_removed_schemas_and_raises_for_the_rest() {
        let conn = Flaky {
            schemas: vec!["pg_temp_1", "pg_temp_2", "pg_temp_3"],
            fail_on: vec![1],
            executed: Mutex::new(Vec::new()),
        };
        let sink = MemorySink::new();
        let mut ctx = RunContext::default();
        let dropped = drop_leaked_schemas(
            &TempSchemaDropper::new(DropStyle::DropSchema),
            &conn,
            &mut ctx,
            &sink,
        );

        assert_eq!(conn.executed.lock().len(), 3, "case=loop_continues_after_error");
        assert_eq!(dropped, vec!["pg_temp_1".to_owned(), "pg_temp_3".to_owned()]);
        let messages = sink.messages();
        assert!(
            messages.iter().any(|m| m == "Found and dropped 2 unbound temporary schemas"),
            "case=partial_success_logged messages={messages:?}"
        );
        assert!(
            messages
                .iter()
                .any(|m| m.starts_with("[ERROR] dropping leaked schema pg_temp_2: ")),
            "case=failure_logged"
        );
        assert_eq!(ctx.errors_of(ErrorKind::NoRepair).count(), 1);
        assert!(
            ctx.errors()[0]
                .detail
                .as_deref()
                .is_some_and(|d| d.starts_with("pg_temp_2: ")),
            "case=failure_names_schema"
        );
    }

    #[test]
    fn temp_schema_dropper_removes_only_unbound_schemas() {
        let conn = catalog();
        let dropper = TempSchemaDropper::new(DropStyle::DeleteNamespaceRow);
        let report = dropper.drop_leaked_schemas(&conn).expect("drop");
        assert_eq!(report.dropped, vec!["pg_temp_12".to_owned()]);
        assert!(report.failed.is_empty());
        assert_eq!(namespaces(&conn), vec!["pg_catalog", "public", "pg_temp_7"]);
    }

    #[test]
    fn discovery_requires_numeric_session_suffix() {
        let conn = catalog();
        conn.execute_batch(
            "INSERT INTO pg_namespace VALUES
                (16402, 'pg_temp_x'), (16403, 'pg_tempX3'), (16404, 'pg_temp_');",
        )
        .expect("fixture");
        let report = TempSchemaDropper::new(DropStyle::DeleteNamespaceRow)
            .drop_leaked_schemas(&conn)
            .expect("drop");
        assert_eq!(report.dropped, vec!["pg_temp_12".to_owned()], "case=non_numeric_ignored");
    }

    #[test]
    fn null_session_ids_do_not_hide_leaked_schemas() {
        let conn = catalog();
        conn.execute_batch("INSERT INTO pg_stat_activity VALUES (NULL);")
            .expect("fixture");
        let report = TempSchemaDropper::new(DropStyle::DeleteNamespaceRow)
            .drop_leaked_schemas(&conn)
            .expect("drop");
        assert_eq!(report.dropped, vec!["pg_temp_12".to_owned()], "case=null_sess_id");
    }

    #[test]
    fn drop_statements_quote_names() {
        assert_eq!(
            DropStyle::DropSchema.statement("pg_temp_3"),
            "DROP SCHEMA IF EXISTS \"pg_temp_3\" CASCADE"
        );
        assert_eq!(
            DropStyle::DeleteNamespaceRow.statement("pg_temp_3"),
            "DELETE FROM pg_namespace WHERE nspname = 'pg_temp_3'"
        );
    }
}
