//! SQLite catalog snapshots.
//!
//! A snapshot directory holds one SQLite file per cluster member:
//! `coordinator.db` for content `-1` and `dbid_<n>.db` for everything else.
//! Each file carries exported catalog relations under their catalog names,
//! so the same SQL a check would send to a live member runs unchanged.

use std::path::{Path, PathBuf};

use catcheck_error::{CatcheckError, Result};
use catcheck_types::Segment;
use rusqlite::OpenFlags;
use rusqlite::types::ValueRef;
use tracing::debug;

use crate::connection::{Connection, Connector, ResultSet, Value};

/// File name of the coordinator's snapshot inside a snapshot directory.
pub const COORDINATOR_FILE: &str = "coordinator.db";

/// [`Connection`] over one SQLite snapshot file.
#[derive(Debug)]
pub struct SnapshotConnection {
    conn: rusqlite::Connection,
}

impl SnapshotConnection {
    /// Open an existing snapshot file. Missing files are an error, never
    /// silently created.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|err| {
            CatcheckError::config(format!("cannot open snapshot {}: {err}", path.display()))
        })?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|err| CatcheckError::config(format!("cannot open in-memory snapshot: {err}")))?;
        Ok(Self { conn })
    }

    #[must_use]
    pub const fn from_connection(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Run several `;`-separated statements, e.g. a fixture script.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|err| CatcheckError::query(sql, err))
    }
}

impl Connection for SnapshotConnection {
    fn query(&self, sql: &str) -> Result<ResultSet> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|err| CatcheckError::query(sql, err))?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([]).map_err(|err| CatcheckError::query(sql, err))?;
        while let Some(row) = cursor.next().map_err(|err| CatcheckError::query(sql, err))? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                let value = row
                    .get_ref(idx)
                    .map_err(|err| CatcheckError::query(sql, err))?;
                values.push(convert(value));
            }
            rows.push(values);
        }

        debug!(rows = rows.len(), "snapshot query");
        Ok(ResultSet::new(columns, rows))
    }

    fn execute(&self, sql: &str) -> Result<usize> {
        self.conn
            .execute(sql, [])
            .map_err(|err| CatcheckError::query(sql, err))
    }
}

fn convert(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// [`Connector`] resolving segments to files in a snapshot directory.
#[derive(Debug, Clone)]
pub struct SnapshotConnector {
    root: PathBuf,
}

impl SnapshotConnector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot file backing `segment`.
    #[must_use]
    pub fn path_for(&self, segment: &Segment) -> PathBuf {
        if segment.is_coordinator() {
            self.root.join(COORDINATOR_FILE)
        } else {
            self.root.join(format!("dbid_{}.db", segment.dbid))
        }
    }

    /// The coordinator connection, opened before the segment layout is known.
    pub fn connect_coordinator(&self) -> Result<SnapshotConnection> {
        SnapshotConnection::open(&self.root.join(COORDINATOR_FILE))
    }
}

impl Connector for SnapshotConnector {
    fn connect(&self, segment: &Segment) -> Result<Box<dyn Connection>> {
        let path = self.path_for(segment);
        let conn = SnapshotConnection::open(&path).map_err(|err| CatcheckError::Connect {
            dbid: segment.dbid,
            message: err.to_string(),
        })?;
        Ok(Box::new(conn))
    }
}
