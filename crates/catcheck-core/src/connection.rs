//! Connection boundary: "run SQL, get rows".
//!
//! Checks only ever see [`Connection`] and [`Connector`]; the transport
//! behind them is swappable. [`crate::snapshot`] provides the SQLite-backed
//! implementation used by the command-line tool and the test suite.

use std::collections::BTreeMap;
use std::fmt;

use catcheck_error::Result;
use catcheck_types::Segment;
use serde::Serialize;

/// A single column value returned by a catalog query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer view; text holding an integer literal is parsed.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Real(_) | Self::Null => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text rendering of any non-null value.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(v) => Some(v.to_string()),
            Self::Real(v) => Some(v.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Rows returned by [`Connection::query`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Positional rows.
    #[must_use]
    pub fn get_result(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Rows keyed by column name.
    #[must_use]
    pub fn dict_result(&self) -> Vec<BTreeMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// First column of the first row, if any.
    #[must_use]
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Synchronous request/response connection to one cluster member.
pub trait Connection: Send {
    fn query(&self, sql: &str) -> Result<ResultSet>;

    /// Run a statement for its side effect, returning the affected row count.
    fn execute(&self, sql: &str) -> Result<usize> {
        self.query(sql).map(|rows| rows.len())
    }
}

/// Opens connections to individual segments for fanned-out work.
///
/// Connectors are shared with worker threads, hence `Send + Sync`.
pub trait Connector: Send + Sync {
    fn connect(&self, segment: &Segment) -> Result<Box<dyn Connection>>;
}
