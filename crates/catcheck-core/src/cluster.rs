//! Segment registry loading from the coordinator's cluster configuration.

use std::collections::BTreeMap;

use catcheck_error::{CatcheckError, Result};
use catcheck_types::{Segment, SegmentRegistry};
use tracing::{debug, info};

use crate::connection::{Connection, Value};

pub const SEGMENT_CONFIGURATION_QUERY: &str = "SELECT dbid, content, role, port, hostname, address, datadir \
     FROM gp_segment_configuration ORDER BY dbid";

/// Read `gp_segment_configuration` through `conn` and build the registry.
pub fn load_segment_registry(conn: &dyn Connection) -> Result<SegmentRegistry> {
    let rows = conn.query(SEGMENT_CONFIGURATION_QUERY)?;
    let mut segments = Vec::with_capacity(rows.len());
    for row in rows.dict_result() {
        let segment = segment_from_row(&row)?;
        debug!(segment = %segment, "cluster member");
        segments.push(segment);
    }
    let registry = SegmentRegistry::new(segments)?;
    info!(
        members = registry.len(),
        primaries = registry.primary_count(),
        "loaded cluster configuration"
    );
    Ok(registry)
}

fn segment_from_row(row: &BTreeMap<String, Value>) -> Result<Segment> {
    let dbid = int_column(row, "dbid")?;
    let port = int_column(row, "port")?;
    Ok(Segment {
        dbid,
        content: int_column(row, "content")?,
        hostname: text_column(row, "hostname"),
        address: text_column(row, "address"),
        port: u16::try_from(port)
            .map_err(|_| CatcheckError::config(format!("dbid {dbid}: port {port} out of range")))?,
        datadir: text_column(row, "datadir"),
        is_primary: row.get("role").and_then(Value::as_str) == Some("p"),
    })
}

fn int_column(row: &BTreeMap<String, Value>, column: &str) -> Result<i32> {
    row.get(column)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| {
            CatcheckError::config(format!(
                "gp_segment_configuration: missing or invalid {column}"
            ))
        })
}

fn text_column(row: &BTreeMap<String, Value>, column: &str) -> String {
    row.get(column).and_then(Value::to_text).unwrap_or_default()
}
