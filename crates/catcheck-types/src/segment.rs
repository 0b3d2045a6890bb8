//! Cluster members and the immutable registry built from them.

use std::collections::BTreeSet;
use std::fmt;

use catcheck_error::{CatcheckError, Result};
use serde::{Deserialize, Serialize};

/// Content id reserved for the coordinator.
pub const COORDINATOR_CONTENT: i32 = -1;

/// One member of the cluster, as listed in `gp_segment_configuration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub dbid: i32,
    /// `-1` for the coordinator; primary/mirror pairs share a content id.
    pub content: i32,
    pub hostname: String,
    pub address: String,
    pub port: u16,
    pub datadir: String,
    pub is_primary: bool,
}

impl Segment {
    #[must_use]
    pub const fn is_coordinator(&self) -> bool {
        self.content == COORDINATOR_CONTENT
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = if self.is_primary { "p" } else { "m" };
        write!(
            f,
            "dbid={} content={} role={role} {}:{}",
            self.dbid, self.content, self.address, self.port
        )
    }
}

/// Ordered, validated set of cluster members.
///
/// Members are kept sorted by `dbid`. Construction rejects duplicate dbids
/// and a layout without a primary coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRegistry {
    segments: Vec<Segment>,
}

impl SegmentRegistry {
    pub fn new(mut segments: Vec<Segment>) -> Result<Self> {
        segments.sort_by_key(|s| s.dbid);

        let mut seen = BTreeSet::new();
        for segment in &segments {
            if !seen.insert(segment.dbid) {
                return Err(CatcheckError::config(format!(
                    "duplicate dbid {} in cluster configuration",
                    segment.dbid
                )));
            }
        }

        if !segments.iter().any(|s| s.is_coordinator() && s.is_primary) {
            return Err(CatcheckError::config(
                "cluster configuration has no primary coordinator (content -1)",
            ));
        }

        Ok(Self { segments })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn get(&self, dbid: i32) -> Option<&Segment> {
        self.segments
            .binary_search_by_key(&dbid, |s| s.dbid)
            .ok()
            .map(|idx| &self.segments[idx])
    }

    /// The acting coordinator. Always present after construction.
    #[must_use]
    pub fn coordinator(&self) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| s.is_coordinator() && s.is_primary)
    }

    /// Primary members in dbid order, the coordinator included.
    pub fn primaries(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.is_primary)
    }

    #[must_use]
    pub fn primary_count(&self) -> usize {
        self.primaries().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(dbid: i32, content: i32, is_primary: bool) -> Segment {
        Segment {
            dbid,
            content,
            hostname: format!("host{dbid}"),
            address: format!("10.0.0.{dbid}"),
            port: 6000,
            datadir: format!("/data/seg{content}"),
            is_primary,
        }
    }

    #[test]
    fn registry_sorts_by_dbid() {
        let registry = SegmentRegistry::new(vec![
            segment(3, 1, true),
            segment(1, -1, true),
            segment(2, 0, true),
        ])
        .expect("valid layout");

        let dbids: Vec<i32> = registry.iter().map(|s| s.dbid).collect();
        assert_eq!(dbids, vec![1, 2, 3], "case=sorted_by_dbid");
        assert_eq!(registry.get(2).map(|s| s.content), Some(0));
        assert!(registry.get(9).is_none());
    }

    #[test]
    fn registry_rejects_duplicate_dbid() {
        let err = SegmentRegistry::new(vec![segment(1, -1, true), segment(1, 0, true)])
            .expect_err("duplicate dbid must fail");
        assert!(err.to_string().contains("duplicate dbid 1"));
    }

    #[test]
    fn registry_requires_primary_coordinator() {
        let err = SegmentRegistry::new(vec![segment(2, 0, true), segment(1, -1, false)])
            .expect_err("mirror-only coordinator must fail");
        assert!(err.to_string().contains("coordinator"));
    }

    #[test]
    fn primaries_include_coordinator_and_skip_mirrors() {
        let registry = SegmentRegistry::new(vec![
            segment(1, -1, true),
            segment(2, 0, true),
            segment(3, 1, true),
            segment(4, 0, false),
            segment(5, 1, false),
        ])
        .expect("valid layout");

        assert_eq!(registry.len(), 5);
        assert_eq!(registry.primary_count(), 3, "case=primary_count");
        assert_eq!(registry.coordinator().map(|s| s.dbid), Some(1));
        assert!(registry.primaries().all(|s| s.is_primary));
    }
}
