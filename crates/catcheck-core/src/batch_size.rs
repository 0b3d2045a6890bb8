//! Concurrency limit resolution for segment-fanned checks.
//!
//! Priority: explicit override, else a memory-derived default. Either way
//! the result is clamped to the number of primaries, and never drops
//! below one.

use catcheck_types::SegmentRegistry;
use serde::{Deserialize, Serialize};
use tracing::{Level, debug, info, warn};

use crate::connection::Connection;
use crate::sink::ReportSink;

pub const DEFAULT_MEMORY_PROBE_SQL: &str =
    "SELECT setting FROM pg_settings WHERE name = 'gp_vmem_protect_limit'";

/// Tunables for the memory-derived default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchPolicy {
    /// Memory budgeted per concurrent segment worker.
    pub memory_per_worker_mb: u64,
    /// Upper bound for the derived default (overrides are not capped).
    pub max_default: usize,
    /// Query whose first cell is the available memory in MB.
    pub memory_probe_sql: String,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            memory_per_worker_mb: 512,
            max_default: 64,
            memory_probe_sql: DEFAULT_MEMORY_PROBE_SQL.to_owned(),
        }
    }
}

impl BatchPolicy {
    /// `clamp(memory_mb / memory_per_worker_mb, 1, max_default)`.
    #[must_use]
    pub fn default_for_memory(&self, memory_mb: u64) -> usize {
        let per_worker = self.memory_per_worker_mb.max(1);
        let workers = usize::try_from(memory_mb / per_worker).unwrap_or(usize::MAX);
        workers.clamp(1, self.max_default.max(1))
    }

    /// Available memory in MB according to the coordinator, if it can be
    /// read and is positive.
    pub fn probe_available_memory_mb(&self, coordinator: &dyn Connection) -> Option<u64> {
        match coordinator.query(&self.memory_probe_sql) {
            Ok(rows) => rows
                .scalar()
                .and_then(|value| value.as_i64())
                .and_then(|mb| u64::try_from(mb).ok())
                .filter(|mb| *mb > 0),
            Err(err) => {
                warn!(error = %err, "memory probe failed");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSource {
    Override,
    MemoryProbe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedBatch {
    /// Effective batch size.
    pub size: usize,
    /// Value before clamping.
    pub requested: usize,
    pub source: BatchSource,
    pub truncated: bool,
}

pub fn resolve_batch_size(
    requested: Option<usize>,
    coordinator: &dyn Connection,
    segments: &SegmentRegistry,
    policy: &BatchPolicy,
    sink: &dyn ReportSink,
) -> ResolvedBatch {
    let (candidate, source) = match requested {
        Some(size) => (size.max(1), BatchSource::Override),
        None => {
            let size = policy
                .probe_available_memory_mb(coordinator)
                .map_or(1, |mb| policy.default_for_memory(mb));
            debug!(size, "derived batch size from memory probe");
            (size, BatchSource::MemoryProbe)
        }
    };

    let primaries = segments.primary_count().max(1);
    let truncated = candidate > primaries;
    let size = if truncated {
        sink.log(
            Level::INFO,
            &format!("Truncated batch size to number of primaries: {primaries}"),
        );
        primaries
    } else {
        candidate
    };

    info!(batch_size = size, requested = candidate, ?source, "resolved batch size");
    ResolvedBatch {
        size,
        requested: candidate,
        source,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use catcheck_types::Segment;
    use proptest::prelude::*;

    use super::*;
    use crate::sink::MemorySink;
    use crate::snapshot::SnapshotConnection;

    fn registry(primaries: i32) -> SegmentRegistry {
        let segments = (0..primaries)
            .map(|i| Segment {
                dbid: i + 1,
                content: i - 1,
                hostname: "h".to_owned(),
                address: "h".to_owned(),
                port: 6000,
                datadir: "/d".to_owned(),
                is_primary: true,
            })
            .collect();
        SegmentRegistry::new(segments).expect("registry")
    }

    fn coordinator(setting: Option<&str>) -> SnapshotConnection {
        let conn = SnapshotConnection::open_in_memory().expect("open");
        conn.execute_batch("CREATE TABLE pg_settings (name TEXT, setting TEXT);")
            .expect("fixture");
        if let Some(value) = setting {
            conn.execute_batch(&format!(
                "INSERT INTO pg_settings VALUES ('gp_vmem_protect_limit', '{value}');"
            ))
            .expect("insert");
        }
        conn
    }

    #[test]
    fn override_above_primaries_is_truncated_once() {
        let sink = MemorySink::new();
        let resolved = resolve_batch_size(
            Some(300),
            &coordinator(None),
            &registry(50),
            &BatchPolicy::default(),
            &sink,
        );
        assert_eq!(resolved.size, 50);
        assert!(resolved.truncated);
        assert_eq!(resolved.source, BatchSource::Override);
        assert_eq!(
            sink.count_of("Truncated batch size to number of primaries: 50"),
            1,
            "case=truncation_logged_once"
        );
    }

    #[test]
    fn override_within_primaries_is_kept_silently() {
        let sink = MemorySink::new();
        let resolved = resolve_batch_size(
            Some(8),
            &coordinator(None),
            &registry(50),
            &BatchPolicy::default(),
            &sink,
        );
        assert_eq!(resolved.size, 8);
        assert!(!resolved.truncated);
        assert!(sink.messages().is_empty(), "case=no_truncation_line");
    }

    #[test]
    fn memory_probe_drives_default() {
        let sink = MemorySink::new();
        let resolved = resolve_batch_size(
            None,
            &coordinator(Some("8192")),
            &registry(50),
            &BatchPolicy::default(),
            &sink,
        );
        assert_eq!(resolved.size, 16, "case=8192mb_over_512mb");
        assert_eq!(resolved.source, BatchSource::MemoryProbe);
    }

    #[test]
    fn unreadable_memory_setting_falls_back_to_one() {
        let sink = MemorySink::new();
        for setting in [None, Some("0"), Some("lots")] {
            let resolved = resolve_batch_size(
                None,
                &coordinator(setting),
                &registry(4),
                &BatchPolicy::default(),
                &sink,
            );
            assert_eq!(resolved.size, 1, "case=memory_fallback setting={setting:?}");
        }
    }

    #[test]
    fn default_for_memory_is_clamped() {
        let policy = BatchPolicy::default();
        assert_eq!(policy.default_for_memory(100), 1);
        assert_eq!(policy.default_for_memory(2048), 4);
        assert_eq!(policy.default_for_memory(1 << 30), 64, "case=max_default_cap");
    }

    #[test]
    fn override_zero_is_treated_as_one() {
        let sink = MemorySink::new();
        let resolved = resolve_batch_size(
            Some(0),
            &coordinator(None),
            &registry(3),
            &BatchPolicy::default(),
            &sink,
        );
        assert_eq!(resolved.size, 1);
    }

    proptest! {
        #[test]
        fn resolved_size_stays_within_primaries(
            primaries in 1_i32..40,
            requested in proptest::option::of(0_usize..200),
            memory_mb in 0_u64..100_000,
        ) {
            let sink = MemorySink::new();
            let policy = BatchPolicy::default();
            let resolved = resolve_batch_size(
                requested,
                &coordinator(Some(&memory_mb.to_string())),
                &registry(primaries),
                &policy,
                &sink,
            );

            let p = primaries as usize;
            let candidate = requested.map_or_else(|| policy.default_for_memory(memory_mb), |r| r.max(1));
            prop_assert!((1..=p).contains(&resolved.size), "case=bounds size={}", resolved.size);
            prop_assert_eq!(resolved.size, candidate.min(p));
            prop_assert_eq!(resolved.truncated, candidate > p);
            let truncation_lines = sink
                .messages()
                .iter()
                .filter(|m| m.starts_with("Truncated batch size"))
                .count();
            prop_assert_eq!(truncation_lines, usize::from(candidate > p), "case=one_line_iff_truncated");
            if candidate > p {
                prop_assert_eq!(
                    sink.count_of(&format!("Truncated batch size to number of primaries: {p}")),
                    1
                );
            }
        }
    }
}
