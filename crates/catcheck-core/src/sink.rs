//! Reporting sinks.
//!
//! Everything a run wants a human to see goes through [`ReportSink`]:
//! summary lines, truncation notices and repair artifact paths.
//! [`TracingSink`] is what the binary installs; [`MemorySink`] captures the
//! same stream for assertions.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::Level;

pub trait ReportSink: Send + Sync {
    fn log(&self, level: Level, message: &str);

    /// Surface a generated repair artifact.
    fn print_repair_issues(&self, path: &Path);
}

/// Re-emits report lines as `tracing` events under the `catcheck::report`
/// target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!(target: "catcheck::report", "{message}");
        } else if level == Level::WARN {
            tracing::warn!(target: "catcheck::report", "{message}");
        } else if level == Level::INFO {
            tracing::info!(target: "catcheck::report", "{message}");
        } else if level == Level::DEBUG {
            tracing::debug!(target: "catcheck::report", "{message}");
        } else {
            tracing::trace!(target: "catcheck::report", "{message}");
        }
    }

    fn print_repair_issues(&self, path: &Path) {
        tracing::info!(
            target: "catcheck::report",
            path = %path.display(),
            "repair script generated"
        );
    }
}

#[derive(Debug, Default)]
struct Captured {
    entries: Vec<(Level, String)>,
    repair_paths: Vec<PathBuf>,
}

/// In-memory sink for tests and for callers that post-process the report.
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Mutex<Captured>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logged messages in arrival order, without levels.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.inner.lock().entries.clone()
    }

    #[must_use]
    pub fn repair_paths(&self) -> Vec<PathBuf> {
        self.inner.lock().repair_paths.clone()
    }

    /// How many logged messages equal `message` exactly.
    #[must_use]
    pub fn count_of(&self, message: &str) -> usize {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|(_, m)| m == message)
            .count()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.repair_paths.clear();
    }
}

impl ReportSink for MemorySink {
    fn log(&self, level: Level, message: &str) {
        self.inner.lock().entries.push((level, message.to_owned()));
    }

    fn print_repair_issues(&self, path: &Path) {
        self.inner.lock().repair_paths.push(path.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_captures_in_order() {
        let sink = MemorySink::new();
        sink.log(Level::INFO, "first");
        sink.log(Level::ERROR, "second");
        sink.log(Level::INFO, "first");
        sink.print_repair_issues(Path::new("/tmp/repair/a.sql"));

        assert_eq!(sink.messages(), vec!["first", "second", "first"]);
        assert_eq!(sink.count_of("first"), 2, "case=duplicate_count");
        assert_eq!(sink.entries()[1].0, Level::ERROR);
        assert_eq!(sink.repair_paths(), vec![PathBuf::from("/tmp/repair/a.sql")]);

        sink.clear();
        assert!(sink.messages().is_empty() && sink.repair_paths().is_empty());
    }

    #[test]
    fn tracing_sink_accepts_every_level() {
        let sink = TracingSink;
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            sink.log(level, "line");
        }
        sink.print_repair_issues(Path::new("x.sql"));
    }
}
