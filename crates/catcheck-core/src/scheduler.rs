//! Wave-based batch scheduler.
//!
//! Tasks are consumed in order and partitioned into consecutive waves of at
//! most `batch_size`. Each wave starts every task, then joins them in start
//! order; the next wave begins only once the current one is fully joined.
//! A failed join, or a panicking start or join, is recorded against its
//! segment and never stops the rest of the wave.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use catcheck_types::{Segment, SegmentFailure};
use tracing::{debug, warn};

use crate::task::{SegmentTask, panic_message};

/// Start/join counts for one wave. Tasks whose start panicked count in
/// neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveReport {
    pub index: usize,
    pub started: usize,
    pub joined: usize,
}

/// Result slot for one segment.
#[derive(Debug)]
pub struct SegmentResult<T> {
    pub segment: Segment,
    pub outcome: Result<T, SegmentFailure>,
}

/// Everything a scheduler run produced, keyed by `dbid`.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub results: BTreeMap<i32, SegmentResult<T>>,
    pub waves: Vec<WaveReport>,
}

impl<T> BatchOutcome<T> {
    pub fn failures(&self) -> impl Iterator<Item = &SegmentFailure> {
        self.results
            .values()
            .filter_map(|slot| slot.outcome.as_ref().err())
    }

    pub fn successes(&self) -> impl Iterator<Item = (&Segment, &T)> {
        self.results
            .values()
            .filter_map(|slot| slot.outcome.as_ref().ok().map(|value| (&slot.segment, value)))
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchScheduler {
    batch_size: usize,
}

impl BatchScheduler {
    /// A zero batch size is treated as one.
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn run<T>(&self, tasks: Vec<Box<dyn SegmentTask<T>>>) -> BatchOutcome<T> {
        let total = tasks.len();
        let mut results = BTreeMap::new();
        let mut waves = Vec::with_capacity(total.div_ceil(self.batch_size));
        let mut pending = tasks.into_iter().peekable();

        while pending.peek().is_some() {
            let mut wave: Vec<Box<dyn SegmentTask<T>>> =
                pending.by_ref().take(self.batch_size).collect();
            let index = waves.len();

            // A task whose start panicked is never joined.
            let start_errors: Vec<Option<String>> = wave
                .iter_mut()
                .map(|task| {
                    panic::catch_unwind(AssertUnwindSafe(|| task.start()))
                        .err()
                        .map(|payload| format!("start panicked: {}", panic_message(payload.as_ref())))
                })
                .collect();
            let started = start_errors.iter().filter(|e| e.is_none()).count();

            let mut joined = 0;
            for (mut task, start_error) in wave.into_iter().zip(start_errors) {
                let segment = task.segment().clone();
                let outcome = if let Some(message) = start_error {
                    Err(message)
                } else {
                    joined += 1;
                    match panic::catch_unwind(AssertUnwindSafe(|| task.join())) {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(err)) => Err(err.to_string()),
                        Err(payload) => {
                            Err(format!("join panicked: {}", panic_message(payload.as_ref())))
                        }
                    }
                };

                let outcome = outcome.map_err(|message| {
                    warn!(dbid = segment.dbid, content = segment.content, error = %message, "segment task failed");
                    SegmentFailure {
                        dbid: segment.dbid,
                        content: segment.content,
                        message,
                    }
                });
                results.insert(segment.dbid, SegmentResult { segment, outcome });
            }

            debug!(wave = index, started, joined, "wave complete");
            waves.push(WaveReport {
                index,
                started,
                joined,
            });
        }

        debug!(
            tasks = total,
            waves = waves.len(),
            batch_size = self.batch_size,
            "batch run complete"
        );
        BatchOutcome { results, waves }
    }
}
