//! Per-segment work units.
//!
//! A [`SegmentTask`] is an opaque handle with a non-blocking `start` and a
//! blocking `join`. The scheduler only ever talks to this trait, so the
//! thread-backed [`ThreadTask`] can be swapped for anything with the same
//! start/join shape.

use std::any::Any;
use std::mem;
use std::thread::{self, JoinHandle};

use catcheck_error::{CatcheckError, Result};
use catcheck_types::Segment;
use tracing::debug;

use crate::connection::ResultSet;

/// Boxed closure executed for one segment.
pub type SegmentJob<T> = Box<dyn FnOnce() -> Result<T> + Send + 'static>;

pub trait SegmentTask<T>: Send {
    fn segment(&self) -> &Segment;

    /// Begin execution. Must not block on the work itself.
    fn start(&mut self);

    /// Block until the work finishes and hand back its result.
    fn join(&mut self) -> Result<T>;
}

/// Produces tasks for segment-fanned checks.
pub trait TaskLauncher: Send + Sync {
    fn launch(&self, segment: Segment, job: SegmentJob<ResultSet>) -> Box<dyn SegmentTask<ResultSet>>;
}

enum TaskState<T> {
    Pending(SegmentJob<T>),
    Running(JoinHandle<Result<T>>),
    Failed(String),
    Finished,
}

/// Runs its job on a dedicated OS thread named `catcheck-seg-<dbid>`.
pub struct ThreadTask<T> {
    segment: Segment,
    state: TaskState<T>,
}

impl<T: Send + 'static> ThreadTask<T> {
    pub fn new(segment: Segment, job: SegmentJob<T>) -> Self {
        Self {
            segment,
            state: TaskState::Pending(job),
        }
    }

    fn failure(&self, message: impl Into<String>) -> CatcheckError {
        CatcheckError::SegmentTask {
            dbid: self.segment.dbid,
            message: message.into(),
        }
    }
}

impl<T: Send + 'static> SegmentTask<T> for ThreadTask<T> {
    fn segment(&self) -> &Segment {
        &self.segment
    }

    fn start(&mut self) {
        self.state = match mem::replace(&mut self.state, TaskState::Finished) {
            TaskState::Pending(job) => {
                let spawned = thread::Builder::new()
                    .name(format!("catcheck-seg-{}", self.segment.dbid))
                    .spawn(job);
                match spawned {
                    Ok(handle) => {
                        debug!(dbid = self.segment.dbid, "segment task started");
                        TaskState::Running(handle)
                    }
                    Err(err) => TaskState::Failed(format!("cannot spawn worker thread: {err}")),
                }
            }
            other => other,
        };
    }

    fn join(&mut self) -> Result<T> {
        match mem::replace(&mut self.state, TaskState::Finished) {
            TaskState::Running(handle) => match handle.join() {
                Ok(result) => result,
                Err(payload) => Err(self.failure(format!(
                    "worker panicked: {}",
                    panic_message(payload.as_ref())
                ))),
            },
            TaskState::Failed(message) => Err(self.failure(message)),
            TaskState::Pending(_) => Err(self.failure("joined before start")),
            TaskState::Finished => Err(self.failure("already joined")),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Default launcher: one [`ThreadTask`] per segment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadLauncher;

impl TaskLauncher for ThreadLauncher {
    fn launch(&self, segment: Segment, job: SegmentJob<ResultSet>) -> Box<dyn SegmentTask<ResultSet>> {
        Box::new(ThreadTask::new(segment, job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(dbid: i32) -> Segment {
        Segment {
            dbid,
            content: dbid - 2,
            hostname: "sdw".to_owned(),
            address: "sdw".to_owned(),
            port: 6000,
            datadir: "/data".to_owned(),
            is_primary: true,
        }
    }

    #[test]
    fn thread_task_runs_on_named_thread() {
        let job: SegmentJob<String> = Box::new(|| {
            Ok(thread::current().name().unwrap_or_default().to_owned())
        });
        let mut task = ThreadTask::new(segment(5), job);
        task.start();
        assert_eq!(task.join().expect("join"), "catcheck-seg-5");
    }

    #[test]
    fn panicking_job_becomes_segment_failure() {
        let job: SegmentJob<()> = Box::new(|| panic!("catalog exploded"));
        let mut task = ThreadTask::new(segment(3), job);
        task.start();
        let err = task.join().expect_err("panic must surface");
        match err {
            CatcheckError::SegmentTask { dbid, message } => {
                assert_eq!(dbid, 3);
                assert!(message.contains("catalog exploded"), "case=panic_message");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn job_error_is_returned_unchanged() {
        let job: SegmentJob<()> = Box::new(|| Err(CatcheckError::query("SELECT 1", "boom")));
        let mut task = ThreadTask::new(segment(2), job);
        task.start();
        assert!(matches!(task.join(), Err(CatcheckError::Query { .. })));
    }

    #[test]
    fn join_without_start_and_double_join_fail() {
        let mut task = ThreadTask::new(segment(2), Box::new(|| Ok(1_u8)));
        assert!(task.join().is_err(), "case=join_before_start");

        let mut task = ThreadTask::new(segment(2), Box::new(|| Ok(1_u8)));
        task.start();
        task.start();
        assert_eq!(task.join().expect("first join"), 1);
        assert!(task.join().is_err(), "case=double_join");
    }

    #[test]
    fn launcher_keeps_segment_identity() {
        let task = ThreadLauncher.launch(segment(9), Box::new(|| Ok(ResultSet::default())));
        assert_eq!(task.segment().dbid, 9);
    }
}
