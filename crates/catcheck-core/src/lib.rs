//! Check execution and segment dispatch engine for catcheck.
//!
//! # Architecture
//!
//! ```text
//!   CLI / driver
//!        │
//!        ▼
//!   Orchestrator ──► CheckRegistry ──► Check::run_check(CheckEnv)
//!        │                                   │
//!        │                 single connection ┤ segment fan-out
//!        │                                   ▼
//!        │              resolve_batch_size ─► BatchScheduler (waves of B)
//!        │                                   │   SegmentTask::start / join
//!        ▼                                   ▼
//!   RunContext (verdict, raised errors, retained violations)
//!        │
//!        ├── RepairClassifier ──► RepairGenerator ──► ReportSink::print_repair_issues
//!        └── checkcat_report  ──► ReportSink::log
//! ```
//!
//! Collaborators (connections, segment tasks, repair generation, report
//! sinks, leaked-schema droppers) are traits; this crate ships one concrete
//! implementation of each, backed by SQLite catalog snapshots and OS threads.

pub mod batch_size;
pub mod checks;
pub mod cluster;
pub mod connection;
pub mod context;
pub mod leaked_schema;
pub mod orchestrator;
pub mod registry;
pub mod repair;
pub mod report;
pub mod scheduler;
pub mod sink;
pub mod snapshot;
pub mod task;

pub use batch_size::{BatchPolicy, BatchSource, ResolvedBatch, resolve_batch_size};
pub use cluster::load_segment_registry;
pub use connection::{Connection, Connector, ResultSet, Value};
pub use context::{CheckRun, RunContext};
pub use leaked_schema::{
    DropReport, DropStyle, LeakedSchemaDropper, TempSchemaDropper, drop_leaked_schemas,
};
pub use orchestrator::Orchestrator;
pub use registry::{Check, CheckEnv, CheckFindings, CheckRegistry};
pub use repair::{FileRepairGenerator, RepairClassifier, RepairDecision, RepairGenerator};
pub use report::{ReportLine, RunSummary, checkcat_report, render_report};
pub use scheduler::{BatchOutcome, BatchScheduler, SegmentResult, WaveReport};
pub use sink::{MemorySink, ReportSink, TracingSink};
pub use snapshot::{SnapshotConnection, SnapshotConnector};
pub use task::{SegmentJob, SegmentTask, TaskLauncher, ThreadLauncher, ThreadTask};
