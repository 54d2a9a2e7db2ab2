//! Delta synchronisation: cursors, batches, jobs and their scheduler.

pub mod batch;
pub mod context;
pub mod cursor;
pub mod daemon;
pub mod job;
pub mod registry;

pub use batch::{run_batch, BatchLimits, BatchReport};
pub use context::BatchContext;
pub use cursor::{CursorStore, SyncCursor};
pub use daemon::sync_daemon;
pub use job::{FetchWindow, JobReport, JobRunner, RunSummary, SyncJob};
pub use registry::{JobRegistry, LastRun};
