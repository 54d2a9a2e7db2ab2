use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

use super::batch::BatchReport;
use super::cursor::SyncCursor;
use super::BatchContext;
use crate::error::{SyncError, SyncResult};

/// The half-open interval `[from, to)` of changes a run fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobReport {
    /// Records returned by the upstream for the window.
    pub fetched: usize,
    #[serde(flatten)]
    pub batch: BatchReport,
}

/// A scheduled delta synchronisation: fetch changes in a window, map them,
/// push them to the other side.
#[async_trait]
pub trait SyncJob: Send + Sync {
    /// Unique job name, also the cursor key (e.g. "update-rrepw-prns").
    fn name(&self) -> &str;

    /// Process one window. Must return `Err` if the window was not fully
    /// attempted so the cursor is not advanced past it.
    async fn run_window(&self, window: FetchWindow, ctx: &BatchContext) -> SyncResult<JobReport>;
}

/// What a completed run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub job: String,
    pub window: FetchWindow,
    pub report: JobReport,
    pub cursor_advanced: bool,
}

/// Runs jobs against their cursors.
#[derive(Clone)]
pub struct JobRunner {
    cursor: SyncCursor,
    run_timeout: Option<Duration>,
}

impl JobRunner {
    pub fn new(cursor: SyncCursor) -> Self {
        Self {
            cursor,
            run_timeout: None,
        }
    }

    /// Cancel a run that takes longer than `limit`.
    pub fn with_run_timeout(mut self, limit: Duration) -> Self {
        self.run_timeout = Some(limit);
        self
    }

    pub fn cursor(&self) -> &SyncCursor {
        &self.cursor
    }

    pub async fn run(&self, job: &dyn SyncJob) -> SyncResult<RunSummary> {
        let name = job.name();
        let from = self.cursor.get_last_run(name).await?;
        let window = FetchWindow {
            from,
            // Millisecond precision, the resolution the cursor is stored at.
            to: Utc::now().trunc_subsecs(3).max(from),
        };
        let ctx = BatchContext::new(name);

        info!("Starting {name} for window {} .. {}", window.from, window.to);

        let result = match self.run_timeout {
            Some(limit) => match tokio::time::timeout(limit, job.run_window(window, &ctx)).await {
                Ok(result) => result,
                Err(_) => {
                    ctx.cancel();
                    Err(SyncError::Timeout(limit.as_secs()))
                }
            },
            None => job.run_window(window, &ctx).await,
        };

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                error!("{name} aborted, cursor left at {}: {e}", window.from);
                return Err(e);
            }
        };

        let cursor_advanced = if report.fetched > 0 {
            self.cursor.set_last_run(name, window.to).await?
        } else {
            info!("{name} found no new records, cursor unchanged");
            false
        };

        info!(
            fetched = report.fetched,
            succeeded = report.batch.succeeded,
            skipped = report.batch.skipped,
            "{name} completed"
        );

        Ok(RunSummary {
            job: name.to_string(),
            window,
            report,
            cursor_advanced,
        })
    }
}
