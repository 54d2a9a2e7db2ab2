use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::job::{JobRunner, RunSummary, SyncJob};
use crate::error::{SyncError, SyncResult};

/// Outcome of the most recent run of a job.
#[derive(Debug, Clone, Serialize)]
pub struct LastRun {
    pub finished_at: DateTime<Utc>,
    pub succeeded: bool,
    pub summary: Option<RunSummary>,
    pub error: Option<String>,
}

struct Entry {
    job: Arc<dyn SyncJob>,
    running: Mutex<()>,
    last: RwLock<Option<LastRun>>,
}

/// Registry of sync jobs, keyed by job name.
///
/// A job never runs concurrently with itself; a second trigger while one is
/// in progress is rejected.
#[derive(Default)]
pub struct JobRegistry {
    jobs: BTreeMap<String, Entry>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job.
    pub fn register(&mut self, job: Arc<dyn SyncJob>) {
        let name = job.name().to_string();
        self.jobs.insert(
            name,
            Entry {
                job,
                running: Mutex::new(()),
                last: RwLock::new(None),
            },
        );
    }

    /// All registered job names, in order.
    pub fn names(&self) -> Vec<&str> {
        self.jobs.keys().map(|k| k.as_str()).collect()
    }

    /// Number of registered jobs.
    pub fn count(&self) -> usize {
        self.jobs.len()
    }

    pub async fn last_run(&self, name: &str) -> Option<LastRun> {
        self.jobs.get(name)?.last.read().await.clone()
    }

    /// Run `name` once through `runner` and remember the outcome.
    pub async fn run(&self, name: &str, runner: &JobRunner) -> SyncResult<RunSummary> {
        let entry = self
            .jobs
            .get(name)
            .ok_or_else(|| SyncError::NotFound(format!("job {name}")))?;
        let _running = entry
            .running
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning(name.to_string()))?;

        let result = runner.run(entry.job.as_ref()).await;

        let last = match &result {
            Ok(summary) => LastRun {
                finished_at: Utc::now(),
                succeeded: true,
                summary: Some(summary.clone()),
                error: None,
            },
            Err(e) => LastRun {
                finished_at: Utc::now(),
                succeeded: false,
                summary: None,
                error: Some(e.to_string()),
            },
        };
        *entry.last.write().await = Some(last);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCursorStore;
    use crate::sync::{BatchContext, FetchWindow, JobReport, SyncCursor};
    use async_trait::async_trait;

    struct NamedJob(&'static str);

    #[async_trait]
    impl SyncJob for NamedJob {
        fn name(&self) -> &str {
            self.0
        }

        async fn run_window(&self, _window: FetchWindow, _ctx: &BatchContext) -> SyncResult<JobReport> {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(JobReport::default())
        }
    }

    fn runner() -> JobRunner {
        JobRunner::new(SyncCursor::new(Arc::new(MemoryCursorStore::new()), Utc::now()))
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = JobRegistry::new();
        registry.register(Arc::new(NamedJob("b")));
        registry.register(Arc::new(NamedJob("a")));

        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let registry = JobRegistry::new();
        let err = registry.run("missing", &runner()).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_overlapping_runs_rejected() {
        let mut registry = JobRegistry::new();
        registry.register(Arc::new(NamedJob("a")));
        let runner = runner();

        let (first, second) = tokio::join!(registry.run("a", &runner), registry.run("a", &runner));

        assert!(first.is_ok());
        assert!(matches!(second, Err(SyncError::AlreadyRunning(_))));
    }

    #[tokio::test]
    async fn test_last_run_recorded() {
        let mut registry = JobRegistry::new();
        registry.register(Arc::new(NamedJob("a")));

        assert!(registry.last_run("a").await.is_none());
        registry.run("a", &runner()).await.unwrap();

        let last = registry.last_run("a").await.unwrap();
        assert!(last.succeeded);
        assert!(last.error.is_none());
    }
}
