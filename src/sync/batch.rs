//! Bounded-parallel processing of the items in one fetch window.
//!
//! Items run concurrently up to `max_parallelism`. A fatal error on any item
//! cancels the shared [`BatchContext`]: items not yet started are never
//! started and in-flight items stop at their next suspension point. Work that
//! already completed is not rolled back.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

use super::BatchContext;
use crate::error::{SyncError, SyncResult};
use crate::http::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_parallelism: usize,
}

impl BatchLimits {
    /// Parallelism clamped so in-flight requests never exceed the
    /// per-second budget of the rate limiter they share.
    pub fn new(max_parallelism: usize, requests_per_second: u32) -> Self {
        let budget = usize::try_from(requests_per_second).unwrap_or(usize::MAX);
        Self {
            max_parallelism: max_parallelism.min(budget).max(1),
        }
    }

    pub fn sequential() -> Self {
        Self { max_parallelism: 1 }
    }
}

/// Counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub skipped: usize,
    /// Items that were never started because the batch was cancelled.
    pub not_attempted: usize,
}

/// Run `f` over `items`. Returns the report when every item either succeeded
/// or was skipped, or the error that aborted the batch.
pub async fn run_batch<I, F, Fut>(
    items: Vec<I>,
    ctx: &BatchContext,
    limits: BatchLimits,
    f: F,
) -> SyncResult<BatchReport>
where
    I: Send + 'static,
    F: Fn(I, BatchContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SyncResult<Outcome<()>>> + Send + 'static,
{
    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(limits.max_parallelism));
    let f = Arc::new(f);
    let mut tasks = JoinSet::new();
    let mut started = 0usize;

    for item in items {
        let permit = tokio::select! {
            biased;
            _ = ctx.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => permit
                .map_err(|e| SyncError::Internal(format!("batch semaphore closed: {e}")))?,
        };
        started += 1;

        let f = f.clone();
        let task_ctx = ctx.clone();
        tasks.spawn(async move {
            let call = f(item, task_ctx.clone());
            let result = tokio::select! {
                biased;
                _ = task_ctx.cancelled() => Err(SyncError::Cancelled),
                result = call => result,
            };
            if let Err(e) = &result {
                if e.is_fatal_for_batch() {
                    task_ctx.cancel();
                }
            }
            drop(permit);
            result
        });
    }

    let mut report = BatchReport {
        not_attempted: total - started,
        ..BatchReport::default()
    };
    let mut fatal: Option<SyncError> = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(Outcome::Success(_))) => report.succeeded += 1,
            Ok(Ok(Outcome::Skipped { .. })) => report.skipped += 1,
            Ok(Err(e)) if e.is_fatal_for_batch() => {
                // Prefer the error that caused the abort over the cancellations it triggered.
                if fatal.is_none() || matches!(fatal, Some(SyncError::Cancelled)) {
                    fatal = Some(e);
                }
            }
            Ok(Err(e)) => {
                error!(job = %ctx.job(), "Item failed, skipping: {e}");
                report.skipped += 1;
            }
            Err(e) => {
                error!(job = %ctx.job(), "Item task panicked: {e}");
                ctx.cancel();
                fatal.get_or_insert(SyncError::Internal(format!("item task failed: {e}")));
            }
        }
    }

    if ctx.is_cancelled() || fatal.is_some() {
        let err = fatal.unwrap_or(SyncError::Cancelled);
        warn!(
            job = %ctx.job(),
            succeeded = report.succeeded,
            skipped = report.skipped,
            not_attempted = report.not_attempted,
            "Batch aborted: {err}"
        );
        return Err(err);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn transient() -> SyncError {
        SyncError::Transient {
            target: "rrepw POST /prns".into(),
            detail: "status 503".into(),
        }
    }

    #[test]
    fn test_limits_clamped_to_request_budget() {
        assert_eq!(BatchLimits::new(20, 5).max_parallelism, 5);
        assert_eq!(BatchLimits::new(3, 5).max_parallelism, 3);
        assert_eq!(BatchLimits::new(0, 5).max_parallelism, 1);
    }

    #[tokio::test]
    async fn test_all_items_succeed() {
        let ctx = BatchContext::new("job");
        let report = run_batch(vec![1, 2, 3], &ctx, BatchLimits::new(2, 10), |_, _| async {
            Ok(Outcome::Success(None))
        })
        .await
        .unwrap();

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn test_skipped_item_does_not_stop_batch() {
        let ctx = BatchContext::new("job");
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        let report = run_batch(vec![1, 2, 3], &ctx, BatchLimits::sequential(), move |item, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if item == 1 {
                    Ok(Outcome::Skipped { status: Some(400) })
                } else {
                    Ok(Outcome::Success(None))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_stops_remaining_items() {
        let ctx = BatchContext::new("job");
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        let err = run_batch(vec![1, 2, 3, 4], &ctx, BatchLimits::sequential(), move |item, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if item == 2 {
                    Err(transient())
                } else {
                    Ok(Outcome::Success(None))
                }
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, SyncError::Transient { .. }));
        assert!(ctx.is_cancelled());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_abandons_in_flight_items() {
        let ctx = BatchContext::new("job");
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();

        let err = run_batch(vec![1, 2, 3], &ctx, BatchLimits::new(3, 10), move |item, _| {
            let counter = counter.clone();
            async move {
                if item == 1 {
                    return Err(transient());
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::Success(None))
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, SyncError::Transient { .. }));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pre_cancelled_batch_attempts_nothing() {
        let ctx = BatchContext::new("job");
        ctx.cancel();

        let err = run_batch(vec![1, 2], &ctx, BatchLimits::sequential(), |_, _| async {
            Ok(Outcome::Success(None))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, SyncError::Cancelled));
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let ctx = BatchContext::new("job");
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (in_flight_c, peak_c) = (in_flight.clone(), peak.clone());

        run_batch((0..12).collect(), &ctx, BatchLimits::new(3, 100), move |_: i32, _| {
            let in_flight = in_flight_c.clone();
            let peak = peak_c.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(Outcome::Success(None))
            }
        })
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_non_fatal_error_counts_as_skip() {
        let ctx = BatchContext::new("job");
        let report = run_batch(vec![1], &ctx, BatchLimits::sequential(), |_, _| async {
            Err(SyncError::Internal("bad payload".into()))
        })
        .await
        .unwrap();

        assert_eq!(report.skipped, 1);
    }
}
