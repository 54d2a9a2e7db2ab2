use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Per-run state threaded through every outbound call of a batch.
///
/// Cloning is cheap and every clone shares the same cancellation signal.
#[derive(Debug, Clone)]
pub struct BatchContext {
    job: Arc<str>,
    cancel: CancellationToken,
}

impl BatchContext {
    pub fn new(job: &str) -> Self {
        Self {
            job: Arc::from(job),
            cancel: CancellationToken::new(),
        }
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    /// Abort the batch. Queued items will not start.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}
