//! Scheduled trigger for every registered sync job.
//!
//! Each tick runs the jobs one after another. A failed run is logged and the
//! same window is picked up again on the next tick.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Start the scheduler loop. Returns when `shutdown` is cancelled.
pub async fn sync_daemon(state: Arc<crate::AppState>, shutdown: CancellationToken) {
    let period = tokio::time::Duration::from_secs(state.config.sync_interval_secs.max(1));
    info!(
        "Sync daemon started (interval: {}s, jobs: {})",
        period.as_secs(),
        state.registry.count()
    );

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Sync daemon stopping");
                return;
            }
            _ = ticker.tick() => sync_cycle(&state).await,
        }
    }
}

async fn sync_cycle(state: &crate::AppState) {
    for name in state.registry.names() {
        if let Err(e) = state.registry.run(name, &state.runner).await {
            error!("Sync run {name} failed: {e}");
        }
    }
}
