//! API route handlers for prn-sync.
//!
//! The scheduler is the normal trigger; these endpoints report job state and
//! allow an operator to kick a run by hand.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::error::SyncError;
use crate::sync::LastRun;
use crate::SharedState;

// =============================================================================
// V1 Router
// =============================================================================

pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/status", get(status))
        // ── Jobs ─────────────────────────────────────────────────────────
        .route("/jobs", get(job_list))
        .route("/jobs/{name}/run", post(job_run))
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "prn-sync",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// Jobs
// =============================================================================

#[derive(Serialize)]
struct JobStatus {
    name: String,
    /// Lower bound of the next window.
    last_sync_time: chrono::DateTime<chrono::Utc>,
    last_run: Option<LastRun>,
}

/// GET /v1/jobs: every registered job with its cursor and last outcome.
async fn job_list(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, SyncError> {
    let mut jobs = Vec::with_capacity(state.registry.count());
    for name in state.registry.names() {
        jobs.push(JobStatus {
            name: name.to_string(),
            last_sync_time: state.runner.cursor().get_last_run(name).await?,
            last_run: state.registry.last_run(name).await,
        });
    }

    Ok(Json(json!({ "data": jobs })))
}

/// POST /v1/jobs/{name}/run: run a job now and return its summary.
async fn job_run(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, SyncError> {
    info!("Manual run requested for {name}");
    let summary = state.registry.run(&name, &state.runner).await?;
    Ok(Json(json!({ "data": summary })))
}
