use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the prn-sync service.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    // ── Startup ─────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    // ── Credentials ─────────────────────────────────────────────────────
    #[error("Unable to obtain credentials: {0}")]
    Credentials(String),

    // ── Outbound calls ──────────────────────────────────────────────────
    /// A transient upstream failure. The batch is aborted and the window is
    /// retried by the next scheduled run.
    #[error("Transient failure calling {target}: {detail}")]
    Transient { target: String, detail: String },

    /// A request that could not be built or sent for a non-transient reason.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} from {target}")]
    Http { target: String, status: u16 },

    /// A paged fetch that stopped before the upstream ran out of data.
    #[error("Incomplete fetch from {target}: {detail}")]
    IncompleteFetch { target: String, detail: String },

    // ── Run control ─────────────────────────────────────────────────────
    #[error("Batch cancelled")]
    Cancelled,

    #[error("Run timed out after {0}s")]
    Timeout(u64),

    #[error("Job {0} is already running")]
    AlreadyRunning(String),

    // ── Persistence ─────────────────────────────────────────────────────
    #[error("Cursor store error: {0}")]
    Cursor(String),

    #[error("Database error: {0}")]
    Database(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("{0} not found")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether this error aborts the current batch.
    pub fn is_fatal_for_batch(&self) -> bool {
        matches!(
            self,
            SyncError::Transient { .. }
                | SyncError::Cancelled
                | SyncError::Timeout(_)
                | SyncError::Credentials(_)
        )
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        SyncError::Database(e.to_string())
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(e: anyhow::Error) -> Self {
        SyncError::Internal(e.to_string())
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            SyncError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            SyncError::Credentials(_) => (StatusCode::BAD_GATEWAY, "credentials_error"),
            SyncError::Transient { .. } => (StatusCode::BAD_GATEWAY, "transient_upstream_error"),
            SyncError::Transport(_) => (StatusCode::BAD_GATEWAY, "transport_error"),
            SyncError::Http { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
            SyncError::IncompleteFetch { .. } => (StatusCode::BAD_GATEWAY, "incomplete_fetch"),
            SyncError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
            SyncError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            SyncError::AlreadyRunning(_) => (StatusCode::CONFLICT, "already_running"),
            SyncError::Cursor(_) => (StatusCode::INTERNAL_SERVER_ERROR, "cursor_error"),
            SyncError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            SyncError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            SyncError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
