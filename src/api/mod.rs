//! Operator HTTP API for prn-sync.
//!
//! - `GET  /v1/status`: liveness and build version
//! - `GET  /v1/jobs`: every sync job with its cursor and last outcome
//! - `POST /v1/jobs/{name}/run`: run one job now, 409 if it is already running
//!
//! Unknown paths answer with the same JSON error body as handler failures.

pub mod routes;

use axum::http::{Method, Uri};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::SyncError;
use crate::SharedState;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .nest("/v1", routes::v1_router(state))
        .fallback(unknown_route)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn unknown_route(uri: Uri) -> SyncError {
    SyncError::NotFound(format!("Route {}", uri.path()))
}
