pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod jobs;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{SyncError, SyncResult};

use std::sync::Arc;

/// Shared application state passed to the API handlers and the scheduler.
pub struct AppState {
    pub config: Config,
    pub runner: sync::JobRunner,
    pub registry: sync::JobRegistry,
}

pub type SharedState = Arc<AppState>;
