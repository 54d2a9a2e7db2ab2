//! The concrete delta-sync jobs between NPWD, RREPW and the
//! waste-organisations API.

pub mod models;
pub mod npwd_producers;
pub mod npwd_prns;
pub mod rrepw_prns;

pub use npwd_producers::UpdateNpwdProducers;
pub use npwd_prns::UpdateNpwdPrns;
pub use rrepw_prns::UpdateRrepwPrns;

use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;

use crate::error::SyncError;
use crate::http::ApiClient;
use crate::sync::{BatchLimits, JobRegistry};

/// Upper bound on pages followed in one fetch.
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// OData datetime literal.
fn odata_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A fetch that came back non-transient cannot yield a window, so the run
/// fails without touching the cursor.
fn fetch_failed(client: &ApiClient, status: Option<u16>) -> SyncError {
    match status {
        Some(status) => SyncError::Http {
            target: client.name().to_string(),
            status,
        },
        None => SyncError::Transport(format!("{} fetch failed", client.name())),
    }
}

/// A window whose pages could not all be read must not advance the cursor.
fn incomplete_fetch(client: &ApiClient, detail: impl Into<String>) -> SyncError {
    SyncError::IncompleteFetch {
        target: client.name().to_string(),
        detail: detail.into(),
    }
}

/// The upstream clients the jobs are wired against.
pub struct Upstreams {
    pub npwd: Arc<ApiClient>,
    pub rrepw: Arc<ApiClient>,
    pub organisations: Arc<ApiClient>,
}

/// Register every sync job.
pub fn register_defaults(registry: &mut JobRegistry, upstreams: &Upstreams, limits: BatchLimits) {
    registry.register(Arc::new(UpdateRrepwPrns::new(
        upstreams.npwd.clone(),
        upstreams.rrepw.clone(),
        limits,
    )));
    registry.register(Arc::new(UpdateNpwdPrns::new(
        upstreams.rrepw.clone(),
        upstreams.npwd.clone(),
        limits,
    )));
    registry.register(Arc::new(UpdateNpwdProducers::new(
        upstreams.organisations.clone(),
        upstreams.npwd.clone(),
        limits,
    )));
}
