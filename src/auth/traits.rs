use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SyncError;

/// A token returned from an upstream token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<u64>,
}

/// Something that can mint bearer tokens for one upstream.
///
/// Implementations do exactly one fetch per call and never retry; the
/// [`TokenCache`](super::TokenCache) decides when a fetch is needed.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Identifier used in logs (e.g. "npwd", "rrepw").
    fn id(&self) -> &str;

    /// Fetch a fresh token from the upstream.
    async fn fetch(&self) -> Result<TokenSet, SyncError>;

    /// Lifetime assumed when the token endpoint omits `expires_in`.
    fn default_ttl(&self) -> Duration {
        Duration::from_secs(3600)
    }
}
