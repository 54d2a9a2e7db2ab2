//! Cache-aside bearer token store with single-flight refresh.
//!
//! One `TokenCache` exists per upstream credential pair. Readers take the
//! read lock only; a stale or missing token sends callers through the refill
//! mutex, where the cache is re-checked before any fetch so concurrent
//! callers produce exactly one request to the token endpoint.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use super::traits::{TokenSet, TokenSource};
use crate::error::SyncError;

/// Fraction of the reported lifetime after which a token is refreshed.
const REFRESH_THRESHOLD: f64 = 0.9;

/// Reported lifetimes are capped at a day.
const MAX_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A bearer token and when it stops being served from cache.
#[derive(Debug, Clone)]
pub struct BearerToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
    refresh_at: Instant,
}

impl BearerToken {
    fn from_token_set(set: TokenSet, default_ttl: Duration) -> Self {
        let ttl = set
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(default_ttl)
            .min(MAX_TOKEN_TTL);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            value: set.access_token,
            expires_at,
            refresh_at: Instant::now() + ttl.mul_f64(REFRESH_THRESHOLD),
        }
    }

    fn is_fresh(&self) -> bool {
        Instant::now() < self.refresh_at
    }
}

pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    cached: RwLock<Option<BearerToken>>,
    refill: Mutex<()>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
            refill: Mutex::new(()),
        }
    }

    /// Get a valid bearer token, fetching a new one only when necessary.
    #[instrument(skip(self), fields(upstream = %self.source.id()))]
    pub async fn get_token(&self) -> Result<String, SyncError> {
        if let Some(token) = self.fresh_token().await {
            debug!("Using cached token");
            return Ok(token);
        }

        let _guard = self.refill.lock().await;

        // Another caller may have refilled while we waited on the lock.
        if let Some(token) = self.fresh_token().await {
            debug!("Token refreshed by a concurrent caller");
            return Ok(token);
        }

        let token = BearerToken::from_token_set(self.source.fetch().await?, self.source.default_ttl());
        info!(
            "Acquired new {} token, expires at {}",
            self.source.id(),
            token.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        let value = token.value.clone();
        *self.cached.write().await = Some(token);
        Ok(value)
    }

    /// Drop the cached token, forcing a fetch on next use.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    async fn fresh_token(&self) -> Option<String> {
        self.cached
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_fresh())
            .map(|t| t.value.clone())
    }
}
