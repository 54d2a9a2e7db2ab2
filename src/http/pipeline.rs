//! Outbound call pipeline shared by every fetch and push.
//!
//! Each call is sent exactly once and its outcome classified:
//! - success: the (optional) body is returned;
//! - non-transient: logged, the item is skipped, the batch carries on;
//! - transient: logged, the batch is cancelled and an error returned.
//!
//! There is no in-process retry. A transient failure leaves the job cursor
//! where it was so the next scheduled run fetches the same window again.

use governor::DefaultDirectRateLimiter;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

use super::classify::{classify_error, classify_status, Classification};
use crate::auth::TokenCache;
use crate::error::{SyncError, SyncResult};
use crate::sync::BatchContext;

/// Result of a call that did not abort the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// 2xx. `None` when the body was empty or could not be parsed.
    Success(Option<T>),
    /// Non-transient failure; `status` is `None` when no response arrived.
    Skipped { status: Option<u16> },
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The parsed body, if the call succeeded and returned one.
    pub fn into_body(self) -> Option<T> {
        match self {
            Outcome::Success(body) => body,
            Outcome::Skipped { .. } => None,
        }
    }
}

/// A single outbound request, relative to the client's base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    item: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            item: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> SyncResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| SyncError::Internal(format!("Failed to serialize request body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Tag the request with the business identifier it concerns, for logs.
    pub fn for_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// What came back from the wire once a call survived classification.
enum Dispatched {
    Body(String),
    Skipped(Option<u16>),
}

/// HTTP client for one upstream API.
pub struct ApiClient {
    name: String,
    base_url: String,
    http: reqwest::Client,
    tokens: Option<Arc<TokenCache>>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl ApiClient {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            tokens: None,
            limiter: None,
        }
    }

    /// Attach a bearer token from this cache to every request.
    pub fn with_tokens(mut self, tokens: Arc<TokenCache>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Wait on this limiter before every request.
    pub fn with_rate_limiter(mut self, limiter: Arc<DefaultDirectRateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request path for an absolute link issued by this upstream, such as an
    /// OData next link. `None` if the link points elsewhere.
    pub fn relative_path<'a>(&self, link: &'a str) -> Option<&'a str> {
        link.strip_prefix(self.base_url.as_str())
            .filter(|rest| rest.starts_with('/'))
    }

    /// Send `req` and deserialize a successful body as `T`.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        req: ApiRequest,
        ctx: &BatchContext,
    ) -> SyncResult<Outcome<T>> {
        let target = req.to_string();
        match self.dispatch(req, ctx).await? {
            Dispatched::Body(body) => Ok(Outcome::Success(self.parse_body(&target, &body))),
            Dispatched::Skipped(status) => Ok(Outcome::Skipped { status }),
        }
    }

    /// Send `req` and ignore any successful body.
    pub async fn push(&self, req: ApiRequest, ctx: &BatchContext) -> SyncResult<Outcome<()>> {
        match self.dispatch(req, ctx).await? {
            Dispatched::Body(_) => Ok(Outcome::Success(Some(()))),
            Dispatched::Skipped(status) => Ok(Outcome::Skipped { status }),
        }
    }

    async fn dispatch(&self, req: ApiRequest, ctx: &BatchContext) -> SyncResult<Dispatched> {
        if ctx.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let target = format!("{} {}", self.name, req);
        let item = req.item.clone().unwrap_or_default();

        let sent = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(SyncError::Cancelled),
            sent = self.send(req) => sent?,
        };

        let resp = match sent {
            Ok(resp) => resp,
            Err(e) => return self.transport_failure(ctx, &target, &item, e),
        };

        let status = resp.status().as_u16();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return self.transport_failure(ctx, &target, &item, e),
        };

        match classify_status(status) {
            Classification::Success => {
                info!(job = %ctx.job(), item = %item, "{target} succeeded with {status}");
                Ok(Dispatched::Body(body))
            }
            Classification::NonTransient => {
                error!(
                    job = %ctx.job(),
                    item = %item,
                    "{target} failed with {status}, skipping item: {body}"
                );
                if status == 401 {
                    if let Some(tokens) = &self.tokens {
                        tokens.invalidate().await;
                    }
                }
                Ok(Dispatched::Skipped(Some(status)))
            }
            Classification::Transient => {
                error!(
                    job = %ctx.job(),
                    item = %item,
                    "{target} failed with transient status {status}, aborting batch: {body}"
                );
                ctx.cancel();
                Err(SyncError::Transient {
                    target,
                    detail: format!("status {status}"),
                })
            }
        }
    }

    /// Rate limit, authenticate and send. The outer `Result` carries errors
    /// that never reached the wire (credentials); the inner one is the
    /// transport result.
    async fn send(
        &self,
        req: ApiRequest,
    ) -> SyncResult<Result<reqwest::Response, reqwest::Error>> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let url = format!("{}{}", self.base_url, req.path);
        let mut builder = self.http.request(req.method, url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }
        if let Some(tokens) = &self.tokens {
            builder = builder.bearer_auth(tokens.get_token().await?);
        }

        Ok(builder.send().await)
    }

    fn transport_failure(
        &self,
        ctx: &BatchContext,
        target: &str,
        item: &str,
        err: reqwest::Error,
    ) -> SyncResult<Dispatched> {
        match classify_error(&err) {
            Classification::Transient => {
                error!(job = %ctx.job(), item = %item, "{target} transport failure, aborting batch: {err}");
                ctx.cancel();
                Err(SyncError::Transient {
                    target: target.to_string(),
                    detail: err.to_string(),
                })
            }
            _ => {
                error!(job = %ctx.job(), item = %item, "{target} request failed, skipping item: {err}");
                Ok(Dispatched::Skipped(err.status().map(|s| s.as_u16())))
            }
        }
    }

    fn parse_body<T: DeserializeOwned>(&self, target: &str, body: &str) -> Option<T> {
        if body.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(body) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                error!("Failed to parse {} response from {target}: {e}", self.name);
                None
            }
        }
    }
}
