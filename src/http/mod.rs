//! Outbound HTTP: outcome classification and the call pipeline.

pub mod classify;
pub mod pipeline;

pub use classify::{classify_error, classify_status, Classification};
pub use pipeline::{ApiClient, ApiRequest, Outcome};

use anyhow::{Context, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::num::NonZeroU32;
use std::time::Duration;

/// RFC 3986 unreserved characters stay as-is.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a record identifier for use as one URL path segment.
pub fn path_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

/// Build the shared reqwest client used for every upstream.
pub fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("prn-sync/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Token-bucket limiter allowing `requests_per_second` calls with no burst
/// beyond that budget.
pub fn rate_limiter(requests_per_second: u32) -> DefaultDirectRateLimiter {
    let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(per_second))
}
