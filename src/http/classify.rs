//! Outcome classification for outbound calls.

use serde::Serialize;

/// How the pipeline treats the result of a single outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Success,
    /// The item is abandoned but the batch carries on.
    NonTransient,
    /// The whole batch is abandoned; the next scheduled run retries the window.
    Transient,
}

/// Classify an HTTP status code. Total over `u16`.
pub fn classify_status(status: u16) -> Classification {
    match status {
        200..=299 => Classification::Success,
        408 | 429 | 500..=599 => Classification::Transient,
        _ => Classification::NonTransient,
    }
}

/// Classify a failure that happened before a status code was available.
pub fn classify_error(err: &reqwest::Error) -> Classification {
    if let Some(status) = err.status() {
        return classify_status(status.as_u16());
    }
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        Classification::Transient
    } else {
        Classification::NonTransient
    }
}
