//! Rate Limit Decision
//!
//! Outcome of one admission check, plus the conventional response headers.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

/// Result of [`RateLimiter::allow`](super::RateLimiter::allow).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Configured maximum for the window
    pub limit: u64,
    /// Requests left in the current window, never negative
    pub remaining: u64,
    /// When the window frees capacity again (Unix milliseconds)
    pub reset_at_ms: i64,
    /// Whole seconds to wait before retrying, only set when denied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl RateLimitDecision {
    /// `X-RateLimit-*` headers, plus `Retry-After` when denied.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let reset_secs = self.reset_at_ms.div_euclid(1000) + i64::from(self.reset_at_ms.rem_euclid(1000) > 0);

        headers.insert(
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from(self.limit),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from(self.remaining),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderValue::from(reset_secs),
        );
        if let Some(retry_after) = self.retry_after_seconds {
            headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after));
        }

        headers
    }
}
