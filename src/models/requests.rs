//! Request DTOs for the service API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::metrics::DEFAULT_WINDOW_MS;

/// Longest accepted rate limit subject
pub const MAX_KEY_LENGTH: usize = 256;

/// Request body for POST /ratelimit/check
///
/// # Fields
/// - `key`: Subject being limited (user id, IP, API key)
/// - `max_requests`: Requests allowed per window
/// - `window_seconds`: Window length
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitRequest {
    pub key: String,
    pub max_requests: i64,
    pub window_seconds: i64,
}

impl RateLimitRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    /// Range checks on the numbers are left to the limiter.
    pub fn validate(&self) -> Option<String> {
        if self.key.trim().is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LENGTH
            ));
        }
        None
    }
}

/// Query string for the metrics endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsQuery {
    /// Lookback window in milliseconds
    #[serde(default)]
    pub window_ms: Option<i64>,
}

impl MetricsQuery {
    pub fn window_ms(&self) -> i64 {
        self.window_ms.unwrap_or(DEFAULT_WINDOW_MS)
    }
}
