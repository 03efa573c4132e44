//! Sliding-Window Rate Limiter
//!
//! Each limiter key is a sorted set in the shared store whose members are
//! request tokens scored by their timestamp. A check runs purge, count, decide
//! and record as separate store commands. Two concurrent checks on one key can
//! interleave between count and record and admit slightly more than the limit;
//! that looseness is accepted in exchange for staying lock-free.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use super::RateLimitDecision;
use crate::clock::{system_clock, SharedClock};
use crate::error::{CacheError, Result};
use crate::store::RemoteStore;

/// Default namespace for limiter keys
pub const DEFAULT_RATE_LIMIT_PREFIX: &str = "ratelimit:";

// == Rate Limiter ==
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn RemoteStore>,
    clock: SharedClock,
    prefix: String,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::with_clock(store, system_clock())
    }

    pub fn with_clock(store: Arc<dyn RemoteStore>, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            prefix: DEFAULT_RATE_LIMIT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Store key holding the window for `subject`.
    pub fn window_key(&self, subject: &str) -> String {
        format!("{}{}", self.prefix, subject)
    }

    // == Allow ==
    /// Admits or rejects one request for `key`.
    ///
    /// Rejected requests are not recorded and do not consume capacity.
    /// Non-positive limits or windows are rejected before the store is touched.
    pub async fn allow(&self, key: &str, max_requests: i64, window_seconds: i64) -> Result<RateLimitDecision> {
        if key.is_empty() {
            return Err(CacheError::Validation("rate limit key cannot be empty".into()));
        }
        if max_requests <= 0 {
            return Err(CacheError::Validation(format!(
                "max_requests must be positive, got {}",
                max_requests
            )));
        }
        if window_seconds <= 0 {
            return Err(CacheError::Validation(format!(
                "window_seconds must be positive, got {}",
                window_seconds
            )));
        }

        let window_key = self.window_key(key);
        let limit = max_requests as u64;
        let window_ms = window_seconds.saturating_mul(1000);
        let now = self.clock.now_ms();
        let window_start = now.saturating_sub(window_ms);

        self.store
            .zrem_range_by_score(&window_key, 0.0, window_start as f64)
            .await?;
        let count = self.store.zcard(&window_key).await?;

        if count >= limit {
            let oldest = self.store.zrange(&window_key, 0, 0, true).await?;
            let reset_at_ms = match oldest.first().and_then(|m| m.score) {
                Some(score) => (score as i64).saturating_add(window_ms),
                // Window emptied between ZCARD and ZRANGE
                None => now.saturating_add(window_ms),
            };
            let retry_after_seconds = ceil_seconds(reset_at_ms.saturating_sub(now));

            warn!(key = %key, count, limit, retry_after_seconds, "rate limit exceeded");
            return Ok(RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at_ms,
                retry_after_seconds: Some(retry_after_seconds),
            });
        }

        let member = format!("{}-{}", now, Uuid::new_v4());
        self.store.zadd(&window_key, now as f64, &member).await?;
        self.store
            .expire(&window_key, (window_seconds as u64).saturating_add(1))
            .await?;

        let remaining = limit.saturating_sub(count + 1);
        debug!(key = %key, remaining, "request admitted");
        Ok(RateLimitDecision {
            allowed: true,
            limit,
            remaining,
            reset_at_ms: now.saturating_add(window_ms),
            retry_after_seconds: None,
        })
    }
}

/// Milliseconds rounded up to whole seconds, never negative.
fn ceil_seconds(ms: i64) -> u64 {
    if ms <= 0 {
        0
    } else {
        (ms / 1000 + i64::from(ms % 1000 > 0)) as u64
    }
}
