//! Rate Limiting Module
//!
//! Sliding-window admission control on top of the shared store.

mod decision;
mod limiter;

pub use decision::RateLimitDecision;
pub use limiter::{RateLimiter, DEFAULT_RATE_LIMIT_PREFIX};
