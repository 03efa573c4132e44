//! Tiercache - tiered caching and rate limiting for read-heavy services
//!
//! Provides a local TTL cache in front of a shared key-value store, a sliding
//! window rate limiter on the same store, and request performance tracking.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod ratelimit;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheParams, DataKind, LocalCache, TieredDataCache};
pub use config::Config;
pub use error::{CacheError, StoreError};
pub use metrics::PerformanceTracker;
pub use ratelimit::{RateLimitDecision, RateLimiter};
pub use store::RemoteStore;
