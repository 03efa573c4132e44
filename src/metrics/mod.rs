//! Metrics Module
//!
//! Request latency tracking and windowed aggregates.

mod tracker;

pub use tracker::{
    CacheStatsSource, MetricsSnapshot, OperationStatus, PerformanceEntry, PerformanceTracker,
    TrackerConfig, DEFAULT_WINDOW_MS,
};
