//! Performance Tracker
//!
//! Bounded ring buffer of timed operations with windowed aggregates.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheStats, LocalCache};
use crate::clock::{system_clock, SharedClock};

/// Default aggregation window: five minutes
pub const DEFAULT_WINDOW_MS: i64 = 5 * 60 * 1000;

// == Cache Stats Source ==
/// Anything that can report local cache hit rate and size.
pub trait CacheStatsSource: Send + Sync {
    fn cache_stats(&self) -> CacheStats;
}

impl<T: Clone + Send> CacheStatsSource for LocalCache<T> {
    fn cache_stats(&self) -> CacheStats {
        self.stats()
    }
}

// == Entries ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Error,
}

/// One timed operation. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceEntry {
    pub name: String,
    pub duration_ms: f64,
    pub timestamp_ms: i64,
    pub status: OperationStatus,
}

/// Aggregates over a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub avg_response_time: f64,
    pub p95_response_time: f64,
    pub error_rate: f64,
    /// Live local cache figures, independent of the window
    pub cache_hit_rate: f64,
    pub cache_size: usize,
}

/// Buffer sizing and retention.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub capacity: usize,
    pub retention: Duration,
    pub cleanup_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            retention: Duration::from_secs(60 * 60),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

// == Performance Tracker ==
pub struct PerformanceTracker {
    entries: Mutex<VecDeque<PerformanceEntry>>,
    config: TrackerConfig,
    clock: SharedClock,
    cache: Option<Arc<dyn CacheStatsSource>>,
}

impl std::fmt::Debug for PerformanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceTracker")
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish()
    }
}

impl PerformanceTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: TrackerConfig, clock: SharedClock) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(config.capacity.min(4096))),
            config: TrackerConfig {
                capacity: config.capacity.max(1),
                ..config
            },
            clock,
            cache: None,
        }
    }

    /// Reports hit rate and size of this cache in every snapshot.
    pub fn with_cache_stats(mut self, source: Arc<dyn CacheStatsSource>) -> Self {
        self.cache = Some(source);
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PerformanceEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Track ==
    pub fn track(&self, name: impl Into<String>, duration_ms: f64, status: OperationStatus) {
        let entry = PerformanceEntry {
            name: name.into(),
            duration_ms,
            timestamp_ms: self.clock.now_ms(),
            status,
        };

        let mut entries = self.lock();
        entries.push_back(entry);
        while entries.len() > self.config.capacity {
            entries.pop_front();
        }
    }

    /// Awaits `operation` and records its latency under `name`; `Err` counts as an error.
    pub async fn measure<T, E, Fut>(&self, name: &str, operation: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let result = operation.await;
        let status = if result.is_ok() {
            OperationStatus::Success
        } else {
            OperationStatus::Error
        };
        self.track(name, started.elapsed().as_secs_f64() * 1000.0, status);
        result
    }

    // == Metrics ==
    /// Aggregates over entries recorded within the last `window_ms`.
    pub fn get_metrics(&self, window_ms: i64) -> MetricsSnapshot {
        let window = self.window(window_ms, None);
        self.summarize(&window)
    }

    /// Same as [`get_metrics`](Self::get_metrics) restricted to one operation
    /// name. `None` when that name has no entries in the window.
    pub fn get_endpoint_metrics(&self, name: &str, window_ms: i64) -> Option<MetricsSnapshot> {
        let window = self.window(window_ms, Some(name));
        if window.is_empty() {
            None
        } else {
            Some(self.summarize(&window))
        }
    }

    fn window(&self, window_ms: i64, name: Option<&str>) -> Vec<(f64, OperationStatus)> {
        let now = self.clock.now_ms();
        let start = now.saturating_sub(window_ms.max(0));

        self.lock()
            .iter()
            .filter(|e| e.timestamp_ms >= start && e.timestamp_ms <= now)
            .filter(|e| name.map_or(true, |n| e.name == n))
            .map(|e| (e.duration_ms, e.status))
            .collect()
    }

    fn summarize(&self, window: &[(f64, OperationStatus)]) -> MetricsSnapshot {
        let cache = self
            .cache
            .as_ref()
            .map(|source| source.cache_stats())
            .unwrap_or_default();

        let mut snapshot = MetricsSnapshot {
            cache_hit_rate: cache.hit_rate,
            cache_size: cache.size,
            ..MetricsSnapshot::default()
        };
        if window.is_empty() {
            return snapshot;
        }

        let n = window.len();
        let mut durations: Vec<f64> = window.iter().map(|(d, _)| *d).collect();
        durations.sort_by(f64::total_cmp);

        let errors = window
            .iter()
            .filter(|(_, status)| *status == OperationStatus::Error)
            .count();
        let p95_index = ((n as f64 * 0.95).floor() as usize).min(n - 1);

        snapshot.total_requests = n;
        snapshot.avg_response_time = durations.iter().sum::<f64>() / n as f64;
        snapshot.p95_response_time = durations[p95_index];
        snapshot.error_rate = errors as f64 / n as f64;
        snapshot
    }

    // == Cleanup ==
    /// Drops entries older than the retention horizon. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        let cutoff = self.clock.now_ms() - self.config.retention.as_millis() as i64;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| e.timestamp_ms >= cutoff);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "dropped expired performance entries");
        }
        removed
    }

    /// Copy of the buffered entries, oldest first.
    pub fn entries(&self) -> Vec<PerformanceEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
