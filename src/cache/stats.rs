//! Cache Statistics Module
//!
//! Hit, miss and eviction counters for [`LocalCache`](super::LocalCache).

use serde::Serialize;

// == Cache Stats ==
/// Local cache counters since process start or the last reset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Reads answered from the cache
    pub hits: u64,
    /// Reads that found nothing live (absent or expired)
    pub misses: u64,
    /// Number of entries evicted to stay within the size bound
    pub evictions: u64,
    /// Entries held when the report was taken
    pub size: usize,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl CacheStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// hits / (hits + misses); 0.0 before the first read.
    pub fn compute_hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Copies the counters into a report with `size` and `hit_rate` filled in.
    pub fn snapshot(&self, size: usize) -> Self {
        Self {
            size,
            hit_rate: self.compute_hit_rate(),
            ..self.clone()
        }
    }
}
