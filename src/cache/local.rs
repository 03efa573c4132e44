//! Local Cache Module
//!
//! Process-local TTL cache. Expiry is lazy on read; the periodic sweep and the
//! size bound only exist to keep memory in check.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats};
use crate::clock::{system_clock, SharedClock};

/// Default bound on the number of local entries
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Debug)]
struct Inner<T> {
    entries: HashMap<String, CacheEntry<T>>,
    stats: CacheStats,
}

// == Local Cache ==
/// In-memory TTL cache guarded for concurrent access.
///
/// Never authoritative: anything stored here may vanish at any time.
#[derive(Debug)]
pub struct LocalCache<T> {
    inner: Mutex<Inner<T>>,
    max_entries: usize,
    clock: SharedClock,
}

impl<T: Clone> LocalCache<T> {
    // == Constructor ==
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, system_clock())
    }

    pub fn with_clock(max_entries: usize, clock: SharedClock) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                stats: CacheStats::new(),
            }),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Get ==
    /// Returns the value if present and not expired.
    ///
    /// A stale entry is removed and counted as a miss.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now_ms();
        let mut guard = self.lock();
        let inner = &mut *guard;

        let expired = match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let value = entry.value.clone();
                inner.stats.record_hit();
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.remove(key);
            debug!(key = %key, "local cache entry expired");
        }
        inner.stats.record_miss();
        None
    }

    // == Set ==
    /// Stores a value, replacing any existing entry and resetting its TTL.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();
        let now = self.clock.now_ms();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let mut inner = self.lock();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            Self::make_room(&mut inner, now, self.max_entries);
        }

        inner.entries.insert(key, CacheEntry::new(value, now, ttl_ms));
    }

    /// Frees one slot: expired entries go first, otherwise the entry closest
    /// to expiry is evicted.
    fn make_room(inner: &mut Inner<T>, now: i64, max_entries: usize) {
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        if inner.entries.len() < max_entries {
            return;
        }

        let soonest = inner
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone());

        if let Some(key) = soonest {
            inner.entries.remove(&key);
            inner.stats.record_eviction();
            debug!(key = %key, "local cache eviction");
        }
    }

    // == Delete ==
    /// Removes an entry. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        inner.stats.snapshot(inner.entries.len())
    }

    /// Zeroes hit, miss and eviction counters.
    pub fn reset_stats(&self) {
        self.lock().stats = CacheStats::new();
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        before - inner.entries.len()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
