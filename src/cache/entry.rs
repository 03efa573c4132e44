//! Cache Entry Module
//!
//! Defines the structure for individual local cache entries with TTL support.

// == Cache Entry ==
/// A single local cache entry. Owned exclusively by the local cache.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The stored value
    pub value: T,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: i64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry that expires `ttl_ms` after `now`.
    pub fn new(value: T, now: i64, ttl_ms: u64) -> Self {
        let ttl_ms = i64::try_from(ttl_ms).unwrap_or(i64::MAX);
        Self {
            value,
            expires_at: now.saturating_add(ttl_ms),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry stays readable up to and including its expiration instant and
    /// is stale strictly after it.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}
