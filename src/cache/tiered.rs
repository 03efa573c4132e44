//! Tiered Data Cache
//!
//! Single entry point for cached queries: the local tier first, then the
//! shared store when one is attached, then the caller's loader.
//!
//! Concurrent misses on the same key each run the loader; there is no request
//! coalescing. Loaders are expected to be idempotent and local TTLs are short.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::key::{build_key, CacheParams, DataKind, TtlTable};
use crate::cache::LocalCache;
use crate::error::{CacheError, Result};
use crate::store::RemoteStore;

/// Default prefix for every cache key
pub const DEFAULT_KEY_PREFIX: &str = "tc:";

/// Settings for [`TieredDataCache`].
#[derive(Debug, Clone)]
pub struct TieredCacheConfig {
    pub key_prefix: String,
    pub ttl_table: TtlTable,
    /// Shared-tier TTL = local TTL x this factor
    pub shared_ttl_factor: u32,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            ttl_table: TtlTable::default(),
            shared_ttl_factor: 2,
        }
    }
}

// == Tiered Data Cache ==
#[derive(Debug, Clone)]
pub struct TieredDataCache {
    local: Arc<LocalCache<Value>>,
    shared: Option<Arc<dyn RemoteStore>>,
    config: TieredCacheConfig,
}

impl TieredDataCache {
    pub fn new(local: Arc<LocalCache<Value>>, config: TieredCacheConfig) -> Self {
        Self {
            local,
            shared: None,
            config,
        }
    }

    /// Attaches the shared store as the second tier.
    pub fn with_shared_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.shared = Some(store);
        self
    }

    pub fn local(&self) -> &Arc<LocalCache<Value>> {
        &self.local
    }

    pub fn key_for(&self, kind: DataKind, params: &CacheParams) -> Result<String> {
        build_key(&self.config.key_prefix, kind, params)
    }

    /// Local-tier TTL for a kind.
    pub fn ttl_for(&self, kind: DataKind) -> Duration {
        self.config.ttl_table.ttl_for(kind)
    }

    fn shared_ttl_seconds(&self, kind: DataKind) -> u64 {
        (self.ttl_for(kind).as_secs() * u64::from(self.config.shared_ttl_factor.max(1))).max(1)
    }

    // == Fetch ==
    /// Returns the cached value for `(kind, params)` or runs `loader` and caches
    /// its result in every tier.
    ///
    /// A failing loader leaves all tiers untouched and its error is returned as
    /// [`CacheError::Loader`].
    ///
    /// Shared-tier failures are not absorbed: a failing GET aborts before the
    /// loader runs, and a failing SET after a successful load discards the
    /// loaded value and returns [`CacheError::Store`]. An unreachable shared
    /// store therefore fails every cache miss even while the loader is healthy.
    pub async fn fetch<T, F, Fut, E>(&self, kind: DataKind, params: &CacheParams, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        let key = self.key_for(kind, params)?;

        if let Some(value) = self.local.get(&key) {
            debug!(key = %key, "local cache hit");
            return Ok(serde_json::from_value(value)?);
        }

        if let Some(store) = &self.shared {
            if let Some(value) = self.read_shared::<T>(store.as_ref(), kind, &key).await? {
                debug!(key = %key, "shared cache hit");
                return Ok(value);
            }
        }

        debug!(key = %key, kind = %kind, "cache miss, running loader");
        let result = loader().await.map_err(|e| CacheError::Loader(e.into()))?;

        let encoded = serde_json::to_value(&result)?;
        if let Some(store) = &self.shared {
            let payload = serde_json::to_string(&encoded)?;
            store
                .set(&key, &payload, Some(self.shared_ttl_seconds(kind)))
                .await?;
        }
        self.local.set(key, encoded, self.ttl_for(kind));

        Ok(result)
    }

    /// Reads and decodes the shared tier. Undecodable payloads count as misses.
    async fn read_shared<T: DeserializeOwned>(
        &self,
        store: &dyn RemoteStore,
        kind: DataKind,
        key: &str,
    ) -> Result<Option<T>> {
        let Some(raw) = store.get(key).await? else {
            return Ok(None);
        };

        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "discarding undecodable shared cache entry");
                return Ok(None);
            }
        };

        let decoded = match serde_json::from_value::<T>(value.clone()) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(key = %key, error = %e, "shared cache entry has unexpected shape");
                return Ok(None);
            }
        };

        // Promote with the local TTL
        self.local.set(key, value, self.ttl_for(kind));
        Ok(Some(decoded))
    }

    // == Invalidate ==
    /// Drops the entry for `(kind, params)` from every tier.
    pub async fn invalidate(&self, kind: DataKind, params: &CacheParams) -> Result<()> {
        let key = self.key_for(kind, params)?;
        self.local.delete(&key);
        if let Some(store) = &self.shared {
            store.del(&key).await?;
        }
        debug!(key = %key, "cache entry invalidated");
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlClass;
    use crate::clock::ManualClock;
    use crate::error::StoreError;
    use crate::store::{Command, MemoryRemoteStore};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        cache: TieredDataCache,
        clock: ManualClock,
        calls: Arc<AtomicUsize>,
    }

    fn local_only() -> Fixture {
        let clock = ManualClock::new(1_000_000);
        let local = Arc::new(LocalCache::with_clock(100, clock.shared()));
        Fixture {
            cache: TieredDataCache::new(local, TieredCacheConfig::default()),
            clock,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_shared() -> (Fixture, Arc<MemoryRemoteStore>) {
        let fixture = local_only();
        let store = Arc::new(MemoryRemoteStore::with_clock(fixture.clock.shared()));
        let cache = fixture.cache.clone().with_shared_store(store.clone());
        (Fixture { cache, ..fixture }, store)
    }

    async fn load_counted(calls: &AtomicUsize, value: u32) -> anyhow::Result<u32> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[tokio::test]
    async fn test_second_fetch_is_served_locally() {
        let f = local_only();
        let params = CacheParams::new();

        let first = f
            .cache
            .fetch(DataKind::AreaBenchmarks, &params, || load_counted(&f.calls, 42))
            .await
            .unwrap();
        let second = f
            .cache
            .fetch(DataKind::AreaBenchmarks, &params, || load_counted(&f.calls, 7))
            .await
            .unwrap();

        assert_eq!((first, second), (42, 42));
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entry_expires_after_kind_ttl() {
        let f = local_only();
        let params = CacheParams::new().with("area", "Marina");
        let ttl = TtlClass::Short.duration().as_millis() as i64;

        f.cache
            .fetch(DataKind::StatusCounts, &params, || load_counted(&f.calls, 1))
            .await
            .unwrap();
        f.clock.advance(ttl - 1);
        f.cache
            .fetch(DataKind::StatusCounts, &params, || load_counted(&f.calls, 2))
            .await
            .unwrap();
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);

        f.clock.advance(2);
        let refreshed = f
            .cache
            .fetch(DataKind::StatusCounts, &params, || load_counted(&f.calls, 3))
            .await
            .unwrap();
        assert_eq!(refreshed, 3);
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_loader_failure_is_not_cached() {
        let f = local_only();
        let params = CacheParams::new();

        let result: Result<u32> = f
            .cache
            .fetch(DataKind::MarketStats, &params, || async {
                f.calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("upstream unavailable"))
            })
            .await;
        assert!(matches!(result, Err(CacheError::Loader(_))));
        assert!(f.cache.local().is_empty());

        let value = f
            .cache
            .fetch(DataKind::MarketStats, &params, || load_counted(&f.calls, 9))
            .await
            .unwrap();
        assert_eq!(value, 9);
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_params_never_reach_loader() {
        let f = local_only();
        let params = CacheParams::new().with("price", f64::INFINITY);

        let result = f
            .cache
            .fetch(DataKind::MarketStats, &params, || load_counted(&f.calls, 1))
            .await;
        assert!(matches!(result, Err(CacheError::Validation(_))));
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_loader_result_populates_shared_tier() {
        let (f, store) = with_shared();
        let params = CacheParams::new().with("city", "Dubai");

        f.cache
            .fetch(DataKind::ListingCounts, &params, || load_counted(&f.calls, 5))
            .await
            .unwrap();

        let key = f.cache.key_for(DataKind::ListingCounts, &params).unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_shared_hit_is_promoted_locally() {
        let (f, store) = with_shared();
        let params = CacheParams::new();
        let key = f.cache.key_for(DataKind::ActiveAgents, &params).unwrap();
        store.set(&key, "[1,2,3]", Some(600)).await.unwrap();

        let agents: Vec<u32> = f
            .cache
            .fetch(DataKind::ActiveAgents, &params, || async {
                f.calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(vec![])
            })
            .await
            .unwrap();

        assert_eq!(agents, vec![1, 2, 3]);
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
        assert!(f.cache.local().get(&key).is_some());
    }

    #[tokio::test]
    async fn test_shared_tier_outlives_local_tier() {
        let (f, _store) = with_shared();
        let params = CacheParams::new();
        let ttl = TtlClass::Long.duration().as_millis() as i64;

        f.cache
            .fetch(DataKind::AreaBenchmarks, &params, || load_counted(&f.calls, 1))
            .await
            .unwrap();
        f.clock.advance(ttl + 1);

        // Local entry is gone, shared entry (2x TTL) still answers
        let value = f
            .cache
            .fetch(DataKind::AreaBenchmarks, &params, || load_counted(&f.calls, 2))
            .await
            .unwrap();
        assert_eq!(value, 1);
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_corrupt_shared_entry_falls_back_to_loader() {
        let (f, store) = with_shared();
        let params = CacheParams::new();
        let key = f.cache.key_for(DataKind::MarketStats, &params).unwrap();
        store.set(&key, "{not json", None).await.unwrap();

        let value = f
            .cache
            .fetch(DataKind::MarketStats, &params, || load_counted(&f.calls, 11))
            .await
            .unwrap();

        assert_eq!(value, 11);
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("11"));
    }

    #[tokio::test]
    async fn test_invalidate_clears_both_tiers() {
        let (f, store) = with_shared();
        let params = CacheParams::new().with("id", 7);
        let key = f.cache.key_for(DataKind::PropertyCounts, &params).unwrap();

        f.cache
            .fetch(DataKind::PropertyCounts, &params, || load_counted(&f.calls, 1))
            .await
            .unwrap();
        f.cache.invalidate(DataKind::PropertyCounts, &params).await.unwrap();

        assert!(f.cache.local().get(&key).is_none());
        assert!(store.get(&key).await.unwrap().is_none());
    }

    /// Store whose reads or writes fail; everything else is a no-op.
    #[derive(Debug)]
    struct BrokenStore {
        reads_fail: bool,
    }

    #[async_trait]
    impl RemoteStore for BrokenStore {
        async fn execute(&self, command: Command) -> std::result::Result<Value, StoreError> {
            match command {
                Command::Get { .. } if self.reads_fail => {
                    Err(StoreError::Transport("connection reset".into()))
                }
                Command::Get { .. } => Ok(Value::Null),
                Command::Set { .. } => Err(StoreError::Timeout(2000)),
                _ => Ok(Value::Null),
            }
        }
    }

    fn with_broken_store(reads_fail: bool) -> Fixture {
        let fixture = local_only();
        let cache = fixture
            .cache
            .clone()
            .with_shared_store(Arc::new(BrokenStore { reads_fail }));
        Fixture { cache, ..fixture }
    }

    #[tokio::test]
    async fn test_shared_read_failure_propagates() {
        let f = with_broken_store(true);

        let result = f
            .cache
            .fetch(DataKind::ActiveAgents, &CacheParams::new(), || load_counted(&f.calls, 1))
            .await;

        assert!(matches!(result, Err(CacheError::Store(StoreError::Transport(_)))));
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
        assert!(f.cache.local().is_empty());
    }

    #[tokio::test]
    async fn test_shared_write_failure_discards_loaded_value() {
        let f = with_broken_store(false);

        let result = f
            .cache
            .fetch(DataKind::ActiveAgents, &CacheParams::new(), || load_counted(&f.calls, 1))
            .await;

        assert!(matches!(result, Err(CacheError::Store(StoreError::Timeout(2000)))));
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
        assert!(f.cache.local().is_empty());
    }
}
