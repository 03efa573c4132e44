//! Cleanup Tasks
//!
//! Background tasks that periodically drop expired local cache entries,
//! embedded store keys and old performance entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::LocalCache;
use crate::metrics::PerformanceTracker;
use crate::store::MemoryRemoteStore;

/// Runs `sweep` every `interval` until the returned handle is aborted.
///
/// `sweep` returns how many items it removed; non-zero results are logged.
fn spawn_periodic<F>(name: &'static str, interval: Duration, sweep: F) -> JoinHandle<()>
where
    F: Fn() -> usize + Send + 'static,
{
    tokio::spawn(async move {
        info!("Starting {} task with interval of {:?}", name, interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = sweep();
            if removed > 0 {
                info!("{}: removed {} entries", name, removed);
            } else {
                debug!("{}: nothing to remove", name);
            }
        }
    })
}

/// Sweeps expired entries out of the local cache.
///
/// Expiry on read already keeps results correct; the sweep only bounds memory
/// for keys that are written but rarely read.
pub fn spawn_local_cache_sweep<T>(cache: Arc<LocalCache<T>>, interval: Duration) -> JoinHandle<()>
where
    T: Clone + Send + 'static,
{
    spawn_periodic("local cache sweep", interval, move || cache.cleanup_expired())
}

/// Drops performance entries older than the tracker's retention horizon.
pub fn spawn_metrics_cleanup(tracker: Arc<PerformanceTracker>) -> JoinHandle<()> {
    let interval = tracker.config().cleanup_interval;
    spawn_periodic("metrics cleanup", interval, move || tracker.cleanup())
}

/// Removes expired keys from the embedded store.
pub fn spawn_store_cleanup(store: Arc<MemoryRemoteStore>, interval: Duration) -> JoinHandle<()> {
    spawn_periodic("store cleanup", interval, move || store.cleanup_expired())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{OperationStatus, TrackerConfig};
    use crate::store::RemoteStore;

    #[tokio::test]
    async fn test_local_cache_sweep_removes_expired_entries() {
        let cache = Arc::new(LocalCache::<String>::new(100));
        cache.set("expire_soon", "value".to_string(), Duration::from_millis(50));
        cache.set("long_lived", "value".to_string(), Duration::from_secs(3600));

        let handle = spawn_local_cache_sweep(cache.clone(), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(350)).await;

        // Checked via len so the read path's lazy expiry cannot hide a missed sweep
        assert_eq!(cache.len(), 1, "Expired entry should have been swept");
        assert!(cache.get("long_lived").is_some());

        handle.abort();
    }

    #[tokio::test]
    async fn test_metrics_cleanup_applies_retention() {
        let tracker = Arc::new(PerformanceTracker::new(TrackerConfig {
            capacity: 100,
            retention: Duration::from_millis(50),
            cleanup_interval: Duration::from_millis(100),
        }));
        tracker.track("op", 1.0, OperationStatus::Success);

        let handle = spawn_metrics_cleanup(tracker.clone());
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert!(tracker.is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn test_store_cleanup_removes_expired_keys() {
        let store = Arc::new(MemoryRemoteStore::new());
        store.set("gone", "v", Some(0)).await.unwrap();
        store.set("kept", "v", None).await.unwrap();

        let handle = spawn_store_cleanup(store.clone(), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(store.cleanup_expired(), 0, "Sweep should already have run");
        assert_eq!(store.len(), 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let cache = Arc::new(LocalCache::<String>::new(10));
        let handle = spawn_local_cache_sweep(cache, Duration::from_secs(1));

        handle.abort();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
