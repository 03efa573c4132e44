//! Configuration Module
//!
//! Loads service configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{TieredCacheConfig, TtlTable, DEFAULT_KEY_PREFIX, DEFAULT_MAX_ENTRIES};
use crate::metrics::TrackerConfig;
use crate::ratelimit::DEFAULT_RATE_LIMIT_PREFIX;
use crate::store::HttpStoreConfig;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared store endpoint; None runs an embedded in-memory store
    pub remote_store_url: Option<String>,
    /// Bearer token for the shared store (and the embedded `/store` endpoint)
    pub remote_store_token: Option<String>,
    /// Per-command timeout in milliseconds
    pub remote_store_timeout_ms: u64,
    /// Base URL of the data service used as the cache loader
    pub data_upstream_url: Option<String>,
    /// Prefix for every cache key
    pub cache_key_prefix: String,
    /// `kind=class` overrides applied on top of the default TTL table
    pub cache_ttl_overrides: String,
    /// Shared-tier TTL multiplier
    pub cache_shared_ttl_factor: u32,
    /// Maximum number of local cache entries
    pub local_cache_max_entries: usize,
    /// Seconds between local cache sweeps
    pub local_cache_sweep_interval: u64,
    /// Namespace for rate limiter keys
    pub rate_limit_prefix: String,
    /// Performance ring buffer capacity
    pub metrics_capacity: usize,
    /// Seconds between performance buffer cleanups
    pub metrics_cleanup_interval: u64,
    /// Seconds performance entries are retained
    pub metrics_retention: u64,
    /// HTTP server port
    pub server_port: u16,
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REMOTE_STORE_URL` - Shared store URL (default: unset, embedded store)
    /// - `REMOTE_STORE_TOKEN` - Shared store bearer token (default: unset)
    /// - `REMOTE_STORE_TIMEOUT_MS` - Command timeout (default: 2000)
    /// - `DATA_UPSTREAM_URL` - Loader endpoint base URL (default: unset)
    /// - `CACHE_KEY_PREFIX` - Cache key prefix (default: "tc:")
    /// - `CACHE_TTL_OVERRIDES` - e.g. "marketStats=short,statusCounts=medium"
    /// - `CACHE_SHARED_TTL_FACTOR` - Shared-tier TTL multiplier (default: 2)
    /// - `LOCAL_CACHE_MAX_ENTRIES` - Local cache bound (default: 1000)
    /// - `LOCAL_CACHE_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 30)
    /// - `RATE_LIMIT_PREFIX` - Limiter key namespace (default: "ratelimit:")
    /// - `METRICS_CAPACITY` - Ring buffer capacity (default: 1000)
    /// - `METRICS_CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    /// - `METRICS_RETENTION` - Retention horizon in seconds (default: 3600)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            remote_store_url: optional("REMOTE_STORE_URL"),
            remote_store_token: optional("REMOTE_STORE_TOKEN"),
            remote_store_timeout_ms: parsed("REMOTE_STORE_TIMEOUT_MS", defaults.remote_store_timeout_ms),
            data_upstream_url: optional("DATA_UPSTREAM_URL"),
            cache_key_prefix: optional("CACHE_KEY_PREFIX").unwrap_or(defaults.cache_key_prefix),
            cache_ttl_overrides: optional("CACHE_TTL_OVERRIDES").unwrap_or_default(),
            cache_shared_ttl_factor: parsed("CACHE_SHARED_TTL_FACTOR", defaults.cache_shared_ttl_factor),
            local_cache_max_entries: parsed("LOCAL_CACHE_MAX_ENTRIES", defaults.local_cache_max_entries),
            local_cache_sweep_interval: parsed(
                "LOCAL_CACHE_SWEEP_INTERVAL",
                defaults.local_cache_sweep_interval,
            ),
            rate_limit_prefix: optional("RATE_LIMIT_PREFIX").unwrap_or(defaults.rate_limit_prefix),
            metrics_capacity: parsed("METRICS_CAPACITY", defaults.metrics_capacity),
            metrics_cleanup_interval: parsed(
                "METRICS_CLEANUP_INTERVAL",
                defaults.metrics_cleanup_interval,
            ),
            metrics_retention: parsed("METRICS_RETENTION", defaults.metrics_retention),
            server_port: parsed("SERVER_PORT", defaults.server_port),
        }
    }

    /// Settings for the HTTP store client, when a remote URL is configured.
    pub fn http_store(&self) -> Option<HttpStoreConfig> {
        self.remote_store_url.as_ref().map(|url| HttpStoreConfig {
            url: url.clone(),
            token: self.remote_store_token.clone(),
            timeout_ms: self.remote_store_timeout_ms,
        })
    }

    pub fn tiered_cache(&self) -> TieredCacheConfig {
        TieredCacheConfig {
            key_prefix: self.cache_key_prefix.clone(),
            ttl_table: TtlTable::default().with_overrides(&self.cache_ttl_overrides),
            shared_ttl_factor: self.cache_shared_ttl_factor,
        }
    }

    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            capacity: self.metrics_capacity,
            retention: Duration::from_secs(self.metrics_retention),
            cleanup_interval: Duration::from_secs(self.metrics_cleanup_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_store_url: None,
            remote_store_token: None,
            remote_store_timeout_ms: 2000,
            data_upstream_url: None,
            cache_key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            cache_ttl_overrides: String::new(),
            cache_shared_ttl_factor: 2,
            local_cache_max_entries: DEFAULT_MAX_ENTRIES,
            local_cache_sweep_interval: 30,
            rate_limit_prefix: DEFAULT_RATE_LIMIT_PREFIX.to_string(),
            metrics_capacity: 1000,
            metrics_cleanup_interval: 60,
            metrics_retention: 3600,
            server_port: 3000,
        }
    }
}
