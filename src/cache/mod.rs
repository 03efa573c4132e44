//! Cache Module
//!
//! Process-local TTL cache and the tiered data cache built on top of it.

mod entry;
mod key;
mod local;
mod stats;
mod tiered;


// Re-export public types
pub use entry::CacheEntry;
pub use key::{build_key, CacheParams, DataKind, ParamValue, TtlClass, TtlTable};
pub use local::{LocalCache, DEFAULT_MAX_ENTRIES};
pub use stats::CacheStats;
pub use tiered::{TieredCacheConfig, TieredDataCache, DEFAULT_KEY_PREFIX};
