//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Local cache sweep: drops expired local entries
//! - Metrics cleanup: drops performance entries past retention
//! - Store cleanup: drops expired keys from the embedded store

mod cleanup;

pub use cleanup::{spawn_local_cache_sweep, spawn_metrics_cleanup, spawn_store_cleanup};
