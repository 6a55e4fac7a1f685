//! On-disk TTL caching.
//!
//! This module provides:
//! - A file-backed key/value cache with lazy expiry (one JSON file per key)
//! - Typed error kinds so callers can tell misses from failures
//! - A cache-first fetch helper used by the API client
//! - The three caches the client uses, grouped into a `CacheSet`

mod error;
mod layer;
mod set;
mod storage;
mod traits;

pub use layer::{fetch_cached, CacheSource};
pub use set::{CacheSet, CacheTtls};
pub use storage::Cache;
pub use traits::CacheStats;
