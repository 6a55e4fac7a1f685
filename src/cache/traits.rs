//! On-disk entry format and diagnostics types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached value together with its expiry.
///
/// Serialized as `{"data": ..., "expires_at": "<RFC3339>"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
  pub data: T,
  pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
  /// An entry is valid strictly before its expiry instant.
  pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
    now < self.expires_at
  }
}

/// Snapshot of a cache directory, for diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
  pub total_entries: usize,
  pub valid_entries: usize,
  pub expired_entries: usize,
  /// Entry files that could not be read or parsed
  pub unreadable_entries: usize,
  pub total_size_bytes: u64,
  /// Oldest file modification time
  pub oldest_entry: Option<DateTime<Utc>>,
  /// Newest file modification time
  pub newest_entry: Option<DateTime<Utc>>,
}
