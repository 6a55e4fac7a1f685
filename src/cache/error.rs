use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds for cache operations.
///
/// `Miss` and `Expired` are ordinary outcomes callers are expected to branch
/// on; the rest are genuine failures.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache miss")]
  Miss,

  #[error("cache expired")]
  Expired,

  #[error("failed to decode cache entry: {0}")]
  Decode(#[source] serde_json::Error),

  #[error("failed to encode cache entry: {0}")]
  Encode(#[source] serde_json::Error),

  #[error("cache I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl CacheError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    CacheError::Io {
      path: path.into(),
      source,
    }
  }

  /// True when the entry is simply not usable (absent or stale), so the
  /// caller should fetch fresh data.
  pub fn is_miss(&self) -> bool {
    matches!(self, CacheError::Miss | CacheError::Expired)
  }
}
