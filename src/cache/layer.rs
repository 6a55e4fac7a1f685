//! Cache-first fetching on top of [`Cache`].

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use tracing::{debug, warn};

use super::storage::Cache;

/// Where a fetched value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Valid entry read from the cache
  Cache,
}

/// Fetched data together with its source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
}

/// Fetch with a cache-first strategy.
///
/// 1. With no cache, always fetch
/// 2. A valid cache entry is returned without calling `fetcher`
/// 3. On a miss, expiry or unreadable entry, fetch from network
/// 4. Store fresh data best-effort; a failed write is logged, not returned
pub async fn fetch_cached<T, E, F, Fut>(
  cache: Option<&Cache>,
  key: &str,
  fetcher: F,
) -> Result<CacheResult<T>, E>
where
  T: Serialize + DeserializeOwned,
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<T, E>>,
{
  let Some(cache) = cache else {
    let data = fetcher().await?;
    return Ok(CacheResult {
      data,
      source: CacheSource::Network,
    });
  };

  match cache.get::<T>(key) {
    Ok(data) => {
      debug!("Cache hit for {}", key);
      return Ok(CacheResult {
        data,
        source: CacheSource::Cache,
      });
    }
    Err(e) if e.is_miss() => debug!("Cache {} for {}", e, key),
    Err(e) => warn!("Ignoring unreadable cache entry for {}: {}", key, e),
  }

  let data = fetcher().await?;
  if let Err(e) = cache.set(key, &data) {
    warn!("Failed to cache {}: {}", key, e);
  }

  Ok(CacheResult {
    data,
    source: CacheSource::Network,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;
  use tempfile::TempDir;

  #[tokio::test]
  async fn test_miss_fetches_and_stores() {
    let dir = TempDir::new().unwrap();
    let cache = Cache::new(dir.path(), Duration::from_secs(60)).unwrap();
    let calls = AtomicUsize::new(0);
    let calls = &calls;

    let fetch = || async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok::<_, String>(vec![1, 2, 3])
    };

    let first = fetch_cached(Some(&cache), "lists_9", fetch).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(first.data, vec![1, 2, 3]);

    let second = fetch_cached(Some(&cache), "lists_9", fetch).await.unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data, vec![1, 2, 3]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_expired_entry_refetched() {
    let dir = TempDir::new().unwrap();
    let cache = Cache::new(dir.path(), Duration::ZERO).unwrap();
    cache.set("k", &"old").unwrap();

    let result = fetch_cached(Some(&cache), "k", || async {
      Ok::<_, String>("new".to_string())
    })
    .await
    .unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data, "new");
  }

  #[tokio::test]
  async fn test_fetch_error_propagates() {
    let dir = TempDir::new().unwrap();
    let cache = Cache::new(dir.path(), Duration::from_secs(60)).unwrap();

    let err = fetch_cached::<Vec<u8>, _, _, _>(Some(&cache), "k", || async {
      Err("offline".to_string())
    })
    .await
    .unwrap_err();
    assert_eq!(err, "offline");
    assert!(cache.get::<Vec<u8>>("k").is_err());
  }

  #[tokio::test]
  async fn test_without_cache_always_fetches() {
    let result = fetch_cached(None, "k", || async { Ok::<_, String>(7) })
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data, 7);
  }
}
