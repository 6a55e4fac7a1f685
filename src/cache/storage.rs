//! File-backed TTL cache.
//!
//! Each entry lives in its own JSON file named after the SHA-256 of its key,
//! so arbitrary keys (including ones containing path separators) can never
//! escape the cache directory. Expiry is checked lazily on read; expired files
//! stay on disk until `clean_expired` or `clear` removes them.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::debug;

use super::error::CacheError;
use super::traits::{CacheEntry, CacheStats};

const ENTRY_EXTENSION: &str = "json";

/// A directory of JSON cache entries sharing one TTL.
///
/// The lock only serializes access within this process; separate processes
/// sharing the directory are not coordinated.
#[derive(Debug)]
pub struct Cache {
  dir: PathBuf,
  ttl: Duration,
  lock: RwLock<()>,
}

impl Cache {
  /// Open a cache in `dir`, creating the directory if needed.
  pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, CacheError> {
    let dir = dir.into();
    fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;

    Ok(Self {
      dir,
      ttl,
      lock: RwLock::new(()),
    })
  }

  #[allow(dead_code)]
  pub fn dir(&self) -> &Path {
    &self.dir
  }

  #[allow(dead_code)]
  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  /// Path of the file backing `key`.
  pub fn entry_path(&self, key: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let name = hex::encode(hasher.finalize());
    self.dir.join(format!("{}.{}", name, ENTRY_EXTENSION))
  }

  /// Store `value` under `key`, expiring one TTL from now.
  pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
    let expires_at = chrono::Duration::from_std(self.ttl)
      .ok()
      .and_then(|ttl| Utc::now().checked_add_signed(ttl))
      .unwrap_or(DateTime::<Utc>::MAX_UTC);
    self.set_with_expiry(key, value, expires_at)
  }

  /// Store `value` under `key` with an explicit expiry.
  pub fn set_with_expiry<T: Serialize>(
    &self,
    key: &str,
    value: &T,
    expires_at: DateTime<Utc>,
  ) -> Result<(), CacheError> {
    let entry = CacheEntry {
      data: value,
      expires_at,
    };
    let bytes = serde_json::to_vec(&entry).map_err(CacheError::Encode)?;

    let path = self.entry_path(key);
    let _guard = self.write();
    write_atomic(&path, &bytes)?;
    debug!("Cached {} ({} bytes)", key, bytes.len());
    Ok(())
  }

  /// Load the value stored under `key`.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
    let path = self.entry_path(key);
    let bytes = {
      let _guard = self.read();
      match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(CacheError::Miss),
        Err(e) => return Err(CacheError::io(&path, e)),
      }
    };

    let entry: CacheEntry<serde_json::Value> =
      serde_json::from_slice(&bytes).map_err(CacheError::Decode)?;
    if !entry.is_valid_at(Utc::now()) {
      return Err(CacheError::Expired);
    }
    serde_json::from_value(entry.data).map_err(CacheError::Decode)
  }

  /// Remove the entry for `key`. Removing a missing entry succeeds.
  pub fn delete(&self, key: &str) -> Result<(), CacheError> {
    let path = self.entry_path(key);
    let _guard = self.write();
    remove_if_exists(&path)
  }

  /// Remove every entry in the cache directory.
  pub fn clear(&self) -> Result<(), CacheError> {
    let _guard = self.write();
    for path in self.entry_files()? {
      remove_if_exists(&path)?;
    }
    Ok(())
  }

  /// Scan the directory and summarize its entries.
  pub fn stats(&self) -> Result<CacheStats, CacheError> {
    let _guard = self.read();
    let now = Utc::now();
    let mut stats = CacheStats::default();

    for path in self.entry_files()? {
      let metadata = match fs::metadata(&path) {
        Ok(metadata) => metadata,
        // Removed by another process since the listing.
        Err(e) if e.kind() == ErrorKind::NotFound => continue,
        Err(e) => return Err(CacheError::io(&path, e)),
      };

      stats.total_entries += 1;
      stats.total_size_bytes += metadata.len();

      if let Ok(modified) = metadata.modified() {
        let modified = DateTime::<Utc>::from(modified);
        if stats.oldest_entry.map_or(true, |oldest| modified < oldest) {
          stats.oldest_entry = Some(modified);
        }
        if stats.newest_entry.map_or(true, |newest| modified > newest) {
          stats.newest_entry = Some(modified);
        }
      }

      match read_expiry(&path) {
        Some(expires_at) if now < expires_at => stats.valid_entries += 1,
        Some(_) => stats.expired_entries += 1,
        None => stats.unreadable_entries += 1,
      }
    }

    Ok(stats)
  }

  /// Remove expired entries, returning how many were removed.
  ///
  /// Files that cannot be parsed are left alone.
  pub fn clean_expired(&self) -> Result<usize, CacheError> {
    let _guard = self.write();
    let now = Utc::now();
    let mut removed = 0;

    for path in self.entry_files()? {
      match read_expiry(&path) {
        Some(expires_at) if now >= expires_at => {
          remove_if_exists(&path)?;
          removed += 1;
        }
        _ => {}
      }
    }

    if removed > 0 {
      debug!("Removed {} expired entries from {}", removed, self.dir.display());
    }
    Ok(removed)
  }

  fn entry_files(&self) -> Result<Vec<PathBuf>, CacheError> {
    let entries = fs::read_dir(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
      let entry = entry.map_err(|e| CacheError::io(&self.dir, e))?;
      let path = entry.path();
      let is_entry = path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION);
      if is_entry && entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
        files.push(path);
      }
    }
    Ok(files)
  }

  fn read(&self) -> RwLockReadGuard<'_, ()> {
    self.lock.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, ()> {
    self.lock.write().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Read only the expiry of an entry file, ignoring its payload type.
fn read_expiry(path: &Path) -> Option<DateTime<Utc>> {
  let bytes = fs::read(path).ok()?;
  let entry: CacheEntry<serde::de::IgnoredAny> = serde_json::from_slice(&bytes).ok()?;
  Some(entry.expires_at)
}

/// Write through a temp file and rename, so readers never see a torn entry.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
  let temp = path.with_extension(format!("{}.{}.tmp", ENTRY_EXTENSION, std::process::id()));
  fs::write(&temp, bytes).map_err(|e| CacheError::io(&temp, e))?;
  fs::rename(&temp, path).map_err(|e| {
    let _ = fs::remove_file(&temp);
    CacheError::io(path, e)
  })
}

fn remove_if_exists(path: &Path) -> Result<(), CacheError> {
  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
    Err(e) => Err(CacheError::io(path, e)),
  }
}
