//! The three caches the client uses, grouped so they can be passed around
//! explicitly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::error::CacheError;
use super::storage::Cache;
use super::traits::CacheStats;

/// Per-cache time-to-live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
  /// Workspace, space, folder and list structure
  pub workspace: Duration,
  /// Workspace member directory
  pub user: Duration,
  /// Task lists
  pub task: Duration,
}

impl Default for CacheTtls {
  fn default() -> Self {
    Self {
      workspace: Duration::from_secs(60 * 60),
      user: Duration::from_secs(60 * 60),
      task: Duration::from_secs(5 * 60),
    }
  }
}

/// Workspace, user and task caches, each in its own subdirectory of `root`.
///
/// Caches are shared so a consumer such as the user lookup can hold on to
/// one without borrowing the whole set.
#[derive(Debug)]
pub struct CacheSet {
  root: PathBuf,
  pub workspaces: Arc<Cache>,
  pub users: Arc<Cache>,
  pub tasks: Arc<Cache>,
}

impl CacheSet {
  pub fn new(root: impl Into<PathBuf>, ttls: CacheTtls) -> Result<Self, CacheError> {
    let root = root.into();
    Ok(Self {
      workspaces: Arc::new(Cache::new(root.join("workspaces"), ttls.workspace)?),
      users: Arc::new(Cache::new(root.join("users"), ttls.user)?),
      tasks: Arc::new(Cache::new(root.join("tasks"), ttls.task)?),
      root,
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Caches with display names, in a stable order.
  pub fn named(&self) -> [(&'static str, &Cache); 3] {
    [
      ("workspaces", &*self.workspaces),
      ("users", &*self.users),
      ("tasks", &*self.tasks),
    ]
  }

  pub fn stats(&self) -> Result<Vec<(&'static str, CacheStats)>, CacheError> {
    self
      .named()
      .into_iter()
      .map(|(name, cache)| Ok::<_, CacheError>((name, cache.stats()?)))
      .collect()
  }

  /// Remove expired entries from every cache, returning the total removed.
  pub fn clean_expired(&self) -> Result<usize, CacheError> {
    self
      .named()
      .iter()
      .try_fold(0, |total, (_, cache)| {
        Ok::<_, CacheError>(total + cache.clean_expired()?)
      })
  }

  pub fn clear(&self) -> Result<(), CacheError> {
    for (_, cache) in self.named() {
      cache.clear()?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_default_ttls() {
    let ttls = CacheTtls::default();
    assert_eq!(ttls.workspace, Duration::from_secs(3600));
    assert_eq!(ttls.user, Duration::from_secs(3600));
    assert_eq!(ttls.task, Duration::from_secs(300));
  }

  #[test]
  fn test_caches_are_isolated() {
    let dir = TempDir::new().unwrap();
    let set = CacheSet::new(dir.path(), CacheTtls::default()).unwrap();
    assert_eq!(set.tasks.ttl(), Duration::from_secs(300));

    set.workspaces.set("k", &"structure").unwrap();
    set.tasks.set("k", &"tasks").unwrap();
    set.tasks.clear().unwrap();

    assert_eq!(set.workspaces.get::<String>("k").unwrap(), "structure");
    assert!(set.tasks.get::<String>("k").unwrap_err().is_miss());
  }

  #[test]
  fn test_clean_and_clear_all() {
    let dir = TempDir::new().unwrap();
    let ttls = CacheTtls {
      task: Duration::ZERO,
      ..CacheTtls::default()
    };
    let set = CacheSet::new(dir.path(), ttls).unwrap();

    set.users.set("users_1", &vec!["alice"]).unwrap();
    set.tasks.set("tasks_1", &vec!["stale"]).unwrap();

    assert_eq!(set.clean_expired().unwrap(), 1);

    let stats = set.stats().unwrap();
    let names: Vec<_> = stats.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["workspaces", "users", "tasks"]);
    assert_eq!(stats[1].1.valid_entries, 1);
    assert_eq!(stats[2].1.total_entries, 0);

    set.clear().unwrap();
    assert!(set.stats().unwrap().iter().all(|(_, s)| s.total_entries == 0));
  }
}
