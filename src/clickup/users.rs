//! Username to user ID resolution.
//!
//! Members are loaded once per workspace, from the user cache when it holds
//! a valid entry and from the API otherwise, and kept in memory for the rest
//! of the process.

use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

use super::cache::QueryKey;
use super::error::ApiError;
use super::types::User;
use crate::cache::{fetch_cached, Cache, CacheSource};

/// Anything that can list the members of a workspace.
pub trait MemberSource: Send + Sync {
  fn workspace_members<'a>(
    &'a self,
    workspace_id: &'a str,
  ) -> BoxFuture<'a, Result<Vec<User>, ApiError>>;
}

impl<S: MemberSource + ?Sized> MemberSource for Arc<S> {
  fn workspace_members<'a>(
    &'a self,
    workspace_id: &'a str,
  ) -> BoxFuture<'a, Result<Vec<User>, ApiError>> {
    (**self).workspace_members(workspace_id)
  }
}

#[derive(Debug, Error)]
pub enum LookupError {
  #[error("user not found: {0}")]
  NotFound(String),

  #[error(transparent)]
  Api(#[from] ApiError),
}

#[derive(Debug, Default)]
struct UserMaps {
  /// Keyed by lowercased username
  by_username: HashMap<String, User>,
  by_id: HashMap<i64, User>,
  /// Workspaces whose members are already in the maps
  loaded: HashSet<String>,
}

impl UserMaps {
  /// Every `by_username` entry stays equal to the `by_id` entry for its ID.
  fn insert(&mut self, user: User) {
    let key = user.username.to_lowercase();

    if let Some(previous) = self.by_id.get(&user.id) {
      let old_key = previous.username.to_lowercase();
      let owns_old_key = self.by_username.get(&old_key).map(|u| u.id) == Some(user.id);
      if old_key != key && owns_old_key {
        self.by_username.remove(&old_key);
      }
    }

    if let Some(other) = self.by_username.get(&key) {
      if other.id != user.id {
        warn!(
          "Usernames {} ({}) and {} ({}) differ only by case, {} now resolves to {}",
          other.username, other.id, user.username, user.id, key, user.id
        );
      }
    }

    self.by_username.insert(key, user.clone());
    self.by_id.insert(user.id, user);
  }
}

/// In-memory user directory backed by an optional [`Cache`].
pub struct UserLookup<S> {
  source: S,
  cache: Option<Arc<Cache>>,
  maps: RwLock<UserMaps>,
}

impl<S: MemberSource> UserLookup<S> {
  pub fn new(source: S, cache: Option<Arc<Cache>>) -> Self {
    Self {
      source,
      cache,
      maps: RwLock::default(),
    }
  }

  /// Load the members of `workspace_id` into the in-memory maps.
  ///
  /// Loading a workspace again is a no-op. Otherwise a valid
  /// `users_<workspace>` cache entry avoids the API call, and fresh member
  /// lists are written back to the cache best-effort.
  pub async fn load_workspace_users(&self, workspace_id: &str) -> Result<(), LookupError> {
    let loaded = self.read().loaded.contains(workspace_id);
    if loaded {
      debug!("Users for workspace {} already loaded", workspace_id);
      return Ok(());
    }

    let key = QueryKey::Users {
      workspace_id: workspace_id.to_string(),
    }
    .cache_key();

    let result = fetch_cached(self.cache.as_deref(), &key, || {
      self.source.workspace_members(workspace_id)
    })
    .await?;

    let count = result.data.len();
    if result.source == CacheSource::Cache {
      debug!("Loaded {} users for workspace {} from cache", count, workspace_id);
    } else {
      debug!("Fetched {} users for workspace {}", count, workspace_id);
    }

    let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
    for user in result.data {
      maps.insert(user);
    }
    maps.loaded.insert(workspace_id.to_string());
    Ok(())
  }

  /// Case-insensitive exact match on username.
  pub fn lookup_by_username(&self, username: &str) -> Result<User, LookupError> {
    self
      .read()
      .by_username
      .get(&username.to_lowercase())
      .cloned()
      .ok_or_else(|| LookupError::NotFound(username.to_string()))
  }

  pub fn lookup_by_id(&self, id: i64) -> Result<User, LookupError> {
    self
      .read()
      .by_id
      .get(&id)
      .cloned()
      .ok_or_else(|| LookupError::NotFound(id.to_string()))
  }

  /// Resolve a batch of usernames or numeric IDs.
  ///
  /// Numeric entries are taken as-is without checking they exist. The first
  /// name that cannot be resolved fails the whole batch.
  pub fn convert_usernames_to_ids<I, N>(&self, names: I) -> Result<Vec<i64>, LookupError>
  where
    I: IntoIterator<Item = N>,
    N: AsRef<str>,
  {
    names
      .into_iter()
      .map(|name| {
        let name = name.as_ref().trim();
        match name.parse::<i64>() {
          Ok(id) => Ok(id),
          Err(_) => self.lookup_by_username(name).map(|user| user.id),
        }
      })
      .collect()
  }

  /// Every loaded user, in no particular order.
  pub fn all_users(&self) -> Vec<User> {
    self.read().by_id.values().cloned().collect()
  }

  fn read(&self) -> std::sync::RwLockReadGuard<'_, UserMaps> {
    self.maps.read().unwrap_or_else(PoisonError::into_inner)
  }
}
