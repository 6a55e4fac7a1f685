//! Cached ClickUp client that wraps ClickUpClient with transparent caching.

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::QueryKey;
use super::client::ClickUpClient;
use super::error::ApiError;
use super::types::{
  Comment, Folder, NewComment, NewTask, Space, Task, TaskList, TaskUpdate, Workspace,
};
use super::users::UserLookup;
use crate::cache::{fetch_cached, CacheSet, CacheSource};
use crate::network::Transport;

/// ClickUp client with transparent caching support.
///
/// Read operations go through the [`CacheSet`] when one is configured.
/// Writes always hit the API and drop the cached task list they affect.
pub struct CachedClient<T = reqwest::Client> {
  inner: ClickUpClient<T>,
  caches: Option<Arc<CacheSet>>,
}

impl<T> Clone for CachedClient<T> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      caches: self.caches.clone(),
    }
  }
}

impl<T: Transport> CachedClient<T> {
  pub fn new(inner: ClickUpClient<T>, caches: Option<Arc<CacheSet>>) -> Self {
    Self { inner, caches }
  }

  #[allow(dead_code)]
  pub fn caches(&self) -> Option<&CacheSet> {
    self.caches.as_deref()
  }

  /// A user lookup sharing this client's connection and user cache.
  pub fn user_lookup(&self) -> UserLookup<ClickUpClient<T>> {
    let cache = self.caches.as_ref().map(|set| Arc::clone(&set.users));
    UserLookup::new(self.inner.clone(), cache)
  }

  async fn cached<R, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<R, ApiError>
  where
    R: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R, ApiError>>,
  {
    let cache = self.caches.as_deref().map(|set| key.cache(set));
    let result = fetch_cached(cache, &key.cache_key(), fetcher).await?;
    if result.source == CacheSource::Cache {
      debug!("Using cached {}", key.description());
    }
    Ok(result.data)
  }

  fn invalidate(&self, key: QueryKey) {
    let Some(set) = self.caches.as_deref() else {
      return;
    };
    match key.cache(set).delete(&key.cache_key()) {
      Ok(()) => debug!("Invalidated cached {}", key.description()),
      Err(e) => warn!("Failed to invalidate cached {}: {}", key.description(), e),
    }
  }

  pub async fn workspaces(&self) -> Result<Vec<Workspace>, ApiError> {
    self
      .cached(QueryKey::Workspaces, || self.inner.workspaces())
      .await
  }

  pub async fn spaces(&self, workspace_id: &str) -> Result<Vec<Space>, ApiError> {
    let key = QueryKey::Spaces {
      workspace_id: workspace_id.to_string(),
    };
    self.cached(key, || self.inner.spaces(workspace_id)).await
  }

  pub async fn folders(&self, space_id: &str) -> Result<Vec<Folder>, ApiError> {
    let key = QueryKey::Folders {
      space_id: space_id.to_string(),
    };
    self.cached(key, || self.inner.folders(space_id)).await
  }

  pub async fn lists(&self, folder_id: &str) -> Result<Vec<TaskList>, ApiError> {
    let key = QueryKey::Lists {
      folder_id: folder_id.to_string(),
    };
    self.cached(key, || self.inner.lists(folder_id)).await
  }

  pub async fn tasks(&self, list_id: &str) -> Result<Vec<Task>, ApiError> {
    let key = QueryKey::Tasks {
      list_id: list_id.to_string(),
    };
    self.cached(key, || self.inner.tasks(list_id)).await
  }

  pub async fn create_task(&self, list_id: &str, task: &NewTask) -> Result<Task, ApiError> {
    let created = self.inner.create_task(list_id, task).await?;
    self.invalidate(QueryKey::Tasks {
      list_id: list_id.to_string(),
    });
    Ok(created)
  }

  /// Update a task. The cached list it belongs to is dropped when the API
  /// reports which list that is.
  pub async fn update_task(&self, task_id: &str, update: &TaskUpdate) -> Result<Task, ApiError> {
    let updated = self.inner.update_task(task_id, update).await?;
    if let Some(list_id) = &updated.list_id {
      self.invalidate(QueryKey::Tasks {
        list_id: list_id.clone(),
      });
    }
    Ok(updated)
  }

  pub async fn add_comment(
    &self,
    task_id: &str,
    comment: &NewComment,
  ) -> Result<Comment, ApiError> {
    self.inner.add_comment(task_id, comment).await
  }
}
