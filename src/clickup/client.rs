use futures::future::BoxFuture;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Request};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::{
  ApiCommentCreated, ApiErrorBody, ApiFoldersResponse, ApiListsResponse, ApiSpacesResponse,
  ApiTask, ApiTasksResponse, ApiTeamsResponse,
};
use super::error::ApiError;
use super::types::{
  Comment, Folder, NewComment, NewTask, Space, Task, TaskList, TaskUpdate, User, Workspace,
};
use super::users::MemberSource;
use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::network::{RateLimiter, RetryTransport, Transport};

/// Safety stop for task pagination.
const MAX_TASK_PAGES: u32 = 100;

/// ClickUp API client.
///
/// Every request waits on the shared rate limiter, then goes through the
/// retrying transport.
pub struct ClickUpClient<T = reqwest::Client> {
  transport: Arc<RetryTransport<T>>,
  limiter: Arc<RateLimiter>,
  base_url: String,
  token: HeaderValue,
  cancel: CancellationToken,
}

impl<T> Clone for ClickUpClient<T> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      limiter: Arc::clone(&self.limiter),
      base_url: self.base_url.clone(),
      token: self.token.clone(),
      cancel: self.cancel.clone(),
    }
  }
}

impl ClickUpClient {
  pub fn new(config: &Config, token: &str, cancel: CancellationToken) -> color_eyre::Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .user_agent(concat!("cu/", env!("CARGO_PKG_VERSION")))
      .build()?;

    let limiter = RateLimiter::new(
      config.rate_limit.requests,
      Duration::from_secs(config.rate_limit.per_secs),
    );

    Ok(Self::with_transport(
      http,
      &config.api.url,
      token,
      Arc::new(limiter),
      cancel,
    )?)
  }
}

impl<T: Transport> ClickUpClient<T> {
  pub fn with_transport(
    transport: T,
    base_url: &str,
    token: &str,
    limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
  ) -> Result<Self, ApiError> {
    // Validate once so per-request joins only fail on bad path segments.
    Url::parse(base_url)?;
    let mut token = HeaderValue::from_str(token.trim()).map_err(|_| ApiError::InvalidToken)?;
    token.set_sensitive(true);

    Ok(Self {
      transport: Arc::new(RetryTransport::new(transport)),
      limiter,
      base_url: base_url.trim_end_matches('/').to_string(),
      token,
      cancel,
    })
  }

  fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
    let mut url = Url::parse(&format!("{}/{}", self.base_url, path.trim_start_matches('/')))?;
    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
  }

  async fn execute<R: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    query: &[(&str, &str)],
    body: Option<Vec<u8>>,
  ) -> Result<R, ApiError> {
    self.limiter.wait(&self.cancel).await.map_err(ApiError::RateLimit)?;

    let url = self.endpoint(path, query)?;
    debug!("{} {}", method, url);

    let mut request = Request::new(method, url);
    let headers = request.headers_mut();
    headers.insert(AUTHORIZATION, self.token.clone());
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if body.is_some() {
      headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    *request.body_mut() = body.map(reqwest::Body::from);

    let response = self.transport.send(request, &self.cancel).await?;
    let status = response.status();
    let bytes = response.bytes().await.map_err(ApiError::Body)?;

    if !status.is_success() {
      let message = serde_json::from_slice::<ApiErrorBody>(&bytes)
        .ok()
        .and_then(|body| match (body.err, body.ecode) {
          (Some(err), Some(code)) => Some(format!("{} ({})", err, code)),
          (Some(err), None) => Some(err),
          _ => None,
        })
        .unwrap_or_else(|| {
          status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
        });
      return Err(ApiError::Status {
        status: status.as_u16(),
        message,
      });
    }

    Ok(serde_json::from_slice(&bytes)?)
  }

  async fn get<R: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, &str)],
  ) -> Result<R, ApiError> {
    self.execute(Method::GET, path, query, None).await
  }

  async fn send_json<B: Serialize, R: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    body: &B,
  ) -> Result<R, ApiError> {
    let body = serde_json::to_vec(body)?;
    self.execute(method, path, &[], Some(body)).await
  }

  /// Workspaces the token has access to
  pub async fn workspaces(&self) -> Result<Vec<Workspace>, ApiError> {
    let response: ApiTeamsResponse = self.get("team", &[]).await?;
    Ok(response.teams.iter().map(|team| team.to_workspace()).collect())
  }

  /// Members of a workspace
  pub async fn workspace_members(&self, workspace_id: &str) -> Result<Vec<User>, ApiError> {
    let response: ApiTeamsResponse = self.get("team", &[]).await?;
    response
      .teams
      .into_iter()
      .find(|team| team.id == workspace_id)
      .map(|team| team.into_users())
      .ok_or_else(|| ApiError::WorkspaceNotFound(workspace_id.to_string()))
  }

  pub async fn spaces(&self, workspace_id: &str) -> Result<Vec<Space>, ApiError> {
    let path = format!("team/{}/space", workspace_id);
    let response: ApiSpacesResponse = self.get(&path, &[("archived", "false")]).await?;
    Ok(response.spaces.into_iter().map(Space::from).collect())
  }

  pub async fn folders(&self, space_id: &str) -> Result<Vec<Folder>, ApiError> {
    let path = format!("space/{}/folder", space_id);
    let response: ApiFoldersResponse = self.get(&path, &[("archived", "false")]).await?;
    Ok(response.folders.into_iter().map(Folder::from).collect())
  }

  pub async fn lists(&self, folder_id: &str) -> Result<Vec<TaskList>, ApiError> {
    let path = format!("folder/{}/list", folder_id);
    let response: ApiListsResponse = self.get(&path, &[("archived", "false")]).await?;
    Ok(response.lists.into_iter().map(TaskList::from).collect())
  }

  /// All open tasks in a list, following pagination
  pub async fn tasks(&self, list_id: &str) -> Result<Vec<Task>, ApiError> {
    let path = format!("list/{}/task", list_id);
    let mut all_tasks = Vec::new();

    for page in 0..MAX_TASK_PAGES {
      let page = page.to_string();
      let response: ApiTasksResponse = self.get(&path, &[("page", page.as_str())]).await?;

      let done = response.tasks.is_empty() || response.last_page.unwrap_or(false);
      all_tasks.extend(response.tasks.into_iter().map(Task::from));
      if done {
        break;
      }
    }

    Ok(all_tasks)
  }

  pub async fn create_task(&self, list_id: &str, task: &NewTask) -> Result<Task, ApiError> {
    let path = format!("list/{}/task", list_id);
    let created: ApiTask = self.send_json(Method::POST, &path, task).await?;
    Ok(created.into())
  }

  pub async fn update_task(&self, task_id: &str, update: &TaskUpdate) -> Result<Task, ApiError> {
    let path = format!("task/{}", task_id);
    let updated: ApiTask = self.send_json(Method::PUT, &path, update).await?;
    Ok(updated.into())
  }

  pub async fn add_comment(
    &self,
    task_id: &str,
    comment: &NewComment,
  ) -> Result<Comment, ApiError> {
    let path = format!("task/{}/comment", task_id);
    let created: ApiCommentCreated = self.send_json(Method::POST, &path, comment).await?;
    Ok(created.into())
  }
}

impl<T: Transport> MemberSource for ClickUpClient<T> {
  fn workspace_members<'a>(
    &'a self,
    workspace_id: &'a str,
  ) -> BoxFuture<'a, Result<Vec<User>, ApiError>> {
    Box::pin(ClickUpClient::workspace_members(self, workspace_id))
  }
}
