//! Serde-deserializable types matching ClickUp API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::types::{Comment, Folder, Space, Task, TaskList, User, Workspace};

/// Counts and timestamps arrive as strings, numbers or null depending on the endpoint.
fn de_opt_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Option::<Value>::deserialize(deserializer)? {
    Some(Value::Number(n)) => n.as_u64(),
    Some(Value::String(s)) => s.trim().parse().ok(),
    _ => None,
  })
}

fn millis_to_datetime(ms: Option<u64>) -> Option<DateTime<Utc>> {
  ms.and_then(|ms| i64::try_from(ms).ok())
    .and_then(DateTime::from_timestamp_millis)
}

fn value_to_id(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

// ============================================================================
// Error body
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub err: Option<String>,
  #[serde(rename = "ECODE")]
  pub ecode: Option<String>,
}

// ============================================================================
// Workspaces and members
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub id: i64,
  pub username: Option<String>,
  pub email: Option<String>,
  pub initials: Option<String>,
}

impl ApiUser {
  /// Members without a username (pending invites) cannot be resolved by name.
  pub fn into_user(self) -> Option<User> {
    let username = self.username.filter(|name| !name.trim().is_empty())?;
    Some(User {
      id: self.id,
      username,
      email: self.email,
      initials: self.initials,
    })
  }

  fn display_name(&self) -> String {
    self
      .username
      .clone()
      .or_else(|| self.email.clone())
      .unwrap_or_else(|| self.id.to_string())
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiMember {
  pub user: ApiUser,
}

#[derive(Debug, Deserialize)]
pub struct ApiTeam {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub members: Vec<ApiMember>,
}

impl ApiTeam {
  pub fn to_workspace(&self) -> Workspace {
    Workspace {
      id: self.id.clone(),
      name: self.name.clone(),
      member_count: self.members.len(),
    }
  }

  pub fn into_users(self) -> Vec<User> {
    self
      .members
      .into_iter()
      .filter_map(|member| member.user.into_user())
      .collect()
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiTeamsResponse {
  #[serde(default)]
  pub teams: Vec<ApiTeam>,
}

// ============================================================================
// Hierarchy: spaces, folders, lists
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiSpace {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub private: bool,
}

impl From<ApiSpace> for Space {
  fn from(space: ApiSpace) -> Self {
    Space {
      id: space.id,
      name: space.name,
      private: space.private,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiSpacesResponse {
  #[serde(default)]
  pub spaces: Vec<ApiSpace>,
}

#[derive(Debug, Deserialize)]
pub struct ApiList {
  pub id: String,
  pub name: String,
  #[serde(default, deserialize_with = "de_opt_number")]
  pub task_count: Option<u64>,
}

impl From<ApiList> for TaskList {
  fn from(list: ApiList) -> Self {
    TaskList {
      id: list.id,
      name: list.name,
      task_count: list.task_count,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiListsResponse {
  #[serde(default)]
  pub lists: Vec<ApiList>,
}

#[derive(Debug, Deserialize)]
pub struct ApiFolder {
  pub id: String,
  pub name: String,
  #[serde(default, deserialize_with = "de_opt_number")]
  pub task_count: Option<u64>,
  #[serde(default)]
  pub lists: Vec<ApiList>,
}

impl From<ApiFolder> for Folder {
  fn from(folder: ApiFolder) -> Self {
    Folder {
      id: folder.id,
      name: folder.name,
      task_count: folder.task_count,
      list_count: folder.lists.len(),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiFoldersResponse {
  #[serde(default)]
  pub folders: Vec<ApiFolder>,
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiStatus {
  pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiPriority {
  pub priority: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiListRef {
  pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiTask {
  pub id: String,
  #[serde(default)]
  pub name: String,
  pub status: Option<ApiStatus>,
  #[serde(default)]
  pub assignees: Vec<ApiUser>,
  pub priority: Option<ApiPriority>,
  #[serde(default, deserialize_with = "de_opt_number")]
  pub due_date: Option<u64>,
  pub list: Option<ApiListRef>,
  pub url: Option<String>,
}

impl From<ApiTask> for Task {
  fn from(task: ApiTask) -> Self {
    Task {
      id: task.id,
      name: task.name,
      status: task.status.map(|s| s.status).unwrap_or_default(),
      assignees: task.assignees.iter().map(ApiUser::display_name).collect(),
      priority: task.priority.map(|p| p.priority),
      due_date: millis_to_datetime(task.due_date),
      list_id: task.list.map(|l| l.id),
      url: task.url,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiTasksResponse {
  #[serde(default)]
  pub tasks: Vec<ApiTask>,
  /// Absent on older API responses; an empty page also ends pagination.
  #[serde(default)]
  pub last_page: Option<bool>,
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiCommentCreated {
  pub id: Value,
  #[serde(default, deserialize_with = "de_opt_number")]
  pub date: Option<u64>,
}

impl From<ApiCommentCreated> for Comment {
  fn from(comment: ApiCommentCreated) -> Self {
    Comment {
      id: value_to_id(&comment.id),
      date: millis_to_datetime(comment.date),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_teams_response() {
    let response: ApiTeamsResponse = serde_json::from_value(json!({
      "teams": [{
        "id": "1234",
        "name": "Acme",
        "color": "#000000",
        "members": [
          {"user": {"id": 100, "username": "Alice", "email": "alice@acme.test", "initials": "A"}},
          {"user": {"id": 101, "username": null, "email": "invited@acme.test"}}
        ]
      }]
    }))
    .unwrap();

    let team = response.teams.into_iter().next().unwrap();
    let workspace = team.to_workspace();
    assert_eq!(workspace.id, "1234");
    assert_eq!(workspace.member_count, 2);

    let users = team.into_users();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, 100);
    assert_eq!(users[0].username, "Alice");
  }

  #[test]
  fn test_task_counts_accept_strings_and_numbers() {
    let folders: ApiFoldersResponse = serde_json::from_value(json!({
      "folders": [{
        "id": "457",
        "name": "Roadmap",
        "task_count": "12",
        "lists": [
          {"id": "1", "name": "Q1", "task_count": 5},
          {"id": "2", "name": "Q2", "task_count": null}
        ]
      }]
    }))
    .unwrap();

    let folder = folders.folders.into_iter().next().unwrap();
    assert_eq!(folder.task_count, Some(12));
    assert_eq!(folder.lists[0].task_count, Some(5));
    assert_eq!(folder.lists[1].task_count, None);
    assert_eq!(Folder::from(folder).list_count, 2);
  }

  #[test]
  fn test_task_conversion() {
    let task: ApiTask = serde_json::from_value(json!({
      "id": "9hx",
      "name": "Ship it",
      "status": {"status": "in progress", "color": "#d3d3d3"},
      "assignees": [
        {"id": 183, "username": "Bob"},
        {"id": 184, "username": null, "email": "c@x.test"}
      ],
      "priority": {"priority": "urgent"},
      "due_date": "1508369194377",
      "list": {"id": "124"},
      "url": "https://app.clickup.com/t/9hx"
    }))
    .unwrap();

    let task = Task::from(task);
    assert_eq!(task.status, "in progress");
    assert_eq!(task.assignees, vec!["Bob", "c@x.test"]);
    assert_eq!(task.priority.as_deref(), Some("urgent"));
    assert_eq!(task.due_date.unwrap().timestamp_millis(), 1508369194377);
    assert_eq!(task.list_id.as_deref(), Some("124"));
  }

  #[test]
  fn test_comment_id_may_be_numeric() {
    let created: ApiCommentCreated =
      serde_json::from_value(json!({"id": 458, "hist_id": "26508", "date": 1568036964079u64}))
        .unwrap();
    let comment = Comment::from(created);
    assert_eq!(comment.id, "458");
    assert!(comment.date.is_some());
  }
}
