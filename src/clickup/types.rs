use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workspace (called "team" by the API)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
  pub id: String,
  pub name: String,
  pub member_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
  pub id: String,
  pub name: String,
  pub private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
  pub id: String,
  pub name: String,
  pub task_count: Option<u64>,
  pub list_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
  pub id: String,
  pub name: String,
  pub task_count: Option<u64>,
}

/// Task summary for list views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
  pub id: String,
  pub name: String,
  pub status: String,
  pub assignees: Vec<String>,
  pub priority: Option<String>,
  pub due_date: Option<DateTime<Utc>>,
  pub list_id: Option<String>,
  pub url: Option<String>,
}

/// Workspace member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: i64,
  pub username: String,
  pub email: Option<String>,
  pub initials: Option<String>,
}

/// Created comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub id: String,
  pub date: Option<DateTime<Utc>>,
}

// ============================================================================
// Request bodies
// ============================================================================

/// Options for creating a task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewTask {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub assignees: Vec<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  /// 1 (urgent) to 4 (low)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub priority: Option<u8>,
}

/// Options for updating a task. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub priority: Option<u8>,
  #[serde(skip_serializing_if = "AssigneeChanges::is_empty")]
  pub assignees: AssigneeChanges,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssigneeChanges {
  pub add: Vec<i64>,
  pub rem: Vec<i64>,
}

impl AssigneeChanges {
  pub fn is_empty(&self) -> bool {
    self.add.is_empty() && self.rem.is_empty()
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
  pub comment_text: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assignee: Option<i64>,
  pub notify_all: bool,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_new_task_omits_unset_fields() {
    let task = NewTask {
      name: "Write release notes".into(),
      assignees: vec![100],
      ..Default::default()
    };
    assert_eq!(
      serde_json::to_value(&task).unwrap(),
      json!({"name": "Write release notes", "assignees": [100]})
    );
  }

  #[test]
  fn test_task_update_assignee_changes() {
    let update = TaskUpdate {
      status: Some("in progress".into()),
      assignees: AssigneeChanges {
        add: vec![1],
        rem: vec![],
      },
      ..Default::default()
    };
    assert_eq!(
      serde_json::to_value(&update).unwrap(),
      json!({"status": "in progress", "assignees": {"add": [1], "rem": []}})
    );

    let empty = serde_json::to_value(TaskUpdate::default()).unwrap();
    assert_eq!(empty, json!({}));
  }
}
