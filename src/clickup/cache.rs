//! Cache keys for ClickUp API calls.

use crate::cache::{Cache, CacheSet};

/// Queries whose results are cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryKey {
  /// Workspaces visible to the token
  Workspaces,
  /// Spaces in a workspace
  Spaces { workspace_id: String },
  /// Folders in a space
  Folders { space_id: String },
  /// Lists in a folder
  Lists { folder_id: String },
  /// Open tasks in a list
  Tasks { list_id: String },
  /// Members of a workspace
  Users { workspace_id: String },
}

impl QueryKey {
  /// Key passed to [`Cache`]. The cache hashes it into a filename.
  pub fn cache_key(&self) -> String {
    match self {
      Self::Workspaces => "workspaces".to_string(),
      Self::Spaces { workspace_id } => format!("spaces_{}", workspace_id),
      Self::Folders { space_id } => format!("folders_{}", space_id),
      Self::Lists { folder_id } => format!("lists_{}", folder_id),
      Self::Tasks { list_id } => format!("tasks_{}", list_id),
      Self::Users { workspace_id } => format!("users_{}", workspace_id),
    }
  }

  /// Human-readable description for logs.
  pub fn description(&self) -> String {
    match self {
      Self::Workspaces => "workspaces".to_string(),
      Self::Spaces { workspace_id } => format!("spaces in workspace {}", workspace_id),
      Self::Folders { space_id } => format!("folders in space {}", space_id),
      Self::Lists { folder_id } => format!("lists in folder {}", folder_id),
      Self::Tasks { list_id } => format!("tasks in list {}", list_id),
      Self::Users { workspace_id } => format!("members of workspace {}", workspace_id),
    }
  }

  /// The cache in `set` this query belongs to.
  pub fn cache<'a>(&self, set: &'a CacheSet) -> &'a Cache {
    match self {
      Self::Workspaces | Self::Spaces { .. } | Self::Folders { .. } | Self::Lists { .. } => {
        &*set.workspaces
      }
      Self::Tasks { .. } => &*set.tasks,
      Self::Users { .. } => &*set.users,
    }
  }
}
