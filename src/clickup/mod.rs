//! ClickUp API client.
//!
//! - `ClickUpClient` issues rate-limited, retried requests
//! - `CachedClient` layers the on-disk caches over the read operations
//! - `UserLookup` resolves usernames to member IDs

mod api_types;
mod cache;
mod cached_client;
mod client;
mod error;
mod types;
mod users;

#[cfg(test)]
pub(crate) mod testing;

pub use cached_client::CachedClient;
pub use client::ClickUpClient;
pub use types::{
  AssigneeChanges, Folder, NewComment, NewTask, Space, Task, TaskList, TaskUpdate, User, Workspace,
};
pub use users::UserLookup;
