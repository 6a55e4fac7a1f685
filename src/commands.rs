//! Subcommand handlers.
//!
//! Each handler returns the rendered output so `main` decides where it goes.

use clap::Args;
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;

use crate::cache::{CacheSet, CacheStats};
use crate::clickup::{
  AssigneeChanges, CachedClient, ClickUpClient, NewComment, NewTask, TaskUpdate, UserLookup,
};
use crate::network::Transport;
use crate::output::{self, OutputFormat, Tabular};

/// Everything a command needs to talk to the API.
pub struct Context<T = reqwest::Client> {
  pub client: CachedClient<T>,
  /// Workspace from `--workspace` or the config default
  pub workspace: Option<String>,
  pub output: OutputFormat,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskCreateArgs {
  /// List to create the task in
  #[arg(long)]
  pub list: String,

  /// Task name
  #[arg(long)]
  pub name: String,

  #[arg(long)]
  pub description: Option<String>,

  /// Assignees as usernames or user IDs (repeatable, comma-separated)
  #[arg(short, long = "assignee")]
  pub assignees: Vec<String>,

  #[arg(long)]
  pub status: Option<String>,

  /// 1 (urgent) to 4 (low)
  #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
  pub priority: Option<u8>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskUpdateArgs {
  /// Task to update
  pub task: String,

  #[arg(long)]
  pub name: Option<String>,

  #[arg(long)]
  pub description: Option<String>,

  #[arg(long)]
  pub status: Option<String>,

  /// 1 (urgent) to 4 (low)
  #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
  pub priority: Option<u8>,

  /// Assignees to add, as usernames or user IDs
  #[arg(long = "add-assignee")]
  pub add_assignees: Vec<String>,

  /// Assignees to remove, as usernames or user IDs
  #[arg(long = "remove-assignee")]
  pub remove_assignees: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CommentAddArgs {
  /// Task to comment on
  pub task: String,

  /// Comment text
  pub text: String,

  /// Assign the comment to a user (username or ID)
  #[arg(long)]
  pub assignee: Option<String>,

  /// Notify everyone watching the task
  #[arg(long)]
  pub notify_all: bool,
}

/// Split repeated, comma-separated name arguments into single names.
pub fn split_names(values: &[String]) -> Vec<String> {
  values
    .iter()
    .flat_map(|value| value.split(','))
    .map(str::trim)
    .filter(|name| !name.is_empty())
    .map(String::from)
    .collect()
}

impl<T: Transport> Context<T> {
  fn workspace_id(&self) -> Result<&str> {
    self.workspace.as_deref().ok_or_else(|| {
      eyre!(
        "No workspace selected. \
         Pass --workspace or set api.default_workspace in the config file."
      )
    })
  }

  /// Resolve usernames or IDs, loading the member directory only when a
  /// name is not already numeric.
  async fn resolve_ids(
    &self,
    lookup: &UserLookup<ClickUpClient<T>>,
    names: &[String],
  ) -> Result<Vec<i64>> {
    if names.iter().any(|name| name.parse::<i64>().is_err()) {
      lookup.load_workspace_users(self.workspace_id()?).await?;
    }
    Ok(lookup.convert_usernames_to_ids(names)?)
  }

  pub async fn workspaces(&self) -> Result<String> {
    output::render(&self.client.workspaces().await?, self.output)
  }

  pub async fn spaces(&self) -> Result<String> {
    let spaces = self.client.spaces(self.workspace_id()?).await?;
    output::render(&spaces, self.output)
  }

  pub async fn folders(&self, space_id: &str) -> Result<String> {
    output::render(&self.client.folders(space_id).await?, self.output)
  }

  pub async fn lists(&self, folder_id: &str) -> Result<String> {
    output::render(&self.client.lists(folder_id).await?, self.output)
  }

  pub async fn tasks(&self, list_id: &str) -> Result<String> {
    output::render(&self.client.tasks(list_id).await?, self.output)
  }

  pub async fn users(&self) -> Result<String> {
    let lookup = self.client.user_lookup();
    lookup.load_workspace_users(self.workspace_id()?).await?;
    let mut users = lookup.all_users();
    users.sort_by_key(|user| user.username.to_lowercase());
    output::render(&users, self.output)
  }

  pub async fn create_task(&self, args: TaskCreateArgs) -> Result<String> {
    let lookup = self.client.user_lookup();
    let assignees = self.resolve_ids(&lookup, &split_names(&args.assignees)).await?;

    let task = NewTask {
      name: args.name,
      description: args.description,
      assignees,
      status: args.status,
      priority: args.priority,
    };
    let created = self.client.create_task(&args.list, &task).await?;
    output::render(&[created], self.output)
  }

  pub async fn update_task(&self, args: TaskUpdateArgs) -> Result<String> {
    let lookup = self.client.user_lookup();
    let add = self.resolve_ids(&lookup, &split_names(&args.add_assignees)).await?;
    let rem = self.resolve_ids(&lookup, &split_names(&args.remove_assignees)).await?;

    let update = TaskUpdate {
      name: args.name,
      description: args.description,
      status: args.status,
      priority: args.priority,
      assignees: AssigneeChanges { add, rem },
    };
    let updated = self.client.update_task(&args.task, &update).await?;
    output::render(&[updated], self.output)
  }

  pub async fn add_comment(&self, args: CommentAddArgs) -> Result<String> {
    let assignee = match &args.assignee {
      Some(name) => {
        let lookup = self.client.user_lookup();
        self
          .resolve_ids(&lookup, std::slice::from_ref(name))
          .await?
          .into_iter()
          .next()
      }
      None => None,
    };

    let comment = NewComment {
      comment_text: args.text,
      assignee,
      notify_all: args.notify_all,
    };
    let created = self.client.add_comment(&args.task, &comment).await?;
    Ok(match self.output {
      OutputFormat::Table => format!("Added comment {} to task {}\n", created.id, args.task),
      OutputFormat::Json => serde_json::to_string_pretty(&created)? + "\n",
      OutputFormat::Yaml => serde_yaml::to_string(&created)?,
    })
  }

  pub async fn resolve(&self, names: &[String]) -> Result<String> {
    let names = split_names(names);
    let lookup = self.client.user_lookup();
    let ids = self.resolve_ids(&lookup, &names).await?;

    let resolved: Vec<Resolved> = names
      .into_iter()
      .zip(ids)
      .map(|(input, id)| Resolved {
        username: lookup.lookup_by_id(id).ok().map(|user| user.username),
        input,
        id,
      })
      .collect();
    output::render(&resolved, self.output)
  }
}

#[derive(Debug, Serialize)]
struct Resolved {
  input: String,
  id: i64,
  /// Unknown for numeric inputs that are not workspace members
  username: Option<String>,
}

impl Tabular for Resolved {
  fn headers() -> &'static [&'static str] {
    &["input", "id", "username"]
  }

  fn row(&self) -> Vec<String> {
    vec![
      self.input.clone(),
      self.id.to_string(),
      self.username.clone().unwrap_or_else(|| "-".to_string()),
    ]
  }
}

// ============================================================================
// Cache maintenance
// ============================================================================

#[derive(Debug, Serialize)]
struct CacheStatsRow {
  cache: &'static str,
  #[serde(flatten)]
  stats: CacheStats,
}

impl Tabular for CacheStatsRow {
  fn headers() -> &'static [&'static str] {
    &["cache", "entries", "valid", "expired", "unreadable", "bytes", "newest"]
  }

  fn row(&self) -> Vec<String> {
    vec![
      self.cache.to_string(),
      self.stats.total_entries.to_string(),
      self.stats.valid_entries.to_string(),
      self.stats.expired_entries.to_string(),
      self.stats.unreadable_entries.to_string(),
      self.stats.total_size_bytes.to_string(),
      self
        .stats
        .newest_entry
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string()),
    ]
  }
}

pub fn cache_stats(caches: &CacheSet, format: OutputFormat) -> Result<String> {
  let rows: Vec<CacheStatsRow> = caches
    .stats()?
    .into_iter()
    .map(|(cache, stats)| CacheStatsRow { cache, stats })
    .collect();
  output::render(&rows, format)
}

pub fn cache_clean(caches: &CacheSet) -> Result<String> {
  let removed = caches.clean_expired()?;
  Ok(format!("Removed {} expired entries from {}\n", removed, caches.root().display()))
}

pub fn cache_clear(caches: &CacheSet) -> Result<String> {
  caches.clear()?;
  Ok(format!("Cleared {}\n", caches.root().display()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheTtls;
  use crate::clickup::testing::{fake_client, teams, FakeApi, BASE_URL};
  use serde_json::json;
  use std::sync::Arc;
  use tempfile::TempDir;

  fn context(api: &Arc<FakeApi>, workspace: Option<&str>) -> Context<Arc<FakeApi>> {
    Context {
      client: CachedClient::new(fake_client(api), None),
      workspace: workspace.map(String::from),
      output: OutputFormat::Json,
    }
  }

  #[test]
  fn test_split_names() {
    let values = vec!["alice, bob".to_string(), "".to_string(), "100,".to_string()];
    assert_eq!(split_names(&values), vec!["alice", "bob", "100"]);
  }

  #[tokio::test]
  async fn test_create_task_resolves_assignees() {
    let api = FakeApi::with(vec![
      (200, teams()),
      (200, json!({"id": "t1", "name": "Ship", "list": {"id": "55"}})),
    ]);
    let ctx = context(&api, Some("1"));

    let out = ctx
      .create_task(TaskCreateArgs {
        list: "55".into(),
        name: "Ship".into(),
        assignees: vec!["alice,BOB".into(), "300".into()],
        ..Default::default()
      })
      .await
      .unwrap();
    assert!(out.contains("\"id\": \"t1\""));

    let seen = api.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(
      seen[1].body,
      Some(json!({"name": "Ship", "assignees": [100, 200, 300]}))
    );
  }

  #[tokio::test]
  async fn test_numeric_assignees_skip_member_lookup() {
    let api = FakeApi::with(vec![(200, json!({"id": "t1", "name": "Ship"}))]);
    let ctx = context(&api, None);

    ctx
      .update_task(TaskUpdateArgs {
        task: "t1".into(),
        add_assignees: vec!["42".into()],
        ..Default::default()
      })
      .await
      .unwrap();

    let seen = api.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].body, Some(json!({"assignees": {"add": [42], "rem": []}})));
  }

  #[tokio::test]
  async fn test_update_loads_members_once() {
    let api = FakeApi::with(vec![
      (200, teams()),
      (200, json!({"id": "t1", "name": "Ship", "list": {"id": "55"}})),
    ]);
    let ctx = context(&api, Some("1"));

    ctx
      .update_task(TaskUpdateArgs {
        task: "t1".into(),
        add_assignees: vec!["alice".into()],
        remove_assignees: vec!["bob".into()],
        ..Default::default()
      })
      .await
      .unwrap();

    assert_eq!(
      api.urls(),
      vec![format!("{}/team", BASE_URL), format!("{}/task/t1", BASE_URL)]
    );
    assert_eq!(
      api.seen()[1].body,
      Some(json!({"assignees": {"add": [100], "rem": [200]}}))
    );
  }

  #[tokio::test]
  async fn test_users_table() {
    let api = FakeApi::with(vec![(200, teams())]);
    let mut ctx = context(&api, Some("1"));
    ctx.output = OutputFormat::Table;

    let out = ctx.users().await.unwrap();
    assert_eq!(
      out,
      "ID   USERNAME  EMAIL\n\
       100  Alice     -\n\
       200  Bob       -\n"
    );
  }

  #[tokio::test]
  async fn test_unknown_assignee_aborts_before_create() {
    let api = FakeApi::with(vec![(200, teams())]);
    let ctx = context(&api, Some("1"));

    let err = ctx
      .create_task(TaskCreateArgs {
        list: "55".into(),
        name: "Ship".into(),
        assignees: vec!["alice".into(), "mallory".into()],
        ..Default::default()
      })
      .await
      .unwrap_err();
    assert!(err.to_string().contains("mallory"));
    assert_eq!(api.seen().len(), 1);
  }

  #[tokio::test]
  async fn test_names_need_a_workspace() {
    let api = FakeApi::with(vec![]);
    let ctx = context(&api, None);

    let err = ctx.resolve(&["alice".to_string()]).await.unwrap_err();
    assert!(err.to_string().contains("No workspace selected"));
    assert!(ctx.spaces().await.is_err());
  }

  #[tokio::test]
  async fn test_resolve_output() {
    let api = FakeApi::with(vec![(200, teams())]);
    let mut ctx = context(&api, Some("1"));
    ctx.output = OutputFormat::Table;

    let out = ctx.resolve(&["ALICE,999".to_string()]).await.unwrap();
    assert_eq!(
      out,
      "INPUT  ID   USERNAME\n\
       ALICE  100  Alice\n\
       999    999  -\n"
    );
  }

  #[tokio::test]
  async fn test_comment_assignee() {
    let api = FakeApi::with(vec![(200, teams()), (200, json!({"id": 458}))]);
    let mut ctx = context(&api, Some("1"));
    ctx.output = OutputFormat::Table;

    let out = ctx
      .add_comment(CommentAddArgs {
        task: "t1".into(),
        text: "Please review".into(),
        assignee: Some("bob".into()),
        notify_all: true,
      })
      .await
      .unwrap();
    assert_eq!(out, "Added comment 458 to task t1\n");
    assert_eq!(
      api.seen()[1].body,
      Some(json!({"comment_text": "Please review", "assignee": 200, "notify_all": true}))
    );
  }

  #[test]
  fn test_cache_maintenance() {
    let dir = TempDir::new().unwrap();
    let caches = CacheSet::new(
      dir.path(),
      CacheTtls {
        task: std::time::Duration::ZERO,
        ..CacheTtls::default()
      },
    )
    .unwrap();
    caches.tasks.set("tasks_1", &"stale").unwrap();
    caches.users.set("users_1", &"fresh").unwrap();

    let stats: serde_json::Value =
      serde_json::from_str(&cache_stats(&caches, OutputFormat::Json).unwrap()).unwrap();
    assert_eq!(stats[1]["cache"], "users");
    assert_eq!(stats[1]["valid_entries"], 1);
    assert_eq!(stats[2]["expired_entries"], 1);

    assert!(cache_clean(&caches).unwrap().starts_with("Removed 1 expired"));
    cache_clear(&caches).unwrap();
    assert_eq!(caches.users.stats().unwrap().total_entries, 0);
  }
}
