mod cache;
mod cancel;
mod clickup;
mod commands;
mod config;
mod network;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::cache::CacheSet;
use crate::cancel::CancellationToken;
use crate::clickup::{CachedClient, ClickUpClient};
use crate::commands::{CommentAddArgs, Context, TaskCreateArgs, TaskUpdateArgs};
use crate::config::Config;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "cu")]
#[command(about = "A command-line client for ClickUp")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/cu/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Workspace ID (overrides api.default_workspace)
  #[arg(short, long, global = true)]
  workspace: Option<String>,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
  output: OutputFormat,

  /// Bypass the on-disk cache
  #[arg(long, global = true)]
  no_cache: bool,

  /// Write logs to this file instead of stderr
  #[arg(long, global = true)]
  log_file: Option<PathBuf>,

  /// Increase log verbosity (-v, -vv, -vvv)
  #[arg(short, long, global = true, action = clap::ArgAction::Count)]
  verbose: u8,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// List workspaces
  Workspaces,
  /// List spaces in the workspace
  Spaces,
  /// List folders in a space
  Folders {
    #[arg(long)]
    space: String,
  },
  /// List lists in a folder
  Lists {
    #[arg(long)]
    folder: String,
  },
  /// List open tasks in a list
  Tasks {
    #[arg(long)]
    list: String,
  },
  /// List workspace members
  Users,
  /// Create or update tasks
  #[command(subcommand)]
  Task(TaskCommand),
  /// Comment on tasks
  #[command(subcommand)]
  Comment(CommentCommand),
  /// Inspect or clear the on-disk cache
  #[command(subcommand)]
  Cache(CacheCommand),
  /// Resolve usernames to user IDs
  Resolve {
    #[arg(required = true)]
    names: Vec<String>,
  },
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
  Create(TaskCreateArgs),
  Update(TaskUpdateArgs),
}

#[derive(Subcommand, Debug)]
enum CommentCommand {
  Add(CommentAddArgs),
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
  /// Show entry counts and sizes
  Stats,
  /// Remove expired entries
  Clean,
  /// Remove every entry
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let log_file = args.log_file.clone().or_else(|| config.log_file.clone());
  let _log_guard = init_tracing(args.verbose, log_file.as_deref())?;

  let cancel = CancellationToken::new();
  {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        info!("Interrupted, cancelling");
        cancel.cancel();
      }
    });
  }

  let output = tokio::select! {
    result = run(args, config, cancel.clone()) => result?,
    reason = cancel.done() => return Err(eyre!("Interrupted: {}", reason)),
  };
  print!("{}", output);

  Ok(())
}

async fn run(args: Args, config: Config, cancel: CancellationToken) -> Result<String> {
  let Args {
    command,
    workspace,
    output,
    no_cache,
    ..
  } = args;
  // Cache maintenance works without a token, so the client is built on demand
  let ctx = || build_context(&config, workspace.clone(), output, no_cache, cancel.clone());

  match command {
    Commands::Workspaces => ctx()?.workspaces().await,
    Commands::Spaces => ctx()?.spaces().await,
    Commands::Folders { space } => ctx()?.folders(&space).await,
    Commands::Lists { folder } => ctx()?.lists(&folder).await,
    Commands::Tasks { list } => ctx()?.tasks(&list).await,
    Commands::Users => ctx()?.users().await,
    Commands::Task(TaskCommand::Create(task)) => ctx()?.create_task(task).await,
    Commands::Task(TaskCommand::Update(task)) => ctx()?.update_task(task).await,
    Commands::Comment(CommentCommand::Add(comment)) => ctx()?.add_comment(comment).await,
    Commands::Resolve { names } => ctx()?.resolve(&names).await,
    Commands::Cache(command) => {
      let caches = CacheSet::new(config.cache.dir()?, config.cache.ttls())?;
      match command {
        CacheCommand::Stats => commands::cache_stats(&caches, output),
        CacheCommand::Clean => commands::cache_clean(&caches),
        CacheCommand::Clear => commands::cache_clear(&caches),
      }
    }
  }
}

fn build_context(
  config: &Config,
  workspace: Option<String>,
  output: OutputFormat,
  no_cache: bool,
  cancel: CancellationToken,
) -> Result<Context> {
  let token = Config::get_api_token()?;
  let client = ClickUpClient::new(config, &token, cancel)?;

  let caches = if config.cache.enabled && !no_cache {
    let dir = config.cache.dir()?;
    debug!("Using cache at {}", dir.display());
    Some(Arc::new(CacheSet::new(dir, config.cache.ttls())?))
  } else {
    None
  };

  Ok(Context {
    client: CachedClient::new(client, caches),
    workspace: workspace.or_else(|| config.api.default_workspace.clone()),
    output,
  })
}

/// Set up logging to stderr, or to `log_file` when given.
///
/// `RUST_LOG` takes precedence over the `-v` count.
fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let level = match verbose {
    0 => "warn",
    1 => "cu=info,warn",
    2 => "cu=debug,info",
    _ => "cu=trace,debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
  let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

  match log_file {
    Some(path) => {
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
      let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
      let appender = tracing_appender::rolling::never(dir, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      subscriber.with_ansi(false).with_writer(writer).init();
      Ok(Some(guard))
    }
    None => {
      subscriber.with_writer(std::io::stderr).init();
      Ok(None)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn test_cli_definition() {
    Args::command().debug_assert();
  }

  #[test]
  fn test_global_flags_after_subcommand() {
    let args = Args::try_parse_from([
      "cu", "tasks", "--list", "55", "--no-cache", "-o", "json", "-vv",
    ])
    .unwrap();
    assert!(args.no_cache);
    assert_eq!(args.output, OutputFormat::Json);
    assert_eq!(args.verbose, 2);
    assert!(matches!(args.command, Commands::Tasks { list } if list == "55"));
  }

  #[test]
  fn test_task_create_args() {
    let args = Args::try_parse_from([
      "cu", "task", "create", "--list", "55", "--name", "Ship", "-a", "alice,bob", "--assignee",
      "42", "--priority", "2",
    ])
    .unwrap();
    let Commands::Task(TaskCommand::Create(task)) = args.command else {
      panic!("expected task create");
    };
    assert_eq!(task.assignees, vec!["alice,bob", "42"]);
    assert_eq!(task.priority, Some(2));

    let out_of_range = ["cu", "task", "create", "--list", "1", "--name", "x", "--priority", "9"];
    assert!(Args::try_parse_from(out_of_range).is_err());
  }

  #[test]
  fn test_resolve_requires_names() {
    assert!(Args::try_parse_from(["cu", "resolve"]).is_err());
  }
}
