use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheTtls;

pub const DEFAULT_API_URL: &str = "https://api.clickup.com/api/v2";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub rate_limit: RateLimitConfig,
  pub cache: CacheConfig,
  /// Write logs here instead of stderr
  pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub url: String,
  /// Workspace used when `--workspace` is not given
  pub default_workspace: Option<String>,
  /// Per-request timeout
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: DEFAULT_API_URL.to_string(),
      default_workspace: None,
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
  /// Requests allowed per window
  pub requests: u32,
  /// Window length
  pub per_secs: u64,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    // ClickUp allows 100 requests per minute per token on the free plan
    Self {
      requests: 100,
      per_secs: 60,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  /// Cache root (default: $XDG_CACHE_HOME/cu)
  pub dir: Option<PathBuf>,
  pub workspace_ttl_secs: u64,
  pub user_ttl_secs: u64,
  pub task_ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let ttls = CacheTtls::default();
    Self {
      enabled: true,
      dir: None,
      workspace_ttl_secs: ttls.workspace.as_secs(),
      user_ttl_secs: ttls.user.as_secs(),
      task_ttl_secs: ttls.task.as_secs(),
    }
  }
}

impl CacheConfig {
  pub fn ttls(&self) -> CacheTtls {
    CacheTtls {
      workspace: Duration::from_secs(self.workspace_ttl_secs),
      user: Duration::from_secs(self.user_ttl_secs),
      task: Duration::from_secs(self.task_ttl_secs),
    }
  }

  pub fn dir(&self) -> Result<PathBuf> {
    match &self.dir {
      Some(dir) => Ok(dir.clone()),
      None => dirs::cache_dir()
        .map(|dir| dir.join("cu"))
        .ok_or_else(|| {
          eyre!("Could not determine a cache directory. Set cache.dir in the config file.")
        }),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./cu.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/cu/config.yaml
  ///
  /// Without any file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("cu.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("cu").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes as null rather than an empty mapping
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  fn validate(&self) -> Result<()> {
    if self.rate_limit.requests == 0 || self.rate_limit.per_secs == 0 {
      return Err(eyre!("rate_limit.requests and rate_limit.per_secs must both be positive"));
    }
    if self.api.timeout_secs == 0 {
      return Err(eyre!("api.timeout_secs must be positive"));
    }
    Ok(())
  }

  /// Get the ClickUp API token from environment variables.
  ///
  /// Checks CU_API_TOKEN first, then CLICKUP_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    api_token_from(|name| std::env::var(name).ok())
  }
}

fn api_token_from(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
  ["CU_API_TOKEN", "CLICKUP_API_TOKEN"]
    .into_iter()
    .filter_map(|name| lookup(name))
    .find(|token| !token.trim().is_empty())
    .ok_or_else(|| {
      eyre!(
        "ClickUp API token not found. \
         Set CU_API_TOKEN or CLICKUP_API_TOKEN environment variable."
      )
    })
}
