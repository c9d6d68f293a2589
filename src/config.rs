use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default history window requested when the caller does not pick one.
pub const DEFAULT_HISTORY_HOURS: u32 = 24;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub http: HttpConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Root the `/api/...` paths are resolved against
  #[serde(default = "default_base_url")]
  pub base_url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
    }
  }
}

fn default_base_url() -> String {
  "http://localhost:7071".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfig {
  /// Whole-request timeout. Unset means requests may wait indefinitely.
  pub timeout_secs: Option<u64>,
}

impl HttpConfig {
  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_secs.map(Duration::from_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub status_ttl_ms: u64,
  pub enhanced_ttl_ms: u64,
  pub history_ttl_ms: u64,
  /// Maximum number of distinct history windows kept; 0 disables the cap
  pub history_max_entries: usize,
  pub default_history_hours: u32,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      status_ttl_ms: 30_000,
      enhanced_ttl_ms: 30_000,
      history_ttl_ms: 45_000,
      history_max_entries: 32,
      default_history_hours: DEFAULT_HISTORY_HOURS,
    }
  }
}

impl CacheConfig {
  pub fn status_ttl(&self) -> Duration {
    Duration::from_millis(self.status_ttl_ms)
  }

  pub fn enhanced_ttl(&self) -> Duration {
    Duration::from_millis(self.enhanced_ttl_ms)
  }

  pub fn history_ttl(&self) -> Duration {
    Duration::from_millis(self.history_ttl_ms)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./ventdash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ventdash/config.yaml
  ///
  /// Falls back to defaults when no file is found.
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("ventdash.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("ventdash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Get the API token from the environment, if one is set.
  ///
  /// Checks VENTDASH_API_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("VENTDASH_API_TOKEN")
      .ok()
      .filter(|token| !token.is_empty())
  }
}
