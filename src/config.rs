use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "wallet-client";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub base_url: String,
  /// Hard deadline for every call, in milliseconds
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Credential-refresh endpoint
  #[serde(default = "default_refresh_path")]
  pub refresh_path: String,
  /// Session cookie to seed the jar with (`name=value`), from the environment
  #[serde(skip)]
  pub session_cookie: Option<String>,
}

fn default_timeout_ms() -> u64 {
  10_000
}

fn default_refresh_path() -> String {
  "/auth/refresh".to_string()
}

impl ApiConfig {
  pub fn for_base_url(base_url: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      timeout_ms: default_timeout_ms(),
      refresh_path: default_refresh_path(),
      session_cookie: None,
    }
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms.max(1))
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
  /// Filter directive, e.g. "info" or "wallet_client=debug"
  pub level: Option<String>,
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./wallet-client.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/wallet-client/config.yaml
  ///
  /// Environment overrides are applied afterwards.
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
      None => Self::from_env_only()?,
    };

    Ok(config.with_env_overrides())
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from(format!("{}.yaml", APP_NAME));
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join(APP_NAME).join("config.yaml");
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

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.api.base_url.trim().is_empty() {
      return Err(eyre!("api.base_url must not be empty"));
    }
    Ok(config)
  }

  /// Without a file, the base URL must come from the environment.
  fn from_env_only() -> Result<Self> {
    let base_url = std::env::var("WALLET_CLIENT_BASE_URL").map_err(|_| {
      eyre!(
        "No configuration file found. Create one at ~/.config/{}/config.yaml\n\
                 or set WALLET_CLIENT_BASE_URL.",
        APP_NAME
      )
    })?;
    Ok(Self {
      api: ApiConfig::for_base_url(base_url),
      log: LogConfig::default(),
    })
  }

  fn with_env_overrides(mut self) -> Self {
    if let Ok(url) = std::env::var("WALLET_CLIENT_BASE_URL") {
      self.api.base_url = url;
    }
    self.api.session_cookie = Self::get_session_cookie();
    self
  }

  /// Get the session cookie from environment variables.
  ///
  /// Checks WALLET_CLIENT_SESSION.
  pub fn get_session_cookie() -> Option<String> {
    std::env::var("WALLET_CLIENT_SESSION")
      .ok()
      .filter(|s| !s.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_applies_defaults() {
    let config = Config::parse("api:\n  base_url: https://api.example.com\n").unwrap();
    assert_eq!(config.api.base_url, "https://api.example.com");
    assert_eq!(config.api.timeout(), Duration::from_secs(10));
    assert_eq!(config.api.refresh_path, "/auth/refresh");
    assert!(config.log.file.is_none());
  }

  #[test]
  fn test_parse_full_config() {
    let yaml = r#"
api:
  base_url: http://localhost:8080/v1
  timeout_ms: 2500
  refresh_path: /session/renew
log:
  level: wallet_client=debug
  file: /tmp/wallet-client.log
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.api.timeout(), Duration::from_millis(2500));
    assert_eq!(config.api.refresh_path, "/session/renew");
    assert_eq!(config.log.level.as_deref(), Some("wallet_client=debug"));
    assert_eq!(
      config.log.file.as_deref(),
      Some(Path::new("/tmp/wallet-client.log"))
    );
  }

  #[test]
  fn test_empty_base_url_rejected() {
    assert!(Config::parse("api:\n  base_url: \"  \"\n").is_err());
  }

  #[test]
  fn test_missing_explicit_file() {
    let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_zero_timeout_is_clamped() {
    let mut api = ApiConfig::for_base_url("http://x");
    api.timeout_ms = 0;
    assert_eq!(api.timeout(), Duration::from_millis(1));
  }
}
