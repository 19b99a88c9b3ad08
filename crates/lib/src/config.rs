//! Push configuration.
//!
//! [`PushConfig`] is built once at startup and handed to every component
//! constructor. It combines the persisted target (API endpoint, token, org and
//! space) with timeout overrides from the environment. Invalid overrides are
//! rejected here, before the pipeline issues a single request.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::{
  DEFAULT_LOG_CONNECT_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_STAGING_TIMEOUT, DEFAULT_STARTUP_TIMEOUT,
  STAGING_TIMEOUT_ENV, STARTUP_TIMEOUT_ENV, TARGET_FILENAME,
};
use crate::platform::paths::config_dir;

/// Errors that can occur while assembling the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// A timeout override was not an integer number of minutes.
  #[error("invalid value for env var {var}\n{message}")]
  InvalidEnv { var: &'static str, message: String },

  /// No config directory could be determined (no HOME or CF_HOME).
  #[error("could not determine the config directory; set CF_HOME")]
  NoConfigDir,

  /// The target file is missing.
  #[error("no target found at {0}; log in and target an org and space first")]
  TargetNotFound(PathBuf),

  /// The target file could not be read.
  #[error("failed to read target file {path}: {source}")]
  ReadTarget {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The target file is not valid JSON.
  #[error("failed to parse target file {path}: {source}")]
  ParseTarget {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// A platform entity referenced by both guid and display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EntityRef {
  pub guid: String,
  pub name: String,
}

/// On-disk representation of the current target.
#[derive(Debug, Deserialize)]
struct TargetFile {
  api_endpoint: String,
  #[serde(default)]
  logging_endpoint: Option<String>,
  access_token: String,
  #[serde(default)]
  username: String,
  organization: EntityRef,
  space: EntityRef,
  #[serde(default)]
  skip_ssl_validation: bool,
}

/// Immutable configuration shared by every pipeline component.
#[derive(Debug, Clone)]
pub struct PushConfig {
  pub api_endpoint: String,
  pub logging_endpoint: String,
  pub access_token: String,
  pub username: String,
  pub org: EntityRef,
  pub space: EntityRef,
  pub skip_ssl_validation: bool,

  /// Upper bound on waiting for the package to reach a terminal state.
  pub staging_timeout: Duration,
  /// Upper bound on waiting for the first running instance.
  pub startup_timeout: Duration,
  /// Delay between consecutive state polls.
  pub poll_interval: Duration,
  /// How long the log tailer may take to connect before staging proceeds without logs.
  pub log_connect_timeout: Duration,
}

impl Default for PushConfig {
  fn default() -> Self {
    Self {
      api_endpoint: String::new(),
      logging_endpoint: String::new(),
      access_token: String::new(),
      username: String::new(),
      org: EntityRef::default(),
      space: EntityRef::default(),
      skip_ssl_validation: false,
      staging_timeout: DEFAULT_STAGING_TIMEOUT,
      startup_timeout: DEFAULT_STARTUP_TIMEOUT,
      poll_interval: DEFAULT_POLL_INTERVAL,
      log_connect_timeout: DEFAULT_LOG_CONNECT_TIMEOUT,
    }
  }
}

impl PushConfig {
  /// Load the configuration from the environment and the default target file.
  ///
  /// Timeout overrides are validated first so a bad value is reported even
  /// when no target exists yet.
  pub fn load() -> Result<Self, ConfigError> {
    let timeouts = EnvTimeouts::from_env()?;
    let path = default_target_path()?;
    let config = Self::from_target_file(&path)?;
    Ok(timeouts.apply(config))
  }

  /// Read a target file without applying any environment overrides.
  pub fn from_target_file(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        ConfigError::TargetNotFound(path.to_path_buf())
      } else {
        ConfigError::ReadTarget {
          path: path.to_path_buf(),
          source: e,
        }
      }
    })?;

    let target: TargetFile = serde_json::from_str(&content).map_err(|e| ConfigError::ParseTarget {
      path: path.to_path_buf(),
      source: e,
    })?;

    debug!(path = %path.display(), api = %target.api_endpoint, "loaded target");

    let api_endpoint = target.api_endpoint.trim_end_matches('/').to_string();
    let logging_endpoint = target
      .logging_endpoint
      .map(|e| e.trim_end_matches('/').to_string())
      .unwrap_or_else(|| api_endpoint.clone());

    Ok(Self {
      api_endpoint,
      logging_endpoint,
      access_token: target.access_token,
      username: target.username,
      org: target.organization,
      space: target.space,
      skip_ssl_validation: target.skip_ssl_validation,
      ..Self::default()
    })
  }
}

/// Timeout overrides read from the environment.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnvTimeouts {
  pub staging: Option<Duration>,
  pub startup: Option<Duration>,
}

impl EnvTimeouts {
  /// Read `CF_STAGING_TIMEOUT` and `CF_STARTUP_TIMEOUT`.
  pub fn from_env() -> Result<Self, ConfigError> {
    Ok(Self {
      staging: minutes_from_env(STAGING_TIMEOUT_ENV)?,
      startup: minutes_from_env(STARTUP_TIMEOUT_ENV)?,
    })
  }

  /// Overlay the overrides on a configuration.
  pub fn apply(self, mut config: PushConfig) -> PushConfig {
    if let Some(staging) = self.staging {
      config.staging_timeout = staging;
    }
    if let Some(startup) = self.startup {
      config.startup_timeout = startup;
    }
    config
  }
}

/// Parse an integer-minutes environment variable. Unset or empty means no override.
fn minutes_from_env(var: &'static str) -> Result<Option<Duration>, ConfigError> {
  let value = match std::env::var(var) {
    Ok(v) if !v.is_empty() => v,
    _ => return Ok(None),
  };

  let minutes: u64 = value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidEnv {
    var,
    message: format!("'{}': {}", value, e),
  })?;

  let secs = minutes.checked_mul(60).ok_or_else(|| ConfigError::InvalidEnv {
    var,
    message: format!("'{}': too many minutes", value),
  })?;

  Ok(Some(Duration::from_secs(secs)))
}

/// Location of the target file for the current environment.
pub fn default_target_path() -> Result<PathBuf, ConfigError> {
  config_dir()
    .map(|dir| dir.join(TARGET_FILENAME))
    .ok_or(ConfigError::NoConfigDir)
}
