//! Push parameters: raw flags, their validation, and the per-app request set.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::api::AppParams;
use crate::routes::RouteSpec;

/// A flag or manifest value that cannot be pushed.
#[derive(Debug, Error)]
pub enum ValidationError {
  #[error("Invalid instance count: {0}\nInstance count must be a positive integer")]
  InstanceCount(i64),

  #[error("Invalid memory limit: {value}\n{message}")]
  Memory { value: String, message: String },

  #[error("Invalid disk quota: {value}\n{message}")]
  DiskQuota { value: String, message: String },

  #[error("Invalid timeout param: {value}\n{message}")]
  Timeout { value: String, message: String },

  #[error("Invalid health-check-type param: {0}")]
  HealthCheckType(String),

  #[error("Error: No name found for app")]
  MissingName,

  #[error("Command line flags cannot be applied when pushing multiple apps")]
  OverridesWithMultipleApps,

  #[error("Could not find app named '{0}' in manifest")]
  AppNotInManifest(String),
}

/// Per-app settings that flags and manifest entries both provide.
///
/// Merging prefers the overriding side's values; boolean switches are
/// combined with `||`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppSettings {
  /// Megabytes.
  pub memory: Option<u64>,
  /// Megabytes.
  pub disk_quota: Option<u64>,
  pub instances: Option<u32>,
  pub buildpack: Option<String>,
  pub command: Option<String>,
  pub stack: Option<String>,
  pub docker_image: Option<String>,
  pub health_check_type: Option<String>,
  /// Seconds. Also bounds the startup wait for this app.
  pub health_check_timeout: Option<u64>,
  pub env: Option<BTreeMap<String, serde_json::Value>>,
  pub services: Vec<String>,
  pub hosts: Vec<String>,
  pub domains: Vec<String>,
  pub route_path: Option<String>,
  pub no_route: bool,
  pub no_hostname: bool,
  pub random_route: bool,
  pub no_start: bool,
}

impl AppSettings {
  pub fn merge(self, overrides: AppSettings) -> AppSettings {
    fn list(base: Vec<String>, over: Vec<String>) -> Vec<String> {
      if over.is_empty() { base } else { over }
    }

    AppSettings {
      memory: overrides.memory.or(self.memory),
      disk_quota: overrides.disk_quota.or(self.disk_quota),
      instances: overrides.instances.or(self.instances),
      buildpack: overrides.buildpack.or(self.buildpack),
      command: overrides.command.or(self.command),
      stack: overrides.stack.or(self.stack),
      docker_image: overrides.docker_image.or(self.docker_image),
      health_check_type: overrides.health_check_type.or(self.health_check_type),
      health_check_timeout: overrides.health_check_timeout.or(self.health_check_timeout),
      env: overrides.env.or(self.env),
      services: list(self.services, overrides.services),
      hosts: list(self.hosts, overrides.hosts),
      domains: list(self.domains, overrides.domains),
      route_path: overrides.route_path.or(self.route_path),
      no_route: self.no_route || overrides.no_route,
      no_hostname: self.no_hostname || overrides.no_hostname,
      random_route: self.random_route || overrides.random_route,
      no_start: self.no_start || overrides.no_start,
    }
  }

  pub fn is_empty(&self) -> bool {
    *self == AppSettings::default()
  }
}

/// One app as described by a manifest entry or by the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialApp {
  pub name: Option<String>,
  pub path: Option<PathBuf>,
  pub settings: AppSettings,
}

/// The merged, validated description of one app to push.
#[derive(Debug, Clone, PartialEq)]
pub struct AppDeploymentRequest {
  pub name: String,
  /// Directory or zip archive holding the app bits.
  pub path: PathBuf,
  pub settings: AppSettings,
}

impl AppDeploymentRequest {
  pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      path: path.into(),
      settings: AppSettings::default(),
    }
  }

  /// Whether any host, domain or hostname switch was given.
  pub fn route_defined(&self) -> bool {
    !self.settings.domains.is_empty() || !self.settings.hosts.is_empty() || self.settings.no_hostname
  }

  /// One [`RouteSpec`] per requested host on each requested domain.
  ///
  /// Missing hosts or domains become a single `None` entry, so an app with no
  /// route flags yields a single entry for the default domain.
  pub fn route_specs(&self) -> Vec<RouteSpec> {
    let s = &self.settings;
    let domains: Vec<Option<String>> = if s.domains.is_empty() {
      vec![None]
    } else {
      s.domains.iter().cloned().map(Some).collect()
    };
    let hosts: Vec<Option<String>> = if s.hosts.is_empty() {
      vec![None]
    } else {
      s.hosts.iter().cloned().map(Some).collect()
    };

    domains
      .iter()
      .flat_map(|domain| {
        hosts.iter().map(move |host| RouteSpec {
          host: host.clone(),
          domain: domain.clone(),
          path: s.route_path.clone(),
          use_random_port: false,
        })
      })
      .collect()
  }

  pub fn startup_timeout(&self) -> Option<Duration> {
    self.settings.health_check_timeout.map(Duration::from_secs)
  }

  /// Create/update body for this request. The stack guid is resolved separately.
  pub fn app_params(&self) -> AppParams {
    let s = &self.settings;
    AppParams {
      name: Some(self.name.clone()),
      memory: s.memory,
      disk_quota: s.disk_quota,
      instances: s.instances,
      buildpack: s.buildpack.clone(),
      docker_image: s.docker_image.clone(),
      diego: s.docker_image.as_ref().map(|_| true),
      command: s.command.clone(),
      health_check_type: s.health_check_type.clone(),
      health_check_timeout: s.health_check_timeout,
      environment_json: s.env.clone(),
      ..AppParams::default()
    }
  }
}

/// Push flags as given on the command line, before validation.
#[derive(Debug, Clone, Default)]
pub struct PushFlags {
  pub name: Option<String>,
  pub path: Option<PathBuf>,
  pub buildpack: Option<String>,
  pub command: Option<String>,
  pub domain: Option<String>,
  pub hostname: Option<String>,
  pub instances: Option<i64>,
  pub disk_quota: Option<String>,
  pub memory: Option<String>,
  pub stack: Option<String>,
  pub docker_image: Option<String>,
  pub timeout: Option<String>,
  pub health_check_type: Option<String>,
  pub route_path: Option<String>,
  pub no_route: bool,
  pub no_hostname: bool,
  pub random_route: bool,
  pub no_start: bool,
}

impl PushFlags {
  /// Validate flag values. Runs before any request is made.
  pub fn parse(self) -> Result<PartialApp, ValidationError> {
    let instances = match self.instances {
      Some(n) if n < 1 || n > i64::from(u32::MAX) => return Err(ValidationError::InstanceCount(n)),
      Some(n) => Some(n as u32),
      None => None,
    };

    let memory = match self.memory {
      Some(value) => Some(to_megabytes(&value).map_err(|message| ValidationError::Memory { value, message })?),
      None => None,
    };

    let disk_quota = match self.disk_quota {
      Some(value) => Some(to_megabytes(&value).map_err(|message| ValidationError::DiskQuota { value, message })?),
      None => None,
    };

    let health_check_timeout = match self.timeout {
      Some(value) => Some(value.trim().parse::<u64>().map_err(|e| ValidationError::Timeout {
        message: e.to_string(),
        value,
      })?),
      None => None,
    };

    if let Some(kind) = &self.health_check_type {
      if kind != "port" && kind != "none" {
        return Err(ValidationError::HealthCheckType(kind.clone()));
      }
    }

    Ok(PartialApp {
      name: self.name,
      path: self.path,
      settings: AppSettings {
        memory,
        disk_quota,
        instances,
        buildpack: self.buildpack.map(reset_default),
        command: self.command.map(reset_default),
        stack: self.stack,
        docker_image: self.docker_image,
        health_check_type: self.health_check_type,
        health_check_timeout,
        env: None,
        services: Vec::new(),
        hosts: self.hostname.into_iter().collect(),
        domains: self.domain.into_iter().collect(),
        route_path: self.route_path,
        no_route: self.no_route,
        no_hostname: self.no_hostname,
        random_route: self.random_route,
        no_start: self.no_start,
      },
    })
  }
}

/// `null` and `default` ask the platform to fall back to its own choice.
fn reset_default(value: String) -> String {
  if value == "null" || value == "default" {
    String::new()
  } else {
    value
  }
}

/// Parse `256M`, `1G`, `1024MB` or a bare number of megabytes.
pub fn to_megabytes(value: &str) -> Result<u64, String> {
  let upper = value.trim().to_ascii_uppercase();
  let digits_end = upper.find(|c: char| !c.is_ascii_digit()).unwrap_or(upper.len());
  let (number, unit) = upper.split_at(digits_end);

  let number: u64 = number
    .parse()
    .map_err(|_| "Byte quantity must be a positive integer with a unit of measurement like M, MB, G, or GB".to_string())?;

  match unit {
    "" | "M" | "MB" => Ok(number),
    "G" | "GB" => Ok(number * 1024),
    _ => Err("Byte quantity must be a positive integer with a unit of measurement like M, MB, G, or GB".to_string()),
  }
}

/// Build the list of apps to push from the command line and manifest entries.
///
/// With no manifest the command line must name the app. A single manifest
/// entry has the command line merged over it. With several entries the
/// command line may only select one of them by name. Apps without a path use
/// `cwd`.
pub fn app_set(
  context: PartialApp,
  manifest: Vec<PartialApp>,
  cwd: &Path,
) -> Result<Vec<AppDeploymentRequest>, ValidationError> {
  let selected: Vec<PartialApp> = match manifest.len() {
    0 => vec![context],
    1 => {
      let mut app = manifest.into_iter().next().unwrap_or_default();
      app.name = context.name.or(app.name);
      app.path = context.path.or(app.path);
      app.settings = app.settings.merge(context.settings);
      vec![app]
    }
    _ => {
      if !context.settings.is_empty() || context.path.is_some() {
        return Err(ValidationError::OverridesWithMultipleApps);
      }
      match context.name {
        Some(name) => {
          let found: Vec<PartialApp> = manifest
            .into_iter()
            .filter(|app| app.name.as_deref() == Some(name.as_str()))
            .collect();
          if found.is_empty() {
            return Err(ValidationError::AppNotInManifest(name));
          }
          found
        }
        None => manifest,
      }
    }
  };

  selected
    .into_iter()
    .map(|app| {
      let name = app.name.filter(|n| !n.is_empty()).ok_or(ValidationError::MissingName)?;
      Ok(AppDeploymentRequest {
        name,
        path: app.path.unwrap_or_else(|| cwd.to_path_buf()),
        settings: app.settings,
      })
    })
    .collect()
}
