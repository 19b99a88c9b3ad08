//! Platform entities exchanged with the cloud controller.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::hash::ContentHash;

/// Run state requested for an application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppState {
  #[default]
  Stopped,
  Started,
}

/// Server-side lifecycle of uploaded bits.
///
/// Only ever moves `Pending -> Staging -> {Staged, Failed}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PackageState {
  #[default]
  Pending,
  Staging,
  Staged,
  Failed,
}

impl PackageState {
  /// Whether staging has finished, successfully or not.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Staged | Self::Failed)
  }
}

impl fmt::Display for PackageState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Pending => "PENDING",
      Self::Staging => "STAGING",
      Self::Staged => "STAGED",
      Self::Failed => "FAILED",
    };
    f.write_str(s)
  }
}

/// An application as known to the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct App {
  pub guid: String,
  pub name: String,
  #[serde(default)]
  pub space_guid: String,
  #[serde(default)]
  pub state: AppState,
  #[serde(default)]
  pub package_state: PackageState,
  #[serde(default)]
  pub staging_failed_reason: Option<String>,
  #[serde(default)]
  pub instances: u32,
  #[serde(default)]
  pub running_instances: u32,
  #[serde(default)]
  pub command: Option<String>,
  #[serde(default)]
  pub detected_start_command: Option<String>,
  #[serde(default)]
  pub environment_json: BTreeMap<String, serde_json::Value>,
  #[serde(default)]
  pub routes: Vec<Route>,
}

impl App {
  /// Whether `route` is already bound to this app.
  pub fn has_route(&self, route: &Route) -> bool {
    self.routes.iter().any(|r| r.guid == route.guid)
  }
}

/// Create/update request body. Unset fields are left untouched by the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppParams {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub space_guid: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub memory: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub disk_quota: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub instances: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub buildpack: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub docker_image: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub diego: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub command: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stack_guid: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub health_check_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub health_check_timeout: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub environment_json: Option<BTreeMap<String, serde_json::Value>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub state: Option<AppState>,
}

impl AppParams {
  /// A request that only changes the run state.
  pub fn state(state: AppState) -> Self {
    Self {
      state: Some(state),
      ..Self::default()
    }
  }
}

/// A routing domain. TCP domains carry a router group of type `tcp`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
  pub guid: String,
  pub name: String,
  #[serde(default)]
  pub router_group_type: Option<String>,
  #[serde(default)]
  pub shared: bool,
}

impl Domain {
  pub fn is_tcp(&self) -> bool {
    self.router_group_type.as_deref() == Some("tcp")
  }

  /// Render the URL a route with these parts would have on this domain.
  pub fn url_for(&self, host: &str, path: &str, port: Option<u16>) -> String {
    let mut url = if host.is_empty() {
      self.name.clone()
    } else {
      format!("{}.{}", host, self.name)
    };
    if let Some(port) = port.filter(|p| *p > 0) {
      url.push_str(&format!(":{}", port));
    }
    if !path.is_empty() {
      if !path.starts_with('/') {
        url.push('/');
      }
      url.push_str(path);
    }
    url
  }
}

/// A route entity. Natural key is `(host, domain, path)` or `(domain, port)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
  pub guid: String,
  #[serde(default)]
  pub host: String,
  pub domain: Domain,
  #[serde(default)]
  pub path: String,
  #[serde(default)]
  pub port: Option<u16>,
  #[serde(default)]
  pub app_guids: Vec<String>,
}

impl Route {
  pub fn url(&self) -> String {
    self.domain.url_for(&self.host, &self.path, self.port)
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.url())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
  pub guid: String,
  pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
  pub guid: String,
  pub name: String,
}

/// One entry of a resource manifest.
///
/// Used unmodified for the resource-match query and, with `mode` filled in,
/// as the list of already-known files accompanying an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResource {
  #[serde(rename = "fn")]
  pub path: String,
  pub sha: ContentHash,
  pub size: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mode: Option<String>,
}

impl FileResource {
  /// Same path, content hash and size.
  pub fn same_file(&self, other: &FileResource) -> bool {
    self.path == other.path && self.sha == other.sha && self.size == other.size
  }
}

/// State of one app instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceState {
  Running,
  Starting,
  Flapping,
  Crashed,
  Down,
  #[serde(other)]
  Unknown,
}

/// Point-in-time view of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
  pub index: u32,
  pub state: InstanceState,
  #[serde(default)]
  pub details: Option<String>,
}

/// One line from the app log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
  pub source_type: String,
  pub message: String,
}
