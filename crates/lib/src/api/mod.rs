//! Platform facades consumed by the push pipeline.
//!
//! [`CloudController`] covers apps, bits, routes, domains, stacks and service
//! bindings. [`LogStream`] covers the app log subscription. Components hold
//! them as `Arc<dyn ...>` so tests can substitute an in-memory platform.

pub mod client;
pub mod logs;
pub mod types;

use std::path::Path;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub use client::HttpClient;
pub use logs::HttpLogStream;
pub use types::{
  App, AppParams, AppState, Domain, FileResource, InstanceSnapshot, InstanceState, LogEvent, PackageState, Route,
  ServiceInstance, Stack,
};

/// Platform error code: the service instance is already bound to this app.
pub const SERVICE_BINDING_APP_SERVICE_TAKEN: u64 = 90003;

/// Platform error code: the route is bound to another app.
pub const INVALID_RELATION: u64 = 210003;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("request to {url} failed: {source}")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("server error, status code: {status}, error code: {code}, message: {description}")]
  Http {
    status: u16,
    code: u64,
    error_code: String,
    description: String,
  },

  #[error("{kind} {name} not found")]
  NotFound { kind: &'static str, name: String },

  /// The request could not be assembled before sending.
  #[error("could not build request to {url}: {message}")]
  Request { url: String, message: String },

  #[error("invalid response from {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to read {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

impl ApiError {
  pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
    Self::NotFound {
      kind,
      name: name.into(),
    }
  }

  /// Numeric platform error code, when the server returned one.
  pub fn code(&self) -> Option<u64> {
    match self {
      Self::Http { code, .. } => Some(*code),
      _ => None,
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }
}

/// Tokens in the target file may already carry their scheme.
pub(crate) fn authorization_header(token: &str) -> String {
  if token.to_ascii_lowercase().starts_with("bearer ") {
    token.to_string()
  } else {
    format!("bearer {}", token)
  }
}

/// Stream of log events for one app. Dropping it closes the subscription.
pub type LogSubscription = BoxStream<'static, Result<LogEvent, ApiError>>;

/// Cloud controller operations used during a push.
#[async_trait]
pub trait CloudController: Send + Sync {
  /// Return the subset of `files` the platform already stores.
  async fn match_known_files(&self, files: &[FileResource]) -> Result<Vec<FileResource>, ApiError>;

  /// Upload the residual zip (if any) with the full resource manifest.
  async fn upload_bits(&self, app_guid: &str, zip: Option<&Path>, resources: &[FileResource]) -> Result<(), ApiError>;

  /// Look up an app by name in a space. A miss is [`ApiError::NotFound`].
  async fn find_app(&self, space_guid: &str, name: &str) -> Result<App, ApiError>;

  async fn get_app(&self, app_guid: &str) -> Result<App, ApiError>;

  async fn create_app(&self, params: &AppParams) -> Result<App, ApiError>;

  async fn update_app(&self, app_guid: &str, params: &AppParams) -> Result<App, ApiError>;

  async fn find_stack(&self, name: &str) -> Result<Stack, ApiError>;

  async fn private_domains(&self, org_guid: &str) -> Result<Vec<Domain>, ApiError>;

  async fn shared_domains(&self) -> Result<Vec<Domain>, ApiError>;

  /// Look up a portless route by host, domain and path. A miss is [`ApiError::NotFound`].
  async fn find_route(&self, host: &str, domain: &Domain, path: &str) -> Result<Route, ApiError>;

  /// Create a route. With `random_port` the platform assigns a port and `host` is ignored.
  async fn create_route(&self, host: &str, domain: &Domain, path: &str, random_port: bool) -> Result<Route, ApiError>;

  async fn bind_route(&self, route_guid: &str, app_guid: &str) -> Result<(), ApiError>;

  async fn unbind_route(&self, route_guid: &str, app_guid: &str) -> Result<(), ApiError>;

  async fn find_service_instance(&self, space_guid: &str, name: &str) -> Result<ServiceInstance, ApiError>;

  async fn bind_service(&self, app_guid: &str, service_instance_guid: &str) -> Result<(), ApiError>;

  async fn instances(&self, app_guid: &str) -> Result<Vec<InstanceSnapshot>, ApiError>;
}

/// Log subscription used while staging.
#[async_trait]
pub trait LogStream: Send + Sync {
  /// Resolves once the subscription is connected.
  async fn subscribe(&self, app_guid: &str) -> Result<LogSubscription, ApiError>;
}
