//! Top-level push failures.
//!
//! Each variant is fatal for the push. User-facing variants carry their
//! remediation tip in the `Display` text so the host command only has to
//! print the error.

use thiserror::Error;

use crate::api::ApiError;
use crate::bits::BitsError;
use crate::config::ConfigError;
use crate::consts::CLI_NAME;
use crate::deploy::ValidationError;

/// Why staging ended in `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingFailureKind {
  /// No buildpack accepted the uploaded bits.
  NoAppDetected,
  Other,
}

#[derive(Debug, Error)]
pub enum PushError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("{0}")]
  NotFound(String),

  #[error(
    "The route {url} is already in use.\nTIP: Change the hostname with -n HOSTNAME or use --random-route to generate a new route and then push again."
  )]
  RouteInUse { url: String },

  #[error("failed to unbind {} route(s) from {app}: {}", .failures.len(), render_unbind_failures(.failures))]
  UnbindFailed {
    app: String,
    failures: Vec<(String, ApiError)>,
  },

  #[error("Could not bind to service {service}\nError: {source}")]
  ServiceBindFailed {
    service: String,
    #[source]
    source: ApiError,
  },

  #[error("Error processing app files: {0}")]
  Bits(#[from] BitsError),

  #[error("Error uploading application.\n{0}")]
  Upload(#[source] ApiError),

  #[error("{}", staging_failed_message(.app, .reason, .kind))]
  StagingFailed {
    app: String,
    reason: String,
    kind: StagingFailureKind,
  },

  #[error("{app} failed to stage within {minutes} minutes")]
  StagingTimeout { app: String, minutes: f64 },

  #[error("Start unsuccessful\n\nTIP: use '{} logs {app} --recent' for more information", CLI_NAME)]
  StartupFailed { app: String },

  #[error(
    "Start app timeout\n\nTIP: Application must be listening on the right port. Instead of hard coding the port, use the $PORT environment variable.\n\nUse '{} logs {app} --recent' for more information",
    CLI_NAME
  )]
  StartupTimeout { app: String },

  #[error(transparent)]
  Api(#[from] ApiError),
}

fn render_unbind_failures(failures: &[(String, ApiError)]) -> String {
  failures
    .iter()
    .map(|(url, err)| format!("{}: {}", url, err))
    .collect::<Vec<_>>()
    .join("; ")
}

fn staging_failed_message(app: &str, reason: &str, kind: &StagingFailureKind) -> String {
  match kind {
    StagingFailureKind::NoAppDetected => format!(
      "{reason}\n\nTIP: Buildpacks are detected when the \"{cli} push\" is executed from within the directory that contains the app source code.\n\nUse '{cli} buildpacks' to see a list of supported buildpacks.\n\nUse '{cli} logs {app} --recent' for more in depth log information.",
      cli = CLI_NAME,
    ),
    StagingFailureKind::Other => {
      format!("{reason}\n\nTIP: use '{cli} logs {app} --recent' for more information", cli = CLI_NAME)
    }
  }
}
