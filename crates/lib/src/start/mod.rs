//! Starting and stopping apps.
//!
//! Starting runs in two phases. [`staging`] tails staging logs while it polls
//! the package state, and [`startup`] then polls instances until one runs.

pub mod staging;
pub mod startup;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::api::{App, AppParams, AppState, CloudController, LogStream};
use crate::config::PushConfig;
use crate::error::PushError;
use crate::ui::Ui;

pub use staging::{StagingOutcome, StagingWatcher};
pub use startup::{InstanceCount, StartupWatcher};

pub struct AppStarter {
  cc: Arc<dyn CloudController>,
  logs: Arc<dyn LogStream>,
  ui: Arc<dyn Ui>,
  config: Arc<PushConfig>,
}

impl AppStarter {
  pub fn new(
    cc: Arc<dyn CloudController>,
    logs: Arc<dyn LogStream>,
    ui: Arc<dyn Ui>,
    config: Arc<PushConfig>,
  ) -> Self {
    Self { cc, logs, ui, config }
  }

  /// Start `app` and wait until it has staged and one instance is running.
  ///
  /// `startup_timeout` overrides the configured startup timeout for this app.
  pub async fn start(&self, app: &App, startup_timeout: Option<Duration>) -> Result<App, PushError> {
    if app.state == AppState::Started {
      self.ui.warn(&format!("App {} is already started", app.name));
      return Ok(app.clone());
    }

    let staging = StagingWatcher::new(self.cc.clone(), self.logs.clone(), self.ui.clone(), &self.config);
    let staged = staging
      .watch(app, |app| async move {
        self.ui.say(&format!(
          "Starting app {} in org {} / space {} as {}...",
          app.name, self.config.org.name, self.config.space.name, self.config.username
        ));
        self
          .cc
          .update_app(&app.guid, &AppParams::state(AppState::Started))
          .await
          .map_err(PushError::from)
      })
      .await?;

    let timeout = startup_timeout.unwrap_or(self.config.startup_timeout);
    debug!(app = %app.name, timeout_secs = timeout.as_secs(), "waiting for a running instance");
    StartupWatcher::new(self.cc.clone(), self.ui.clone(), &self.config)
      .wait_for_one_running_instance(&staged, timeout)
      .await?;

    self.ui.say("");
    self.ui.say("App started");
    self.ui.say("");
    self.ui.ok();

    // The detected command is only known once the app has started.
    let started = self.cc.get_app(&app.guid).await?;
    let command = started
      .command
      .as_deref()
      .filter(|c| !c.is_empty())
      .or(started.detected_start_command.as_deref());
    if let Some(command) = command {
      self.ui.say("");
      self
        .ui
        .say(&format!("App {} was started using this command `{}`", started.name, command));
      self.ui.say("");
    }

    Ok(started)
  }

  /// Request the app be stopped. Stopping a stopped app only warns.
  pub async fn stop(&self, app: &App) -> Result<App, PushError> {
    if app.state == AppState::Stopped {
      self.ui.warn(&format!("App {} is already stopped", app.name));
      return Ok(app.clone());
    }

    self.ui.say(&format!(
      "Stopping app {} in org {} / space {} as {}...",
      app.name, self.config.org.name, self.config.space.name, self.config.username
    ));
    let stopped = self
      .cc
      .update_app(&app.guid, &AppParams::state(AppState::Stopped))
      .await?;
    self.ui.ok();
    self.ui.say("");
    Ok(stopped)
  }
}
