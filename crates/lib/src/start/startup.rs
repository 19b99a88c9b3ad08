//! Startup watcher: instance-state polling after a successful stage.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::api::{App, CloudController, InstanceSnapshot, InstanceState};
use crate::config::PushConfig;
use crate::error::PushError;
use crate::ui::Ui;

/// Instance counts by state for one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceCount {
  pub running: usize,
  pub starting: usize,
  /// Unique, sorted details reported by starting instances.
  pub starting_details: BTreeSet<String>,
  pub flapping: usize,
  pub down: usize,
  pub crashed: usize,
  pub total: usize,
}

impl InstanceCount {
  pub fn from_snapshots(snapshots: &[InstanceSnapshot]) -> Self {
    let mut count = Self {
      total: snapshots.len(),
      ..Self::default()
    };

    for snapshot in snapshots {
      match snapshot.state {
        InstanceState::Running => count.running += 1,
        InstanceState::Starting => {
          count.starting += 1;
          if let Some(details) = &snapshot.details {
            count.starting_details.insert(details.clone());
          }
        }
        InstanceState::Flapping => count.flapping += 1,
        InstanceState::Down => count.down += 1,
        InstanceState::Crashed => count.crashed += 1,
        InstanceState::Unknown => {}
      }
    }

    count
  }

  /// Whether any instance is in a state that ends the startup wait with a failure.
  pub fn has_failed(&self) -> bool {
    self.flapping > 0 || self.crashed > 0
  }

  /// One-line progress summary, e.g. `1/4 instances running, 2 starting, 1 down`.
  pub fn summary(&self) -> String {
    let mut parts = vec![format!("{}/{} instances running", self.running, self.total)];

    if self.starting > 0 {
      if self.starting_details.is_empty() {
        parts.push(format!("{} starting", self.starting));
      } else {
        let details: Vec<&str> = self.starting_details.iter().map(String::as_str).collect();
        parts.push(format!("{} starting ({})", self.starting, details.join(", ")));
      }
    }
    if self.down > 0 {
      parts.push(format!("{} down", self.down));
    }
    if self.flapping > 0 {
      parts.push(format!("{} failing", self.flapping));
    }
    if self.crashed > 0 {
      parts.push(format!("{} crashed", self.crashed));
    }

    parts.join(", ")
  }
}

pub struct StartupWatcher {
  cc: Arc<dyn CloudController>,
  ui: Arc<dyn Ui>,
  poll_interval: Duration,
}

impl StartupWatcher {
  pub fn new(cc: Arc<dyn CloudController>, ui: Arc<dyn Ui>, config: &PushConfig) -> Self {
    Self {
      cc,
      ui,
      poll_interval: config.poll_interval,
    }
  }

  /// Poll instances until one is running.
  ///
  /// A flapping or crashed instance fails the wait immediately. Errors
  /// fetching the instance list are reported and retried.
  pub async fn wait_for_one_running_instance(&self, app: &App, startup_timeout: Duration) -> Result<(), PushError> {
    let poll = async {
      loop {
        match self.cc.instances(&app.guid).await {
          Ok(snapshots) => {
            let count = InstanceCount::from_snapshots(&snapshots);
            self.ui.say(&count.summary());

            if count.running > 0 {
              debug!(app = %app.name, running = count.running, "instance running");
              return Ok(());
            }
            if count.has_failed() {
              return Err(PushError::StartupFailed { app: app.name.clone() });
            }
          }
          Err(e) => {
            warn!(app = %app.name, error = %e, "failed to fetch instances");
            self.ui.warn(&format!("Could not fetch instance count: {}", e));
          }
        }
        sleep(self.poll_interval).await;
      }
    };

    match timeout(startup_timeout, poll).await {
      Ok(result) => result,
      Err(_) => Err(PushError::StartupTimeout { app: app.name.clone() }),
    }
  }
}
