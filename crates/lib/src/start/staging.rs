//! Staging watcher: background log tailer plus package-state polling.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::api::{App, CloudController, LogStream, PackageState};
use crate::config::PushConfig;
use crate::consts::{NO_APP_DETECTED_REASON, STAGING_LOG_TAG};
use crate::error::{PushError, StagingFailureKind};
use crate::ui::Ui;

/// How the package-state poll loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StagingOutcome {
  Staged(App),
  Failed(App),
  TimedOut,
}

struct StagingTailer {
  logs: Arc<dyn LogStream>,
  ui: Arc<dyn Ui>,
  app_guid: String,
  connect_timeout: Duration,
  connected: Option<oneshot::Sender<()>>,
}

impl StagingTailer {
  /// Release the "connected" signal. Only the first call has an effect.
  fn release(&mut self) {
    if let Some(tx) = self.connected.take() {
      let _ = tx.send(());
    }
  }

  /// Connect, then print staging lines until the stream ends, errors, or a
  /// stop is requested. Dropping the subscription closes it.
  async fn run(mut self, mut stop: oneshot::Receiver<()>) {
    let logs = self.logs.clone();
    let app_guid = self.app_guid.clone();
    let mut subscribe = logs.subscribe(&app_guid);
    let connect_deadline = sleep(self.connect_timeout);
    tokio::pin!(connect_deadline);

    let mut stream = tokio::select! {
      biased;

      _ = &mut connect_deadline => {
        self.ui.warn("timeout connecting to log server, no log will be shown");
        self.release();
        return;
      }
      result = &mut subscribe => match result {
        Ok(stream) => {
          self.release();
          stream
        }
        Err(e) => {
          self.release();
          self.ui.warn("Warning: error tailing logs");
          self.ui.say(&e.to_string());
          return;
        }
      },
      _ = &mut stop => {
        debug!(app = %self.app_guid, "stop requested before log stream connected");
        return;
      }
    };
    drop(subscribe);
    debug!(app = %self.app_guid, "log stream connected");

    loop {
      tokio::select! {
        biased;

        _ = &mut stop => {
          debug!(app = %self.app_guid, "closing log stream");
          return;
        }
        item = stream.next() => match item {
          Some(Ok(event)) => {
            if event.source_type == STAGING_LOG_TAG {
              self.ui.say(&event.message);
            }
          }
          Some(Err(e)) => {
            self.ui.warn("Warning: error tailing logs");
            self.ui.say(&e.to_string());
            return;
          }
          None => return,
        },
      }
      // A stream that is always ready must not starve the poller.
      tokio::task::yield_now().await;
    }
  }
}

/// Watches one staging run.
pub struct StagingWatcher {
  cc: Arc<dyn CloudController>,
  logs: Arc<dyn LogStream>,
  ui: Arc<dyn Ui>,
  poll_interval: Duration,
  staging_timeout: Duration,
  log_connect_timeout: Duration,
}

impl StagingWatcher {
  pub fn new(cc: Arc<dyn CloudController>, logs: Arc<dyn LogStream>, ui: Arc<dyn Ui>, config: &PushConfig) -> Self {
    Self {
      cc,
      logs,
      ui,
      poll_interval: config.poll_interval,
      staging_timeout: config.staging_timeout,
      log_connect_timeout: config.log_connect_timeout,
    }
  }

  /// Tail staging logs around `start` and wait for a terminal package state.
  ///
  /// The log tailer is spawned and connected (or given up on) before `start`
  /// runs, so no staging line is lost. The tailer has fully exited before this
  /// returns. Ending in `FAILED` or past the staging timeout is an error.
  pub async fn watch<F, Fut>(&self, app: &App, start: F) -> Result<App, PushError>
  where
    F: FnOnce(App) -> Fut,
    Fut: Future<Output = Result<App, PushError>>,
  {
    let (connected_tx, connected_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel();

    let tailer = StagingTailer {
      logs: self.logs.clone(),
      ui: self.ui.clone(),
      app_guid: app.guid.clone(),
      connect_timeout: self.log_connect_timeout,
      connected: Some(connected_tx),
    };
    let handle = tokio::spawn(tailer.run(stop_rx));

    // An error here means the tailer exited without signalling; proceed without logs.
    let _ = connected_rx.await;

    let outcome = match start(app.clone()).await {
      Ok(started) => self.wait_for_staged(&started).await,
      Err(e) => Err(e),
    };

    let _ = stop_tx.send(());
    if let Err(e) = handle.await {
      warn!(app = %app.name, error = %e, "log tailer did not exit cleanly");
    }

    self.ui.say("");

    match outcome? {
      StagingOutcome::Staged(app) => Ok(app),
      StagingOutcome::Failed(failed) => {
        let reason = failed.staging_failed_reason.unwrap_or_default();
        let kind = if reason == NO_APP_DETECTED_REASON {
          StagingFailureKind::NoAppDetected
        } else {
          StagingFailureKind::Other
        };
        Err(PushError::StagingFailed {
          app: app.name.clone(),
          reason,
          kind,
        })
      }
      StagingOutcome::TimedOut => Err(PushError::StagingTimeout {
        app: app.name.clone(),
        minutes: self.staging_timeout.as_secs_f64() / 60.0,
      }),
    }
  }

  /// Poll the package state until it is terminal or the staging timeout elapses.
  pub async fn wait_for_staged(&self, app: &App) -> Result<StagingOutcome, PushError> {
    let poll = async {
      let mut current = app.clone();
      let mut last = current.package_state;

      while !current.package_state.is_terminal() {
        current = self.cc.get_app(&app.guid).await?;
        if current.package_state != last {
          debug!(app = %app.name, from = %last, to = %current.package_state, "package state changed");
          last = current.package_state;
        }
        if current.package_state.is_terminal() {
          break;
        }
        sleep(self.poll_interval).await;
      }

      Ok::<_, PushError>(current)
    };

    match timeout(self.staging_timeout, poll).await {
      Ok(Ok(app)) if app.package_state == PackageState::Staged => Ok(StagingOutcome::Staged(app)),
      Ok(Ok(app)) => Ok(StagingOutcome::Failed(app)),
      Ok(Err(e)) => Err(e),
      Err(_) => Ok(StagingOutcome::TimedOut),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::LogEvent;
  use crate::util::testutil::{FakeLogStream, FakePlatform, RecordingUi};

  const FAST: Duration = Duration::from_millis(5);

  struct Harness {
    platform: Arc<FakePlatform>,
    logs: Arc<FakeLogStream>,
    ui: Arc<RecordingUi>,
  }

  impl Harness {
    fn new(logs: FakeLogStream) -> Self {
      Self {
        platform: Arc::new(FakePlatform::new()),
        logs: Arc::new(logs),
        ui: Arc::new(RecordingUi::default()),
      }
    }

    fn watcher(&self, staging_timeout: Duration, connect_timeout: Duration) -> StagingWatcher {
      let config = PushConfig {
        poll_interval: FAST,
        staging_timeout,
        log_connect_timeout: connect_timeout,
        ..PushConfig::default()
      };
      StagingWatcher::new(self.platform.clone(), self.logs.clone(), self.ui.clone(), &config)
    }
  }

  fn staging_line(message: &str) -> LogEvent {
    LogEvent {
      source_type: STAGING_LOG_TAG.to_string(),
      message: message.to_string(),
    }
  }

  #[tokio::test]
  async fn polls_until_staged() {
    let h = Harness::new(FakeLogStream::connected(vec![]));
    let app = h.platform.add_app("foo");
    h.platform.script_package_states(
      &app.guid,
      &[PackageState::Pending, PackageState::Staging, PackageState::Staged],
    );

    let staged = h
      .watcher(Duration::from_secs(5), Duration::from_secs(5))
      .watch(&app, |app| async move { Ok(app) })
      .await
      .unwrap();

    assert_eq!(staged.package_state, PackageState::Staged);
    assert_eq!(h.platform.calls("get_app"), 3);
  }

  #[tokio::test]
  async fn polling_stops_at_first_terminal_state() {
    let h = Harness::new(FakeLogStream::connected(vec![]));
    let app = h.platform.add_app("foo");
    h.platform
      .script_package_states(&app.guid, &[PackageState::Staging, PackageState::Failed]);

    let err = h
      .watcher(Duration::from_secs(5), Duration::from_secs(5))
      .watch(&app, |app| async move { Ok(app) })
      .await
      .unwrap_err();

    assert!(matches!(err, PushError::StagingFailed { kind: StagingFailureKind::Other, .. }));
    assert_eq!(h.platform.calls("get_app"), 2);
  }

  #[tokio::test]
  async fn no_app_detected_is_classified() {
    let h = Harness::new(FakeLogStream::connected(vec![]));
    let app = h.platform.add_app("foo");
    h.platform.script_package_states(&app.guid, &[PackageState::Failed]);
    h.platform.set_staging_failed_reason(&app.guid, NO_APP_DETECTED_REASON);

    let err = h
      .watcher(Duration::from_secs(5), Duration::from_secs(5))
      .watch(&app, |app| async move { Ok(app) })
      .await
      .unwrap_err();

    assert!(matches!(
      err,
      PushError::StagingFailed {
        kind: StagingFailureKind::NoAppDetected,
        ..
      }
    ));
  }

  #[tokio::test]
  async fn staging_timeout_is_reported() {
    let h = Harness::new(FakeLogStream::connected(vec![]));
    let app = h.platform.add_app("foo");
    h.platform.script_package_states(&app.guid, &[PackageState::Staging]);

    let err = h
      .watcher(Duration::from_millis(40), Duration::from_secs(5))
      .watch(&app, |app| async move { Ok(app) })
      .await
      .unwrap_err();

    assert!(matches!(err, PushError::StagingTimeout { .. }));
  }

  #[tokio::test]
  async fn only_staging_lines_are_printed() {
    let h = Harness::new(FakeLogStream::connected(vec![
      staging_line("-----> Downloading buildpack"),
      LogEvent {
        source_type: "APP".to_string(),
        message: "app output".to_string(),
      },
      staging_line("-----> Compiled"),
    ]));
    let app = h.platform.add_app("foo");
    h.platform.script_package_states(&app.guid, &[PackageState::Staging, PackageState::Staged]);

    h.watcher(Duration::from_secs(5), Duration::from_secs(5))
      .watch(&app, |app| async move { Ok(app) })
      .await
      .unwrap();

    assert!(h.ui.contains("-----> Downloading buildpack"));
    assert!(h.ui.contains("-----> Compiled"));
    assert!(!h.ui.contains("app output"));
  }

  #[tokio::test]
  async fn start_runs_only_after_tailer_connected() {
    let h = Harness::new(FakeLogStream::connected(vec![]));
    let app = h.platform.add_app("foo");
    h.platform.script_package_states(&app.guid, &[PackageState::Staged]);
    let logs = h.logs.clone();

    h.watcher(Duration::from_secs(5), Duration::from_secs(5))
      .watch(&app, |app| async move {
        assert_eq!(logs.subscriptions(), 1);
        Ok(app)
      })
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn connect_timeout_warns_and_proceeds() {
    let h = Harness::new(FakeLogStream::never_connects());
    let app = h.platform.add_app("foo");
    h.platform.script_package_states(&app.guid, &[PackageState::Staged]);

    h.watcher(Duration::from_secs(5), Duration::from_millis(20))
      .watch(&app, |app| async move { Ok(app) })
      .await
      .unwrap();

    assert!(h.ui.warned("timeout connecting to log server, no log will be shown"));
  }

  #[tokio::test]
  async fn subscribe_error_warns_and_proceeds() {
    let h = Harness::new(FakeLogStream::failing());
    let app = h.platform.add_app("foo");
    h.platform.script_package_states(&app.guid, &[PackageState::Staged]);

    h.watcher(Duration::from_secs(5), Duration::from_secs(5))
      .watch(&app, |app| async move { Ok(app) })
      .await
      .unwrap();

    assert!(h.ui.warned("Warning: error tailing logs"));
  }

  #[tokio::test]
  async fn summary_is_printed_after_every_log_line() {
    let h = Harness::new(FakeLogStream::connected(vec![staging_line("line one"), staging_line("line two")]));
    let app = h.platform.add_app("foo");
    h.platform.script_package_states(&app.guid, &[PackageState::Staging, PackageState::Staged]);

    h.watcher(Duration::from_secs(5), Duration::from_secs(5))
      .watch(&app, |app| async move { Ok(app) })
      .await
      .unwrap();

    let lines = h.ui.lines();
    let last_log = lines.iter().rposition(|l| l.contains("line two")).unwrap();
    assert_eq!(lines.last().map(String::as_str), Some(""));
    assert!(last_log < lines.len() - 1);
  }

  #[tokio::test]
  async fn busy_log_stream_still_stops() {
    let h = Harness::new(FakeLogStream::endless(LogEvent {
      source_type: "APP".to_string(),
      message: "app output".to_string(),
    }));
    let app = h.platform.add_app("foo");
    h.platform.script_package_states(&app.guid, &[PackageState::Staging, PackageState::Staged]);

    let staged = timeout(
      Duration::from_secs(3),
      h.watcher(Duration::from_secs(5), Duration::from_secs(5))
        .watch(&app, |app| async move { Ok(app) }),
    )
    .await
    .expect("watch did not return while the log stream stayed busy")
    .unwrap();

    assert_eq!(staged.package_state, PackageState::Staged);
    assert!(!h.ui.contains("app output"));
  }

  #[tokio::test]
  async fn start_failure_stops_tailer_and_propagates() {
    let h = Harness::new(FakeLogStream::connected(vec![]));
    let app = h.platform.add_app("foo");

    let err = h
      .watcher(Duration::from_secs(5), Duration::from_secs(5))
      .watch(&app, |_app| async move { Err(PushError::NotFound("boom".to_string())) })
      .await
      .unwrap_err();

    assert_eq!(err.to_string(), "boom");
    assert_eq!(h.platform.calls("get_app"), 0);
  }
}
