//! Implementation of the `cfpush start` and `cfpush stop` commands.

use std::sync::Arc;

use anyhow::{Context, Result};

use cfpush_lib::PushError;
use cfpush_lib::api::{App, CloudController, HttpClient, HttpLogStream};
use cfpush_lib::config::PushConfig;
use cfpush_lib::start::AppStarter;

use crate::output::ConsoleUi;

struct Session {
  cc: Arc<HttpClient>,
  starter: AppStarter,
  config: Arc<PushConfig>,
}

impl Session {
  fn open() -> Result<Self> {
    let config = Arc::new(PushConfig::load()?);
    let cc = Arc::new(HttpClient::new(&config)?);
    let logs = Arc::new(HttpLogStream::new(&config)?);
    let starter = AppStarter::new(cc.clone(), logs, Arc::new(ConsoleUi), config.clone());
    Ok(Self { cc, starter, config })
  }

  async fn find_app(&self, name: &str) -> Result<App, PushError> {
    match self.cc.find_app(&self.config.space.guid, name).await {
      Ok(app) => Ok(app),
      Err(e) if e.is_not_found() => Err(PushError::NotFound(format!("App {} not found", name))),
      Err(e) => Err(e.into()),
    }
  }
}

pub fn cmd_start(name: &str) -> Result<()> {
  let session = Session::open()?;
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(async {
    let app = session.find_app(name).await?;
    session.starter.start(&app, None).await
  })?;
  Ok(())
}

pub fn cmd_stop(name: &str) -> Result<()> {
  let session = Session::open()?;
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(async {
    let app = session.find_app(name).await?;
    session.starter.stop(&app).await
  })?;
  Ok(())
}
