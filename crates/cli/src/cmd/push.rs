//! Implementation of the `cfpush push` command.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use cfpush_lib::api::{HttpClient, HttpLogStream};
use cfpush_lib::config::PushConfig;
use cfpush_lib::deploy::{Deployer, PushFlags, app_set};

use crate::output::ConsoleUi;

/// Execute the push command.
///
/// Flags and configuration are validated before the first request:
/// - flag values (instances, memory, disk, timeout, health check type)
/// - timeout overrides from the environment
/// - the persisted target
pub fn cmd_push(flags: PushFlags) -> Result<()> {
  let context = flags.parse()?;
  let config = Arc::new(PushConfig::load()?);

  let cwd = std::env::current_dir().context("Failed to determine current directory")?;
  let requests = app_set(context, Vec::new(), &cwd)?;
  debug!(apps = requests.len(), api = %config.api_endpoint, "starting push");

  let cc = Arc::new(HttpClient::new(&config)?);
  let logs = Arc::new(HttpLogStream::new(&config)?);
  let deployer = Deployer::new(cc, logs, Arc::new(ConsoleUi), config);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(deployer.push_all(&requests))?;

  Ok(())
}
