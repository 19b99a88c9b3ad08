//! Crate-wide constants.

use std::time::Duration;

/// Application name, used for config directories.
pub const APP_NAME: &str = "cfpush";

/// Command name shown in operator tips.
pub const CLI_NAME: &str = "cfpush";

pub const DEFAULT_STAGING_TIMEOUT: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_LOG_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Environment variable overriding the staging timeout, in whole minutes.
pub const STAGING_TIMEOUT_ENV: &str = "CF_STAGING_TIMEOUT";

/// Environment variable overriding the startup timeout, in whole minutes.
pub const STARTUP_TIMEOUT_ENV: &str = "CF_STARTUP_TIMEOUT";

/// Environment variable relocating the config directory to `$CF_HOME/.cf`.
pub const CF_HOME_ENV: &str = "CF_HOME";

/// Name of the target file inside the config directory.
pub const TARGET_FILENAME: &str = "config.json";

/// Source tag of log lines emitted by the staging phase.
pub const STAGING_LOG_TAG: &str = "STG";

/// Exclusion list at the app root; travels with the bits but is never hash-matched.
pub const CFIGNORE_FILENAME: &str = ".cfignore";

/// Paths excluded from every scan, in addition to `.cfignore` patterns.
pub const DEFAULT_IGNORED: &[&str] = &[
  ".cfignore",
  ".DS_Store",
  ".git",
  ".gitignore",
  ".hg",
  ".svn",
  "_darcs",
  "manifest.yml",
];

/// Staging failure reason reported when no buildpack accepts the app.
pub const NO_APP_DETECTED_REASON: &str = "NoAppDetectedError";
