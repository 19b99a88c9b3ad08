use std::path::PathBuf;

use crate::consts::{APP_NAME, CF_HOME_ENV};

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Returns the directory holding the target file.
///
/// `$CF_HOME/.cf` wins when `CF_HOME` is set, so several targets can be kept
/// side by side the way operators already do for the platform's own CLI.
#[cfg(windows)]
pub fn config_dir() -> Option<PathBuf> {
  if let Some(cf_home) = std::env::var_os(CF_HOME_ENV) {
    return Some(PathBuf::from(cf_home).join(".cf"));
  }
  std::env::var_os("APPDATA").map(|appdata| PathBuf::from(appdata).join(APP_NAME))
}

/// Returns the directory holding the target file.
///
/// `$CF_HOME/.cf` wins when `CF_HOME` is set, so several targets can be kept
/// side by side the way operators already do for the platform's own CLI.
#[cfg(not(windows))]
pub fn config_dir() -> Option<PathBuf> {
  if let Some(cf_home) = std::env::var_os(CF_HOME_ENV) {
    return Some(PathBuf::from(cf_home).join(".cf"));
  }
  let config_home = std::env::var_os("XDG_CONFIG_HOME")
    .map(PathBuf::from)
    .or_else(|| home_dir().map(|home| home.join(".config")))?;
  Some(config_home.join(APP_NAME))
}
