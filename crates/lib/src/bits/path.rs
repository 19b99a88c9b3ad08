//! Normalizing the app path to a directory.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use super::BitsError;
use super::archive::{extract_zip, is_zip_file};

/// An app directory ready for scanning.
///
/// When the app was given as a zip, the extracted tree lives in a temporary
/// directory owned by this value and is removed when it is dropped, on every
/// exit path.
#[derive(Debug)]
pub struct AppDir {
  path: PathBuf,
  extracted: Option<TempDir>,
}

impl AppDir {
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Whether the directory is a temporary extraction of an archive.
  pub fn is_extracted(&self) -> bool {
    self.extracted.is_some()
  }
}

impl Deref for AppDir {
  type Target = Path;

  fn deref(&self) -> &Path {
    &self.path
  }
}

/// Resolve a directory or zip archive into an absolute app directory.
///
/// Directories have symlinks resolved. Archives are extracted into a fresh
/// temporary directory.
pub fn resolve_app_dir(path: &Path) -> Result<AppDir, BitsError> {
  if is_zip_file(path) {
    let temp = TempDir::with_prefix("unzipped-app")?;
    extract_zip(path, temp.path())?;
    debug!(archive = %path.display(), dir = %temp.path().display(), "extracted app archive");
    return Ok(AppDir {
      path: temp.path().to_path_buf(),
      extracted: Some(temp),
    });
  }

  let resolved = dunce::canonicalize(path).map_err(|e| BitsError::ResolvePath {
    path: path.to_path_buf(),
    source: e,
  })?;

  Ok(AppDir {
    path: resolved,
    extracted: None,
  })
}
