//! Application bits: scan, diff against the platform, package and upload.
//!
//! The flow for one app directory is:
//! 1. [`path::resolve_app_dir`] turns a directory or zip into a directory
//! 2. [`scan::scan_app_files`] hashes every non-ignored file
//! 3. the platform's resource match removes files it already stores
//! 4. [`gather::gather_files`] copies the residual set into a staging tree
//! 5. [`archive::zip_dir`] zips the staging tree
//! 6. the zip and the full resource manifest are uploaded together
//!
//! Steps 5 and 6 are skipped when the platform already has every file.

pub mod archive;
pub mod gather;
pub mod path;
pub mod scan;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

use crate::api::{ApiError, CloudController, FileResource};
use crate::platform::Os;
use crate::ui::Ui;
use crate::util::format::format_bytes;
use crate::util::hash::ContentHash;

pub use gather::GatheredFiles;
pub use path::{AppDir, resolve_app_dir};
pub use scan::scan_app_files;

/// Errors that can occur while preparing application bits.
#[derive(Debug, Error)]
pub enum BitsError {
  #[error("could not resolve app path '{path}': {source}")]
  ResolvePath {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("No app files found in '{0}'")]
  NoAppFiles(PathBuf),

  #[error("failed to scan '{path}': {message}")]
  Scan { path: PathBuf, message: String },

  #[error("invalid ignore pattern in {path}: {source}")]
  Ignore {
    path: PathBuf,
    #[source]
    source: ignore::Error,
  },

  #[error("failed to copy '{path}': {source}")]
  Copy {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The staging tree produced an archive with no entries.
  #[error("Directory is empty: {0}")]
  EmptyDir(PathBuf),

  #[error("Error zipping application: {0}")]
  Zip(#[from] zip::result::ZipError),

  #[error("failed to extract '{path}': {message}")]
  Extract { path: PathBuf, message: String },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

/// A file found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
  /// Slash-separated path relative to the app root.
  pub relative_path: String,
  pub size: u64,
  pub hash: ContentHash,
  /// Permission bits as recorded from the source tree.
  pub mode: u32,
}

impl LocalFile {
  /// The `(path, hash, size)` triple used for resource matching.
  pub fn resource(&self) -> FileResource {
    FileResource {
      path: self.relative_path.clone(),
      sha: self.hash.clone(),
      size: self.size,
      mode: None,
    }
  }
}

/// Failure of the upload step, before or after the bits left the machine.
#[derive(Debug, Error)]
pub enum UploadError {
  #[error(transparent)]
  Bits(#[from] BitsError),

  #[error(transparent)]
  Api(#[from] ApiError),
}

/// Uploads the bits of one application directory.
pub struct BitsUploader {
  cc: Arc<dyn CloudController>,
  ui: Arc<dyn Ui>,
  os: Os,
}

impl BitsUploader {
  pub fn new(cc: Arc<dyn CloudController>, ui: Arc<dyn Ui>, os: Os) -> Self {
    Self { cc, ui, os }
  }

  /// Scan `app_dir`, skip what the platform already has, and upload the rest.
  ///
  /// `display_path` is the path as the operator gave it, used in messages.
  pub async fn upload(&self, app_guid: &str, app_dir: &Path, display_path: &Path) -> Result<(), UploadError> {
    let local = scan_app_files(app_dir, self.os)?;
    if local.is_empty() {
      return Err(BitsError::NoAppFiles(display_path.to_path_buf()).into());
    }

    let query: Vec<FileResource> = local.iter().map(LocalFile::resource).collect();
    let matched = self.cc.match_known_files(&query).await?;
    debug!(local = local.len(), matched = matched.len(), "resource match complete");

    let upload_dir = TempDir::new().map_err(BitsError::from)?;
    let gathered = gather::gather_files(&local, &matched, app_dir, upload_dir.path(), self.os)?;

    if !gathered.has_files_to_upload() {
      info!(app = %app_guid, files = local.len(), "all files already known to the platform, skipping upload");
      return Ok(());
    }

    let zip_dir = TempDir::new().map_err(BitsError::from)?;
    let zip_path = zip_dir.path().join("application.zip");
    let summary = archive::zip_dir(upload_dir.path(), &zip_path)?;
    self.ui.say(&format!("Uploading app files from: {}", app_dir.display()));
    self.ui.say(&format!(
      "Uploading {}, {} files",
      format_bytes(summary.bytes),
      summary.files
    ));

    self
      .cc
      .upload_bits(app_guid, Some(zip_path.as_path()), &gathered.manifest)
      .await?;
    Ok(())
  }
}
