//! Residual computation and staging-tree assembly.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::scan::file_mode;
use super::{BitsError, LocalFile};
use crate::api::FileResource;
use crate::consts::CFIGNORE_FILENAME;
use crate::platform::Os;
use crate::util::format::format_mode;

/// Outcome of gathering the files of one push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatheredFiles {
  /// Every local file, matched or not, with its recorded mode.
  pub manifest: Vec<FileResource>,
  /// Relative paths copied into the staging tree.
  pub residual: Vec<String>,
}

impl GatheredFiles {
  pub fn has_files_to_upload(&self) -> bool {
    !self.residual.is_empty()
  }
}

/// Copy the files the platform does not know into `upload_dir`.
///
/// A local file is known when `matched` holds an entry with the same path,
/// hash and size. Known files have their mode re-read from `app_dir`, since
/// the platform does not keep it. `.cfignore` is copied whenever it exists.
pub fn gather_files(
  local: &[LocalFile],
  matched: &[FileResource],
  app_dir: &Path,
  upload_dir: &Path,
  os: Os,
) -> Result<GatheredFiles, BitsError> {
  let mut gathered = GatheredFiles::default();

  for file in local {
    let resource = file.resource();
    let known = matched.iter().any(|m| m.same_file(&resource));
    let source = app_dir.join(&file.relative_path);

    let mode = if known {
      let metadata = fs::symlink_metadata(&source).map_err(|e| BitsError::Copy {
        path: source.clone(),
        source: e,
      })?;
      file_mode(&metadata, os)
    } else {
      copy_preserving_layout(&source, &upload_dir.join(&file.relative_path))?;
      gathered.residual.push(file.relative_path.clone());
      file.mode
    };

    gathered.manifest.push(FileResource {
      mode: Some(format_mode(mode)),
      ..resource
    });
  }

  let cfignore = app_dir.join(CFIGNORE_FILENAME);
  if cfignore.is_file() {
    copy_preserving_layout(&cfignore, &upload_dir.join(CFIGNORE_FILENAME))?;
  }

  debug!(
    total = gathered.manifest.len(),
    residual = gathered.residual.len(),
    "gathered app files"
  );
  Ok(gathered)
}

fn copy_preserving_layout(source: &Path, dest: &Path) -> Result<(), BitsError> {
  let copy_err = |e: std::io::Error| BitsError::Copy {
    path: source.to_path_buf(),
    source: e,
  };

  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent).map_err(copy_err)?;
  }
  // fs::copy carries permission bits over.
  fs::copy(source, dest).map_err(copy_err)?;
  Ok(())
}
