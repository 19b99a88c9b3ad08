//! Local file scanner.

use std::fs;
use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::archive::to_slash;
use super::{BitsError, LocalFile};
use crate::consts::{CFIGNORE_FILENAME, DEFAULT_IGNORED};
use crate::platform::Os;
use crate::util::hash::hash_file;

/// Build the exclusion matcher for an app root.
///
/// Starts from the built-in ignore set and appends `.cfignore` patterns when
/// the file exists.
fn build_ignore(root: &Path) -> Result<Gitignore, BitsError> {
  let mut builder = GitignoreBuilder::new(root);
  for pattern in DEFAULT_IGNORED {
    builder.add_line(None, pattern).map_err(|e| BitsError::Ignore {
      path: root.to_path_buf(),
      source: e,
    })?;
  }

  let cfignore = root.join(CFIGNORE_FILENAME);
  if cfignore.is_file() {
    if let Some(e) = builder.add(&cfignore) {
      return Err(BitsError::Ignore {
        path: cfignore,
        source: e,
      });
    }
  }

  builder.build().map_err(|e| BitsError::Ignore {
    path: root.to_path_buf(),
    source: e,
  })
}

/// Scan `root` for every regular file not excluded by the ignore rules.
///
/// Results are sorted by relative path. `.cfignore` itself is never part of
/// the result; it travels with the bits separately.
pub fn scan_app_files(root: &Path, os: Os) -> Result<Vec<LocalFile>, BitsError> {
  let ignore = build_ignore(root)?;

  let walker = WalkDir::new(root)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| {
      let is_dir = entry.file_type().is_dir();
      !ignore.matched_path_or_any_parents(entry.path(), is_dir).is_ignore()
    });

  let mut files = Vec::new();
  for entry in walker {
    let entry = entry.map_err(|e| BitsError::Scan {
      path: root.to_path_buf(),
      message: e.to_string(),
    })?;

    if !entry.file_type().is_file() {
      if entry.file_type().is_symlink() {
        trace!(path = %entry.path().display(), "skipping symlink");
      }
      continue;
    }

    let rel = entry.path().strip_prefix(root).map_err(|e| BitsError::Scan {
      path: entry.path().to_path_buf(),
      message: e.to_string(),
    })?;

    let metadata = entry.metadata().map_err(|e| BitsError::Scan {
      path: entry.path().to_path_buf(),
      message: e.to_string(),
    })?;
    let hash = hash_file(entry.path()).map_err(|e| BitsError::Scan {
      path: entry.path().to_path_buf(),
      message: e.to_string(),
    })?;

    files.push(LocalFile {
      relative_path: to_slash(rel),
      size: metadata.len(),
      hash,
      mode: file_mode(&metadata, os),
    });
  }

  debug!(root = %root.display(), files = files.len(), "scanned app files");
  Ok(files)
}

/// Permission bits of a file, read fresh from disk.
///
/// Hosts whose filesystem does not track the executable bit get `0o700`
/// forced on.
pub fn file_mode(metadata: &fs::Metadata, os: Os) -> u32 {
  let mode = raw_mode(metadata);
  if os.tracks_executable_bit() { mode } else { mode | 0o700 }
}

#[cfg(unix)]
fn raw_mode(metadata: &fs::Metadata) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn raw_mode(metadata: &fs::Metadata) -> u32 {
  if metadata.permissions().readonly() { 0o444 } else { 0o666 }
}
