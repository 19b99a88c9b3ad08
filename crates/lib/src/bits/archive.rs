//! Zip packaging and extraction.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::BitsError;

const ZIP_LOCAL_HEADER: [u8; 4] = [b'P', b'K', 0x03, 0x04];
const ZIP_EMPTY_ARCHIVE: [u8; 4] = [b'P', b'K', 0x05, 0x06];

/// Size and file count of a written archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipSummary {
  pub bytes: u64,
  pub files: usize,
}

/// Whether `path` is a regular file starting with a zip signature.
pub fn is_zip_file(path: &Path) -> bool {
  if !path.is_file() {
    return false;
  }
  let mut magic = [0u8; 4];
  match File::open(path).and_then(|mut f| f.read_exact(&mut magic)) {
    Ok(()) => magic == ZIP_LOCAL_HEADER || magic == ZIP_EMPTY_ARCHIVE,
    Err(_) => false,
  }
}

/// Zip the contents of `src` into `dest`, keeping unix permissions.
///
/// Entry names are relative to `src` and slash-separated. An archive that
/// would have no entries is [`BitsError::EmptyDir`].
pub fn zip_dir(src: &Path, dest: &Path) -> Result<ZipSummary, BitsError> {
  let mut writer = ZipWriter::new(File::create(dest)?);

  let mut files = 0;
  let mut entries = 0;

  for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|e| BitsError::Scan {
      path: src.to_path_buf(),
      message: e.to_string(),
    })?;
    let rel = entry
      .path()
      .strip_prefix(src)
      .map_err(|e| BitsError::Scan {
        path: entry.path().to_path_buf(),
        message: e.to_string(),
      })?;
    let name = to_slash(rel);
    let options = SimpleFileOptions::default()
      .compression_method(CompressionMethod::Deflated)
      .unix_permissions(permissions(entry.path())?);

    if entry.file_type().is_dir() {
      writer.add_directory(format!("{}/", name), options)?;
    } else if entry.file_type().is_file() {
      writer.start_file(name, options)?;
      let mut file = File::open(entry.path())?;
      std::io::copy(&mut file, &mut writer)?;
      files += 1;
    } else {
      continue;
    }
    entries += 1;
  }

  writer.finish()?;

  if entries == 0 {
    return Err(BitsError::EmptyDir(src.to_path_buf()));
  }

  let bytes = fs::metadata(dest)?.len();
  debug!(dest = %dest.display(), bytes, files, "wrote zip");
  Ok(ZipSummary { bytes, files })
}

/// Extract `archive` into `dest`, restoring unix permissions where recorded.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<(), BitsError> {
  let extract_err = |message: String| BitsError::Extract {
    path: archive.to_path_buf(),
    message,
  };

  let file = File::open(archive)?;
  let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| extract_err(format!("failed to open zip: {}", e)))?;

  for i in 0..zip.len() {
    let mut entry = zip
      .by_index(i)
      .map_err(|e| extract_err(format!("failed to read zip entry: {}", e)))?;

    let rel = entry
      .enclosed_name()
      .ok_or_else(|| extract_err(format!("invalid zip entry name '{}'", entry.name())))?;
    let dest_path = dest.join(rel);

    if entry.is_dir() {
      fs::create_dir_all(&dest_path)?;
      continue;
    }

    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent)?;
    }
    let mut outfile = File::create(&dest_path)?;
    std::io::copy(&mut entry, &mut outfile)?;

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      if let Some(mode) = entry.unix_mode() {
        fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode))?;
      }
    }
  }

  Ok(())
}

/// Slash-separated form of a relative path.
pub(crate) fn to_slash(rel: &Path) -> String {
  rel
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

#[cfg(unix)]
fn permissions(path: &Path) -> Result<u32, BitsError> {
  use std::os::unix::fs::PermissionsExt;
  Ok(fs::symlink_metadata(path)?.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn permissions(path: &Path) -> Result<u32, BitsError> {
  if fs::symlink_metadata(path)?.is_dir() {
    Ok(0o755)
  } else {
    Ok(0o644)
  }
}
