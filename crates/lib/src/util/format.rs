//! Human-readable formatting helpers.

/// Render a byte count the way upload progress is reported (`512 B`, `1.5 KB`, `3.2 MB`).
pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;
  const GB: u64 = MB * 1024;

  if bytes >= GB {
    format!("{:.1} GB", bytes as f64 / GB as f64)
  } else if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

/// Render a unix permission mode as an octal string with a leading zero (`0644`).
pub fn format_mode(mode: u32) -> String {
  format!("0{:o}", mode & 0o7777)
}
