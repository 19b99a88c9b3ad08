use std::fmt;

/// Operating system variants the pipeline distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// The host operating system. Other unix flavours count as Linux.
  pub fn current() -> Self {
    match std::env::consts::OS {
      "macos" => Self::MacOs,
      "windows" => Self::Windows,
      _ => Self::Linux,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "windows",
    }
  }

  /// Whether the filesystem records the owner executable bit.
  ///
  /// When it does not, recorded file modes get `0o700` forced on so that
  /// scripts pushed from such a host stay runnable on the platform.
  pub fn tracks_executable_bit(&self) -> bool {
    !matches!(self, Self::Windows)
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
