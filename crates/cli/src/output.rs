//! CLI output formatting.
//!
//! [`ConsoleUi`] renders pipeline progress on stdout and warnings on stderr,
//! colored when the stream supports it.

use owo_colors::{OwoColorize, Stream};

use cfpush_lib::ui::Ui;

pub mod symbols {
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    "FAILED".if_supports_color(Stream::Stderr, |s| s.red())
  );
  eprintln!("{}", message);
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

/// Terminal implementation of the pipeline's [`Ui`].
pub struct ConsoleUi;

impl Ui for ConsoleUi {
  fn say(&self, message: &str) {
    println!("{}", message);
  }

  fn warn(&self, message: &str) {
    print_warning(message);
  }

  fn ok(&self) {
    println!("{}", "OK".if_supports_color(Stream::Stdout, |s| s.green()));
  }
}
