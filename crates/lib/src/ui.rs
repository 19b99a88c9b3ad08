//! Operator-facing output.
//!
//! The pipeline reports progress, streamed staging logs and tips through [`Ui`]
//! rather than `tracing`, so the host command decides how they are rendered.

/// Sink for operator-facing messages.
pub trait Ui: Send + Sync {
  /// Print a progress or informational line.
  fn say(&self, message: &str);

  /// Print a non-fatal warning.
  fn warn(&self, message: &str);

  /// Acknowledge that the preceding step succeeded.
  fn ok(&self) {
    self.say("OK");
  }
}
