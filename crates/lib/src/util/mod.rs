//! Shared utilities.
//!
//! Content hashing, human-readable formatting, and test helpers.

pub mod format;
pub mod hash;

#[cfg(test)]
pub mod testutil;
