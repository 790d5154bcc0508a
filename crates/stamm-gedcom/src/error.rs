//! Error types for the stamm-gedcom codec.

use thiserror::Error;

/// A structural failure. Every variant carries the 1-based source line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("line {line}: invalid level number in {text:?}")]
  InvalidLevel { line: usize, text: String },

  #[error("line {line}: missing tag")]
  MissingTag { line: usize },

  /// A level deeper than one below the previous line, or a first line
  /// that is not level 0.
  #[error("line {line}: level {level} where at most {max} is allowed")]
  BadNesting { line: usize, level: u32, max: u32 },

  #[error("line {line}: level-0 {tag} record has no cross-reference id")]
  MissingXref { line: usize, tag: String },

  #[error("line {line}: input is not valid UTF-8")]
  Encoding { line: usize },
}

impl Error {
  /// The source line the failure was detected on.
  pub fn line(&self) -> usize {
    match self {
      Self::InvalidLevel { line, .. }
      | Self::MissingTag { line }
      | Self::BadNesting { line, .. }
      | Self::MissingXref { line, .. }
      | Self::Encoding { line } => *line,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
