//! Error types for `stamm-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown event type code: {0:?}")]
  UnknownEventType(String),

  #[error("unknown {kind} value: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  #[error("invalid calendar date: {0:?}")]
  InvalidCalendarDate(String),

  #[error("generations must be between 1 and {max}, got {requested}")]
  InvalidGenerations { requested: u32, max: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
