//! Error type for `stamm-service`.

use stamm_core::person::PersonId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("parse error: {0}")]
  Parse(#[from] stamm_gedcom::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("person not found: {0}")]
  PersonNotFound(PersonId),

  #[error("generations must be between 1 and {max}, got {requested}")]
  InvalidGenerations { requested: u32, max: u32 },

  #[error(transparent)]
  Core(stamm_core::Error),

  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl Error {
  /// Box a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

impl From<stamm_core::Error> for Error {
  fn from(e: stamm_core::Error) -> Self {
    match e {
      stamm_core::Error::InvalidGenerations { requested, max } => {
        Self::InvalidGenerations { requested, max }
      }
      other => Self::Core(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
