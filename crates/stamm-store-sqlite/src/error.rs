//! Error type for `stamm-store-sqlite`.

use stamm_core::{conflict::ConflictId, location::LocationId, person::PersonId};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] stamm_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("cannot decode stored value: {0}")]
  Decode(String),

  /// A person or family xref already exists in the batch or the store.
  /// The whole load was rolled back.
  #[error("duplicate {kind} xref {xref}")]
  DuplicateXref { kind: &'static str, xref: String },

  #[error("another ingest ({0}) is in progress")]
  IngestInProgress(Uuid),

  #[error("ingest {0} does not hold the lock")]
  LockNotHeld(Uuid),

  #[error("person not found: {0}")]
  PersonNotFound(PersonId),

  #[error("conflict not found: {0}")]
  ConflictNotFound(ConflictId),

  #[error("location not found: {0}")]
  LocationNotFound(LocationId),

  #[error("no source locations to merge")]
  NothingToMerge,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
