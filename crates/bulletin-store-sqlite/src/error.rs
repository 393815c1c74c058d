//! Error type for `bulletin-store-sqlite`.

use bulletin_core::store::{StoreError, UniqueField};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A stored value no longer passes domain validation.
  #[error("core error: {0}")]
  Core(#[from] bulletin_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A `UNIQUE` constraint rejected the write.
  #[error("{0} is already taken")]
  Conflict(UniqueField),

  #[error("subscriber not found: {0}")]
  SubscriberNotFound(uuid::Uuid),
}

impl StoreError for Error {
  fn conflict(&self) -> Option<UniqueField> {
    match self {
      Self::Conflict(field) => Some(*field),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
