//! Error types for `bulletin-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Missing or malformed subscriber input.
  #[error("validation error: {0}")]
  Validation(String),

  /// The email is already subscribed and confirmed.
  #[error("{0} is already subscribed")]
  AlreadySubscribed(String),

  /// No subscriber holds the presented confirm/unsubscribe token.
  #[error("invalid or unknown token")]
  InvalidToken,

  #[error("could not issue unique tokens after {0} attempts")]
  TokenCollision(u32),

  #[error("store error: {0}")]
  Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn persistence<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Persistence(Box::new(e))
  }

  /// `true` for errors caused by the caller's input rather than the system.
  pub fn is_client_error(&self) -> bool {
    matches!(
      self,
      Self::Validation(_) | Self::AlreadySubscribed(_) | Self::InvalidToken
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
