//! Error type for `bulletin-remote`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("invalid base URL {url:?}: {reason}")]
  BaseUrl { url: String, reason: String },

  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),

  /// The remote answered with a status other than success or not-found.
  #[error("{url} returned {status}")]
  Status { url: String, status: u16 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
