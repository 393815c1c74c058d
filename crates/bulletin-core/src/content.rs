//! Campaign content and the provider that supplies it.

use std::future::Future;

use serde::{Deserialize, Serialize};

/// The piece of content broadcast by one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
  pub title:       String,
  pub description: String,
  /// Absolute URL of the article on the portal.
  pub link:        String,
  #[serde(default)]
  pub image:       Option<String>,
}

/// Looks up campaign content by its identifier in the content platform.
pub trait ContentProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Returns `None` when no content exists for `content_id`.
  fn campaign<'a>(
    &'a self,
    content_id: &'a str,
  ) -> impl Future<Output = Result<Option<Campaign>, Self::Error>> + Send + 'a;
}
