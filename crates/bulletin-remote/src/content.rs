//! [`HttpContentProvider`]: looks campaigns up in the content platform.

use std::time::Duration;

use bulletin_core::content::{Campaign, ContentProvider};
use reqwest::{Client, StatusCode, Url};

use crate::{Error, Result};

#[derive(Clone)]
pub struct HttpContentProvider {
  client:   Client,
  base_url: Url,
}

impl HttpContentProvider {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    let invalid = |reason: String| Error::BaseUrl { url: base_url.to_owned(), reason };
    let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    if parsed.cannot_be_a_base() {
      return Err(invalid("not a hierarchical URL".to_owned()));
    }

    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(Error::Client)?;
    Ok(Self { client, base_url: parsed })
  }

  /// `<base>/articles/<content_id>`, with the id as one encoded segment.
  ///
  /// Returns `None` for ids that cannot name an article (empty or a dot
  /// segment).
  fn url(&self, content_id: &str) -> Option<Url> {
    if matches!(content_id, "" | "." | "..") {
      return None;
    }
    let mut url = self.base_url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url
      .path_segments_mut()
      .ok()?
      .pop_if_empty()
      .push("articles")
      .push(content_id);
    Some(url)
  }
}

impl ContentProvider for HttpContentProvider {
  type Error = Error;

  /// `GET <base>/articles/<content_id>`
  async fn campaign(&self, content_id: &str) -> Result<Option<Campaign>> {
    let Some(url) = self.url(content_id) else {
      return Ok(None);
    };
    let resp = self.client.get(url.clone()).send().await?;

    match resp.status() {
      StatusCode::NOT_FOUND => Ok(None),
      status if status.is_success() => Ok(Some(resp.json().await?)),
      status => Err(Error::Status { url: url.into(), status: status.as_u16() }),
    }
  }
}
