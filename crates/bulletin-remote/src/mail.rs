//! [`HttpMailTransport`]: delivers mail through a SendGrid-style JSON API.

use std::time::Duration;

use bulletin_core::{
  TransportError,
  mail::MailTransport,
  subscriber::SubscriberEmail,
};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;

use crate::{Error, Result};

/// Connection settings for the mail API.
#[derive(Debug, Clone)]
pub struct MailApiConfig {
  /// e.g. `https://api.sendgrid.com/v3`; `/mail/send` is appended.
  pub base_url: String,
  pub api_key:  Secret<String>,
  pub sender:   SubscriberEmail,
  pub timeout:  Duration,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpMailTransport {
  client: Client,
  config: MailApiConfig,
}

// ─── Wire format ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SendBody<'a> {
  personalizations: [Personalization<'a>; 1],
  from:             Address<'a>,
  subject:          &'a str,
  content:          [Content<'a>; 1],
}

#[derive(Serialize)]
struct Personalization<'a> {
  to: [Address<'a>; 1],
}

#[derive(Serialize)]
struct Address<'a> {
  email: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
  #[serde(rename = "type")]
  content_type: &'a str,
  value:        &'a str,
}

// ─── Transport ───────────────────────────────────────────────────────────────

impl HttpMailTransport {
  pub fn new(config: MailApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(Error::Client)?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!("{}/mail/send", self.config.base_url.trim_end_matches('/'))
  }

  fn request_error(&self, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
      TransportError::Timeout(self.config.timeout)
    } else {
      TransportError::Request(Box::new(e))
    }
  }
}

impl MailTransport for HttpMailTransport {
  async fn send(
    &self,
    to: &SubscriberEmail,
    subject: &str,
    html_body: &str,
  ) -> Result<(), TransportError> {
    let body = SendBody {
      personalizations: [Personalization {
        to: [Address { email: to.as_str() }],
      }],
      from: Address { email: self.config.sender.as_str() },
      subject,
      content: [Content { content_type: "text/html", value: html_body }],
    };

    let resp = self
      .client
      .post(self.url())
      .bearer_auth(self.config.api_key.expose_secret())
      .json(&body)
      .send()
      .await
      .map_err(|e| self.request_error(e))?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      tracing::debug!(%status, %body, "mail API rejected message");
      return Err(TransportError::Rejected { status: status.as_u16(), body });
    }
    Ok(())
  }
}
