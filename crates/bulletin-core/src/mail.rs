//! The mail transport capability.

use std::{future::Future, time::Duration};

use thiserror::Error;

use crate::subscriber::SubscriberEmail;

#[derive(Debug, Error)]
pub enum TransportError {
  #[error("mail API rejected the message with status {status}: {body}")]
  Rejected { status: u16, body: String },

  #[error("mail request failed: {0}")]
  Request(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("mail send timed out after {0:?}")]
  Timeout(Duration),
}

/// Something that can transmit one HTML email to one recipient.
///
/// Injected into the confirmation and delivery services so they can be
/// exercised without a real mail provider.
pub trait MailTransport: Send + Sync {
  fn send<'a>(
    &'a self,
    to: &'a SubscriberEmail,
    subject: &'a str,
    html_body: &'a str,
  ) -> impl Future<Output = Result<(), TransportError>> + Send + 'a;
}
