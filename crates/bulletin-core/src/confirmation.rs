//! Confirmation and welcome emails.
//!
//! Both calls hand back the transport's result instead of logging it away.
//! Whether a failure matters is decided by the caller; the state machine in
//! [`crate::subscription`] treats both as best-effort.

use std::sync::Arc;

use crate::{
  mail::{MailTransport, TransportError},
  message::{self, Message},
  subscriber::Subscriber,
};

pub struct ConfirmationMailer<M> {
  transport: Arc<M>,
  base_url:  String,
}

impl<M: MailTransport> ConfirmationMailer<M> {
  /// `base_url` is the public origin the confirm and unsubscribe links point
  /// at, e.g. `https://news.example`.
  pub fn new(transport: Arc<M>, base_url: impl Into<String>) -> Self {
    Self { transport, base_url: base_url.into() }
  }

  #[tracing::instrument(
    name = "Sending confirmation email",
    skip_all,
    fields(subscriber_id = %subscriber.id)
  )]
  pub async fn send_confirmation(
    &self,
    subscriber: &Subscriber,
  ) -> Result<(), TransportError> {
    let message = message::confirmation(subscriber, &self.base_url);
    self.deliver(subscriber, &message).await
  }

  #[tracing::instrument(
    name = "Sending welcome email",
    skip_all,
    fields(subscriber_id = %subscriber.id)
  )]
  pub async fn send_welcome(&self, subscriber: &Subscriber) -> Result<(), TransportError> {
    let message = message::welcome(subscriber, &self.base_url);
    self.deliver(subscriber, &message).await
  }

  async fn deliver(
    &self,
    subscriber: &Subscriber,
    message: &Message,
  ) -> Result<(), TransportError> {
    self
      .transport
      .send(&subscriber.email, &message.subject, &message.html_body)
      .await
  }
}
