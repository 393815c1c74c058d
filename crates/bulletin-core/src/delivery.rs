//! Campaign fan-out.
//!
//! One campaign goes to many recipients, each in its own tokio task. A
//! semaphore bounds how many sends are in progress at once, and every send
//! runs under its own timeout, so one slow or failing recipient affects only
//! its own outcome.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{
  sync::{Semaphore, watch},
  task::JoinHandle,
};
use tracing::Instrument as _;

use crate::{
  content::Campaign,
  mail::{MailTransport, TransportError},
  message::{self, Message},
  subscriber::{Subscriber, SubscriberEmail},
};

pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Recorded for recipients that were still queued when dispatch was
/// cancelled.
pub const NOT_ATTEMPTED: &str = "not attempted: dispatch was cancelled";

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
  /// Upper bound on sends in progress at once. Zero is treated as one.
  pub concurrency:  usize,
  pub send_timeout: Duration,
  /// Public origin used to build each recipient's unsubscribe link.
  pub base_url:     String,
}

impl DeliveryConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      concurrency:  DEFAULT_CONCURRENCY,
      send_timeout: DEFAULT_SEND_TIMEOUT,
      base_url:     base_url.into(),
    }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientOutcome {
  pub email:   SubscriberEmail,
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error:   Option<String>,
}

impl RecipientOutcome {
  fn sent(email: SubscriberEmail) -> Self {
    Self { email, success: true, error: None }
  }

  fn failed(email: SubscriberEmail, error: impl Into<String>) -> Self {
    Self { email, success: false, error: Some(error.into()) }
  }
}

/// The aggregate result of one dispatch. Every recipient handed to the
/// engine appears in `recipients` exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
  pub total:      usize,
  pub successful: usize,
  pub failed:     usize,
  /// Set when dispatch stopped early; queued recipients are then failed
  /// with [`NOT_ATTEMPTED`].
  pub cancelled:  bool,
  pub recipients: Vec<RecipientOutcome>,
}

impl DeliveryReport {
  fn record(&mut self, outcome: RecipientOutcome) {
    self.total += 1;
    if outcome.success {
      self.successful += 1;
    } else {
      self.failed += 1;
    }
    self.recipients.push(outcome);
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct DeliveryEngine<M> {
  transport: Arc<M>,
  config:    DeliveryConfig,
}

impl<M> DeliveryEngine<M>
where
  M: MailTransport + 'static,
{
  pub fn new(transport: Arc<M>, config: DeliveryConfig) -> Self {
    Self { transport, config }
  }

  pub fn config(&self) -> &DeliveryConfig { &self.config }

  /// Send `campaign` to every recipient, at most once each.
  pub async fn dispatch(
    &self,
    campaign: &Campaign,
    recipients: Vec<Subscriber>,
  ) -> DeliveryReport {
    let (_never, cancel) = watch::channel(false);
    self.dispatch_until(campaign, recipients, cancel).await
  }

  /// Like [`dispatch`](Self::dispatch), but stops starting new sends once
  /// `cancel` becomes `true`. Sends already handed to the transport finish
  /// and are recorded. If the returned future is dropped, those sends still
  /// run to completion in the background.
  #[tracing::instrument(
    name = "Dispatching campaign",
    skip_all,
    fields(title = %campaign.title, recipients = recipients.len())
  )]
  pub async fn dispatch_until(
    &self,
    campaign: &Campaign,
    recipients: Vec<Subscriber>,
    mut cancel: watch::Receiver<bool>,
  ) -> DeliveryReport {
    let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
    let mut queue = recipients.into_iter();
    let mut in_flight: Vec<(SubscriberEmail, JoinHandle<_>)> = Vec::new();
    let mut not_attempted = Vec::new();
    let mut cancelled = false;

    while let Some(subscriber) = queue.next() {
      let permit = tokio::select! {
        biased;
        () = cancellation(&mut cancel) => None,
        permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
      };
      let Some(permit) = permit else {
        cancelled = true;
        not_attempted.push(subscriber.email);
        break;
      };

      let message = message::campaign(campaign, &subscriber, &self.config.base_url);
      let transport = Arc::clone(&self.transport);
      let timeout = self.config.send_timeout;
      let email = subscriber.email.clone();
      let span = tracing::debug_span!("send", recipient = %email);
      let handle = tokio::spawn(
        async move {
          let result = attempt(&*transport, &email, &message, timeout).await;
          drop(permit);
          result
        }
        .instrument(span),
      );
      in_flight.push((subscriber.email, handle));
    }

    if cancelled {
      not_attempted.extend(queue.map(|s| s.email));
      tracing::warn!(
        skipped = not_attempted.len(),
        "dispatch cancelled; remaining recipients not attempted"
      );
    }

    let mut report = DeliveryReport { cancelled, ..DeliveryReport::default() };
    for (email, handle) in in_flight {
      let outcome = match handle.await {
        Ok(Ok(())) => RecipientOutcome::sent(email),
        Ok(Err(e)) => {
          tracing::warn!(recipient = %email, error = %e, "campaign send failed");
          RecipientOutcome::failed(email, e.to_string())
        }
        Err(e) => RecipientOutcome::failed(email, format!("send task failed: {e}")),
      };
      report.record(outcome);
    }
    for email in not_attempted {
      report.record(RecipientOutcome::failed(email, NOT_ATTEMPTED));
    }

    tracing::info!(
      total = report.total,
      successful = report.successful,
      failed = report.failed,
      cancelled = report.cancelled,
      "dispatch finished"
    );
    report
  }
}

async fn attempt<M: MailTransport>(
  transport: &M,
  to: &SubscriberEmail,
  message: &Message,
  timeout: Duration,
) -> Result<(), TransportError> {
  tokio::time::timeout(timeout, transport.send(to, &message.subject, &message.html_body))
    .await
    .map_err(|_| TransportError::Timeout(timeout))?
}

/// Resolves once `cancel` holds `true`. A dropped sender can never cancel,
/// so in that case this never resolves.
async fn cancellation(cancel: &mut watch::Receiver<bool>) {
  if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
    std::future::pending::<()>().await;
  }
}
