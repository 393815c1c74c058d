//! In-process fakes for the store and mail transport.

use std::{
  collections::HashSet,
  sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  mail::{MailTransport, TransportError},
  store::{StoreError, SubscriberStore, UniqueField},
  subscriber::{NewSubscriber, Subscriber, SubscriberEmail},
  token::{OsTokenIssuer, Token, TokenSource},
};

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MemoryStoreError {
  #[error("{0} is already taken")]
  Conflict(UniqueField),
  #[error("no subscriber with id {0}")]
  NotFound(Uuid),
}

impl StoreError for MemoryStoreError {
  fn conflict(&self) -> Option<UniqueField> {
    match self {
      Self::Conflict(field) => Some(*field),
      Self::NotFound(_) => None,
    }
  }
}

/// A `Vec` behind a mutex. Uniqueness is checked and the row inserted under a
/// single lock, the same guarantee a `UNIQUE` constraint gives.
#[derive(Default)]
pub struct MemoryStore {
  rows:              Mutex<Vec<Subscriber>>,
  hide_email_lookup: AtomicBool,
}

impl MemoryStore {
  pub fn len(&self) -> usize { self.rows.lock().unwrap().len() }

  pub fn get(&self, email: &str) -> Option<Subscriber> {
    self
      .rows
      .lock()
      .unwrap()
      .iter()
      .find(|s| s.email.as_str() == email)
      .cloned()
  }

  pub fn snapshot(&self) -> Vec<Subscriber> { self.rows.lock().unwrap().clone() }

  /// Make the next `find_by_email` miss, as if another request inserted the
  /// row just after the lookup.
  pub fn hide_next_email_lookup(&self) {
    self.hide_email_lookup.store(true, Ordering::SeqCst);
  }

  /// Insert a pending subscriber directly, bypassing the state machine.
  pub fn insert_pending(&self, email: &str) -> Subscriber {
    let now = Utc::now();
    let subscriber = Subscriber {
      id: Uuid::new_v4(),
      email: SubscriberEmail::parse(email).unwrap(),
      name: None,
      active: true,
      confirmed: false,
      confirmation_token: OsTokenIssuer.issue(),
      confirmed_at: None,
      unsubscribe_token: OsTokenIssuer.issue(),
      created_at: now,
      updated_at: now,
    };
    self.rows.lock().unwrap().push(subscriber.clone());
    subscriber
  }

  fn find(&self, pred: impl Fn(&Subscriber) -> bool) -> Option<Subscriber> {
    self.rows.lock().unwrap().iter().find(|s| pred(s)).cloned()
  }
}

impl SubscriberStore for MemoryStore {
  type Error = MemoryStoreError;

  async fn find_by_email(
    &self,
    email: &SubscriberEmail,
  ) -> Result<Option<Subscriber>, Self::Error> {
    if self.hide_email_lookup.swap(false, Ordering::SeqCst) {
      return Ok(None);
    }
    Ok(self.find(|s| s.email == *email))
  }

  async fn find_by_confirmation_token(
    &self,
    token: &Token,
  ) -> Result<Option<Subscriber>, Self::Error> {
    Ok(self.find(|s| s.confirmation_token == *token))
  }

  async fn find_by_unsubscribe_token(
    &self,
    token: &Token,
  ) -> Result<Option<Subscriber>, Self::Error> {
    Ok(self.find(|s| s.unsubscribe_token == *token))
  }

  async fn create(&self, input: NewSubscriber) -> Result<Subscriber, Self::Error> {
    let mut rows = self.rows.lock().unwrap();
    for row in rows.iter() {
      if row.email == input.email {
        return Err(MemoryStoreError::Conflict(UniqueField::Email));
      }
      if row.confirmation_token == input.confirmation_token {
        return Err(MemoryStoreError::Conflict(UniqueField::ConfirmationToken));
      }
      if row.unsubscribe_token == input.unsubscribe_token {
        return Err(MemoryStoreError::Conflict(UniqueField::UnsubscribeToken));
      }
    }
    let now = Utc::now();
    let subscriber = Subscriber {
      id: Uuid::new_v4(),
      email: input.email,
      name: input.name,
      active: true,
      confirmed: false,
      confirmation_token: input.confirmation_token,
      confirmed_at: None,
      unsubscribe_token: input.unsubscribe_token,
      created_at: now,
      updated_at: now,
    };
    rows.push(subscriber.clone());
    Ok(subscriber)
  }

  async fn save(&self, subscriber: &Subscriber) -> Result<(), Self::Error> {
    let mut rows = self.rows.lock().unwrap();
    let row = rows
      .iter_mut()
      .find(|s| s.id == subscriber.id)
      .ok_or(MemoryStoreError::NotFound(subscriber.id))?;
    row.name = subscriber.name.clone();
    row.active = subscriber.active;
    row.confirmed = subscriber.confirmed;
    row.confirmed_at = subscriber.confirmed_at;
    row.updated_at = subscriber.updated_at;
    Ok(())
  }

  async fn list_active_confirmed(&self) -> Result<Vec<Subscriber>, Self::Error> {
    Ok(
      self
        .rows
        .lock()
        .unwrap()
        .iter()
        .filter(|s| s.is_eligible())
        .cloned()
        .collect(),
    )
  }

  async fn list_all(&self) -> Result<Vec<Subscriber>, Self::Error> {
    Ok(self.snapshot())
  }
}

// ─── Transport ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
  pub to:        String,
  pub subject:   String,
  pub html_body: String,
}

/// Records every message it is asked to send.
///
/// Sends to addresses registered with [`fail_for`](Self::fail_for) are
/// rejected; sends to addresses registered with [`hang_for`](Self::hang_for)
/// never complete. Neither is recorded in [`sent`](Self::sent).
#[derive(Default)]
pub struct RecordingTransport {
  sent:      Mutex<Vec<SentMail>>,
  failing:   Mutex<HashSet<String>>,
  hanging:   Mutex<HashSet<String>>,
  delay:     Option<Duration>,
  in_flight: AtomicUsize,
  peak:      AtomicUsize,
}

impl RecordingTransport {
  /// Hold every send open for `delay` before it completes.
  pub fn with_delay(delay: Duration) -> Self {
    Self { delay: Some(delay), ..Self::default() }
  }

  pub fn fail_for(&self, email: &str) {
    self.failing.lock().unwrap().insert(email.to_owned());
  }

  pub fn hang_for(&self, email: &str) {
    self.hanging.lock().unwrap().insert(email.to_owned());
  }

  pub fn sent(&self) -> Vec<SentMail> { self.sent.lock().unwrap().clone() }

  pub fn sent_to(&self) -> HashSet<String> {
    self.sent().into_iter().map(|m| m.to).collect()
  }

  /// The most sends that were ever in progress at once.
  pub fn peak(&self) -> usize { self.peak.load(Ordering::SeqCst) }
}

impl MailTransport for RecordingTransport {
  async fn send(
    &self,
    to: &SubscriberEmail,
    subject: &str,
    html_body: &str,
  ) -> Result<(), TransportError> {
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
    let result = self.deliver(to, subject, html_body).await;
    self.in_flight.fetch_sub(1, Ordering::SeqCst);
    result
  }
}

impl RecordingTransport {
  async fn deliver(
    &self,
    to: &SubscriberEmail,
    subject: &str,
    html_body: &str,
  ) -> Result<(), TransportError> {
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    let hangs = self.hanging.lock().unwrap().contains(to.as_str());
    if hangs {
      std::future::pending::<()>().await;
    }
    let fails = self.failing.lock().unwrap().contains(to.as_str());
    if fails {
      return Err(TransportError::Rejected {
        status: 550,
        body:   format!("mailbox {to} unavailable"),
      });
    }
    self.sent.lock().unwrap().push(SentMail {
      to:        to.to_string(),
      subject:   subject.to_owned(),
      html_body: html_body.to_owned(),
    });
    Ok(())
  }
}

/// Build an eligible (active, confirmed) subscriber for `email`.
pub fn eligible(email: &str) -> Subscriber {
  let now = Utc::now();
  Subscriber {
    id: Uuid::new_v4(),
    email: SubscriberEmail::parse(email).unwrap(),
    name: None,
    active: true,
    confirmed: true,
    confirmation_token: OsTokenIssuer.issue(),
    confirmed_at: Some(now),
    unsubscribe_token: OsTokenIssuer.issue(),
    created_at: now,
    updated_at: now,
  }
}
