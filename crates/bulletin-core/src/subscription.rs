//! The subscription state machine.
//!
//! ```text
//! absent ──subscribe──▶ pending ──confirm──▶ confirmed
//!                  active ──unsubscribe──▶ inactive
//! ```
//!
//! `confirmed` never goes back to `false`, and `active` only comes back
//! through administrative action outside this crate. Every transition reads
//! and writes through the [`SubscriberStore`]; tokens come from an explicit
//! [`TokenSource`] rather than from defaults in the data model.

use std::sync::Arc;

use chrono::Utc;

use crate::{
  Error, Result,
  confirmation::ConfirmationMailer,
  mail::MailTransport,
  store::{StoreError as _, SubscriberStore, UniqueField},
  subscriber::{NewSubscriber, Subscriber, SubscriberEmail, SubscriberName},
  token::{MAX_TOKEN_ATTEMPTS, OsTokenIssuer, Token, TokenSource},
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeOutcome {
  /// A new pending subscriber was created and a confirmation email sent.
  Pending(Subscriber),
  /// The email was already pending; the original link was sent again.
  ConfirmationResent(Subscriber),
}

impl SubscribeOutcome {
  pub fn subscriber(&self) -> &Subscriber {
    match self {
      Self::Pending(s) | Self::ConfirmationResent(s) => s,
    }
  }

  pub fn message(&self) -> &'static str {
    match self {
      Self::Pending(_) => {
        "Subscription pending. Please check your inbox to confirm it."
      }
      Self::ConfirmationResent(_) => {
        "Confirmation email resent. Please check your inbox."
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
  Confirmed(Subscriber),
  /// The token had already been used; nothing changed.
  AlreadyConfirmed(Subscriber),
}

impl ConfirmOutcome {
  pub fn subscriber(&self) -> &Subscriber {
    match self {
      Self::Confirmed(s) | Self::AlreadyConfirmed(s) => s,
    }
  }

  pub fn message(&self) -> &'static str {
    match self {
      Self::Confirmed(_) => "Subscription confirmed. Welcome aboard!",
      Self::AlreadyConfirmed(_) => "Subscription already confirmed.",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
  Unsubscribed(Subscriber),
  AlreadyInactive(Subscriber),
}

impl UnsubscribeOutcome {
  pub fn subscriber(&self) -> &Subscriber {
    match self {
      Self::Unsubscribed(s) | Self::AlreadyInactive(s) => s,
    }
  }

  pub fn message(&self) -> &'static str {
    match self {
      Self::Unsubscribed(_) => "You have been unsubscribed.",
      Self::AlreadyInactive(_) => "You were already unsubscribed.",
    }
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct Subscriptions<S, M, T = OsTokenIssuer> {
  store:  Arc<S>,
  mailer: ConfirmationMailer<M>,
  tokens: T,
}

impl<S, M> Subscriptions<S, M>
where
  S: SubscriberStore,
  M: MailTransport,
{
  pub fn new(store: Arc<S>, mailer: ConfirmationMailer<M>) -> Self {
    Self::with_token_source(store, mailer, OsTokenIssuer)
  }
}

impl<S, M, T> Subscriptions<S, M, T>
where
  S: SubscriberStore,
  M: MailTransport,
  T: TokenSource,
{
  pub fn with_token_source(
    store: Arc<S>,
    mailer: ConfirmationMailer<M>,
    tokens: T,
  ) -> Self {
    Self { store, mailer, tokens }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Start (or resume) a double opt-in for `email`.
  #[tracing::instrument(name = "Subscribing", skip(self, name))]
  pub async fn subscribe(
    &self,
    email: &str,
    name: Option<&str>,
  ) -> Result<SubscribeOutcome> {
    let email = SubscriberEmail::parse(email)?;
    let name = name.map(SubscriberName::parse).transpose()?.flatten();

    if let Some(existing) = self.find_by_email(&email).await? {
      return self.resume(existing).await;
    }

    match self.create_pending(&email, name).await? {
      Some(subscriber) => {
        tracing::info!(subscriber_id = %subscriber.id, "new pending subscriber");
        self.notify_confirmation(&subscriber).await;
        Ok(SubscribeOutcome::Pending(subscriber))
      }
      None => {
        // A concurrent signup inserted the same email between our lookup and
        // our insert; continue from the record it created.
        let existing = self.find_by_email(&email).await?.ok_or_else(|| {
          Error::Persistence(
            format!("{email} was reported as taken but could not be read back")
              .into(),
          )
        })?;
        self.resume(existing).await
      }
    }
  }

  /// Complete the double opt-in for the subscriber holding `token`.
  #[tracing::instrument(name = "Confirming subscription", skip_all)]
  pub async fn confirm(&self, token: &str) -> Result<ConfirmOutcome> {
    let token = presented(token)?;
    let mut subscriber = self
      .store
      .find_by_confirmation_token(&token)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::InvalidToken)?;

    if subscriber.confirmed {
      return Ok(ConfirmOutcome::AlreadyConfirmed(subscriber));
    }

    let now = Utc::now();
    subscriber.confirmed = true;
    subscriber.confirmed_at = Some(now);
    subscriber.updated_at = now;
    self.store.save(&subscriber).await.map_err(Error::persistence)?;
    tracing::info!(subscriber_id = %subscriber.id, "subscription confirmed");

    // Best-effort: the confirmation stands even if the welcome is lost.
    if let Err(e) = self.mailer.send_welcome(&subscriber).await {
      tracing::warn!(
        subscriber_id = %subscriber.id,
        error = %e,
        "welcome email not delivered"
      );
    }

    Ok(ConfirmOutcome::Confirmed(subscriber))
  }

  /// Deactivate the subscriber holding `token`.
  #[tracing::instrument(name = "Unsubscribing", skip_all)]
  pub async fn unsubscribe(&self, token: &str) -> Result<UnsubscribeOutcome> {
    let token = presented(token)?;
    let mut subscriber = self
      .store
      .find_by_unsubscribe_token(&token)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::InvalidToken)?;

    if !subscriber.active {
      return Ok(UnsubscribeOutcome::AlreadyInactive(subscriber));
    }

    subscriber.active = false;
    subscriber.updated_at = Utc::now();
    self.store.save(&subscriber).await.map_err(Error::persistence)?;
    tracing::info!(subscriber_id = %subscriber.id, "subscriber deactivated");

    Ok(UnsubscribeOutcome::Unsubscribed(subscriber))
  }

  async fn find_by_email(&self, email: &SubscriberEmail) -> Result<Option<Subscriber>> {
    self.store.find_by_email(email).await.map_err(Error::persistence)
  }

  /// A signup for an email the store already knows.
  ///
  /// Confirmed emails are refused whether or not they are still active, so an
  /// unsubscribed reader cannot come back through this path.
  async fn resume(&self, existing: Subscriber) -> Result<SubscribeOutcome> {
    if existing.confirmed {
      return Err(Error::AlreadySubscribed(existing.email.to_string()));
    }
    self.notify_confirmation(&existing).await;
    Ok(SubscribeOutcome::ConfirmationResent(existing))
  }

  /// Insert a pending subscriber with freshly issued tokens.
  ///
  /// Token collisions are retried with new tokens up to
  /// [`MAX_TOKEN_ATTEMPTS`] times. Returns `Ok(None)` if the email itself is
  /// already taken.
  async fn create_pending(
    &self,
    email: &SubscriberEmail,
    name: Option<SubscriberName>,
  ) -> Result<Option<Subscriber>> {
    for attempt in 1..=MAX_TOKEN_ATTEMPTS {
      let input = NewSubscriber {
        email:              email.clone(),
        name:               name.clone(),
        confirmation_token: self.tokens.issue(),
        unsubscribe_token:  self.tokens.issue(),
      };

      let err = match self.store.create(input).await {
        Ok(subscriber) => return Ok(Some(subscriber)),
        Err(err) => err,
      };

      match err.conflict() {
        Some(UniqueField::Email) => return Ok(None),
        Some(field) => {
          tracing::warn!(attempt, %field, "issued token already in use; reissuing");
        }
        None => return Err(Error::persistence(err)),
      }
    }
    Err(Error::TokenCollision(MAX_TOKEN_ATTEMPTS))
  }

  /// Send the confirmation email, deliberately ignoring the outcome: the
  /// subscribe result depends only on the state transition.
  async fn notify_confirmation(&self, subscriber: &Subscriber) {
    if let Err(e) = self.mailer.send_confirmation(subscriber).await {
      tracing::warn!(
        subscriber_id = %subscriber.id,
        error = %e,
        "confirmation email not delivered"
      );
    }
  }
}

/// Tokens are compared exactly; only empty input is refused up front.
fn presented(token: &str) -> Result<Token> {
  if token.is_empty() {
    return Err(Error::InvalidToken);
  }
  Ok(Token::from(token.to_owned()))
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::testing::{MemoryStore, RecordingTransport};

  const BASE: &str = "https://news.example";

  type Service = Subscriptions<MemoryStore, RecordingTransport>;

  fn service() -> (Service, Arc<MemoryStore>, Arc<RecordingTransport>) {
    let store = Arc::new(MemoryStore::default());
    let transport = Arc::new(RecordingTransport::default());
    let mailer = ConfirmationMailer::new(transport.clone(), BASE);
    (Subscriptions::new(store.clone(), mailer), store, transport)
  }

  /// Replays a fixed script of tokens, then falls back to the OS issuer.
  struct ScriptedTokens(Mutex<Vec<&'static str>>);

  impl TokenSource for ScriptedTokens {
    fn issue(&self) -> Token {
      match self.0.lock().unwrap().pop() {
        Some(t) => Token::from(t.to_string()),
        None => OsTokenIssuer.issue(),
      }
    }
  }

  fn scripted(tokens: &[&'static str]) -> ScriptedTokens {
    // Popped from the back, so reverse to issue in the given order.
    ScriptedTokens(Mutex::new(tokens.iter().rev().copied().collect()))
  }

  // ── subscribe ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn subscribe_creates_a_pending_record_and_sends_confirmation() {
    let (svc, store, transport) = service();

    let outcome = svc.subscribe("Ana@X.com", Some("Ana")).await.unwrap();

    let SubscribeOutcome::Pending(subscriber) = outcome else {
      panic!("expected a new pending subscriber");
    };
    assert_eq!(subscriber.email.as_str(), "ana@x.com");
    assert!(subscriber.active);
    assert!(!subscriber.confirmed);
    assert!(subscriber.confirmed_at.is_none());
    assert_ne!(subscriber.confirmation_token, subscriber.unsubscribe_token);
    assert_eq!(store.len(), 1);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html_body.contains(&format!(
      "{BASE}/newsletter/confirm/{}",
      subscriber.confirmation_token
    )));
  }

  #[tokio::test]
  async fn subscribing_twice_while_pending_resends_the_same_token() {
    let (svc, store, transport) = service();

    let first = svc.subscribe("ana@x.com", None).await.unwrap();
    let second = svc.subscribe("ANA@x.com", None).await.unwrap();

    assert!(matches!(second, SubscribeOutcome::ConfirmationResent(_)));
    assert_eq!(store.len(), 1);
    assert_eq!(
      first.subscriber().confirmation_token,
      second.subscriber().confirmation_token
    );
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].html_body, sent[1].html_body);
  }

  #[tokio::test]
  async fn subscribing_a_confirmed_email_conflicts_even_when_inactive() {
    let (svc, store, _) = service();
    let pending = svc.subscribe("ana@x.com", None).await.unwrap();
    let token = pending.subscriber().confirmation_token.clone();
    svc.confirm(token.as_str()).await.unwrap();

    let err = svc.subscribe("ana@x.com", None).await.unwrap_err();
    assert!(matches!(err, Error::AlreadySubscribed(_)));

    let unsub = pending.subscriber().unsubscribe_token.clone();
    svc.unsubscribe(unsub.as_str()).await.unwrap();

    let err = svc.subscribe("ana@x.com", None).await.unwrap_err();
    assert!(matches!(err, Error::AlreadySubscribed(_)));
    assert_eq!(store.len(), 1);
  }

  #[tokio::test]
  async fn subscribe_rejects_invalid_input_without_touching_the_store() {
    let (svc, store, transport) = service();

    let long_name = "a".repeat(257);
    for (email, name) in [
      ("", None),
      ("not-an-email", None),
      ("a@x.com", Some(long_name.as_str())),
    ] {
      let err = svc.subscribe(email, name).await.unwrap_err();
      assert!(matches!(err, Error::Validation(_)), "{email:?} {name:?}");
    }
    assert_eq!(store.len(), 0);
    assert!(transport.sent().is_empty());
  }

  #[tokio::test]
  async fn names_with_punctuation_are_accepted() {
    let (svc, store, transport) = service();

    for (email, name) in [
      ("ana@x.com", "Ana (Editor)"),
      ("annie@x.com", "Ana \"Annie\" Silva"),
      ("sj@x.com", "Smith/Jones"),
    ] {
      let outcome = svc.subscribe(email, Some(name)).await.unwrap();
      assert!(matches!(outcome, SubscribeOutcome::Pending(_)), "{name:?}");
      assert_eq!(store.get(email).unwrap().display_name(), Some(name));
    }
    assert_eq!(transport.sent().len(), 3);
    assert!(transport.sent()[0].html_body.contains("Ana (Editor)"));
  }

  #[tokio::test]
  async fn subscribe_succeeds_when_the_confirmation_email_fails() {
    let (svc, store, transport) = service();
    transport.fail_for("ana@x.com");

    let outcome = svc.subscribe("ana@x.com", None).await.unwrap();

    assert!(matches!(outcome, SubscribeOutcome::Pending(_)));
    assert_eq!(store.len(), 1);
  }

  #[tokio::test]
  async fn token_collisions_are_retried_with_fresh_tokens() {
    let store = Arc::new(MemoryStore::default());
    let transport = Arc::new(RecordingTransport::default());
    let seed = Subscriptions::with_token_source(
      store.clone(),
      ConfirmationMailer::new(transport.clone(), BASE),
      scripted(&["taken-c", "taken-u"]),
    );
    seed.subscribe("first@x.com", None).await.unwrap();

    // First attempt reuses the taken confirmation token.
    let svc = Subscriptions::with_token_source(
      store.clone(),
      ConfirmationMailer::new(transport, BASE),
      scripted(&["taken-c", "fresh-u", "fresh-c", "fresh-u2"]),
    );
    let outcome = svc.subscribe("second@x.com", None).await.unwrap();

    assert_eq!(outcome.subscriber().confirmation_token.as_str(), "fresh-c");
    assert_eq!(outcome.subscriber().unsubscribe_token.as_str(), "fresh-u2");
    assert_eq!(store.len(), 2);
  }

  #[tokio::test]
  async fn persistent_token_collisions_fail_after_the_retry_bound() {
    let store = Arc::new(MemoryStore::default());
    let transport = Arc::new(RecordingTransport::default());
    let seed = Subscriptions::with_token_source(
      store.clone(),
      ConfirmationMailer::new(transport.clone(), BASE),
      scripted(&["dup-c", "dup-u"]),
    );
    seed.subscribe("first@x.com", None).await.unwrap();

    let svc = Subscriptions::with_token_source(
      store.clone(),
      ConfirmationMailer::new(transport, BASE),
      scripted(&["dup-c", "a", "dup-c", "b", "dup-c", "c", "spare-c", "spare-u"]),
    );
    let err = svc.subscribe("second@x.com", None).await.unwrap_err();

    assert!(matches!(err, Error::TokenCollision(MAX_TOKEN_ATTEMPTS)));
    assert_eq!(store.len(), 1);
  }

  #[tokio::test]
  async fn a_lost_insert_race_is_treated_as_an_existing_signup() {
    let (svc, store, transport) = service();
    // Simulate another request inserting the row after our lookup.
    store.hide_next_email_lookup();
    store.insert_pending("ana@x.com");

    let outcome = svc.subscribe("ana@x.com", None).await.unwrap();

    assert!(matches!(outcome, SubscribeOutcome::ConfirmationResent(_)));
    assert_eq!(store.len(), 1);
    assert_eq!(transport.sent().len(), 1);
  }

  // ── confirm ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn confirm_sets_confirmed_once_and_welcomes_once() {
    let (svc, store, transport) = service();
    let pending = svc.subscribe("ana@x.com", None).await.unwrap();
    let token = pending.subscriber().confirmation_token.clone();

    let first = svc.confirm(token.as_str()).await.unwrap();
    let ConfirmOutcome::Confirmed(confirmed) = &first else {
      panic!("expected first confirmation");
    };
    assert!(confirmed.confirmed);
    let confirmed_at = confirmed.confirmed_at.expect("confirmed_at set");

    let again = svc.confirm(token.as_str()).await.unwrap();
    assert!(matches!(again, ConfirmOutcome::AlreadyConfirmed(_)));
    assert_eq!(again.subscriber().confirmed_at, Some(confirmed_at));

    let stored = store.get("ana@x.com").unwrap();
    assert!(stored.confirmed);
    assert_eq!(stored.confirmed_at, Some(confirmed_at));

    // confirmation + one welcome
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].subject, "Welcome to the newsletter");
  }

  #[tokio::test]
  async fn confirm_with_an_unknown_token_changes_nothing() {
    let (svc, store, _) = service();
    svc.subscribe("ana@x.com", None).await.unwrap();
    let before = store.snapshot();

    for token in ["nope", "", "   "] {
      let err = svc.confirm(token).await.unwrap_err();
      assert!(matches!(err, Error::InvalidToken));
    }
    assert_eq!(store.snapshot(), before);
  }

  #[tokio::test]
  async fn tokens_must_match_exactly() {
    let (svc, store, _) = service();
    let pending = svc.subscribe("ana@x.com", None).await.unwrap();
    let s = pending.subscriber().clone();

    for padded in [
      format!("{}  ", s.confirmation_token),
      format!(" {}", s.confirmation_token),
      s.confirmation_token.as_str().to_uppercase(),
    ] {
      let err = svc.confirm(&padded).await.unwrap_err();
      assert!(matches!(err, Error::InvalidToken), "{padded:?}");
    }
    let err = svc
      .unsubscribe(&format!("{}\n", s.unsubscribe_token))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidToken));

    let stored = store.get("ana@x.com").unwrap();
    assert!(!stored.confirmed);
    assert!(stored.active);
  }

  #[tokio::test]
  async fn confirm_succeeds_when_the_welcome_email_fails() {
    let (svc, store, transport) = service();
    let pending = svc.subscribe("ana@x.com", None).await.unwrap();
    transport.fail_for("ana@x.com");

    let token = pending.subscriber().confirmation_token.clone();
    let outcome = svc.confirm(token.as_str()).await.unwrap();

    assert!(matches!(outcome, ConfirmOutcome::Confirmed(_)));
    assert!(store.get("ana@x.com").unwrap().confirmed);
  }

  // ── unsubscribe ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unsubscribe_deactivates_and_is_idempotent() {
    let (svc, store, _) = service();
    let pending = svc.subscribe("ana@x.com", None).await.unwrap();
    let token = pending.subscriber().unsubscribe_token.clone();

    let first = svc.unsubscribe(token.as_str()).await.unwrap();
    assert!(matches!(first, UnsubscribeOutcome::Unsubscribed(_)));
    assert!(!store.get("ana@x.com").unwrap().active);

    let again = svc.unsubscribe(token.as_str()).await.unwrap();
    assert!(matches!(again, UnsubscribeOutcome::AlreadyInactive(_)));
    assert!(!store.get("ana@x.com").unwrap().active);
  }

  #[tokio::test]
  async fn unsubscribe_with_an_unknown_token_is_rejected() {
    let (svc, _, _) = service();
    let err = svc.unsubscribe("missing").await.unwrap_err();
    assert!(matches!(err, Error::InvalidToken));
  }

  #[tokio::test]
  async fn unsubscribing_keeps_the_confirmed_flag() {
    let (svc, store, _) = service();
    let pending = svc.subscribe("ana@x.com", None).await.unwrap();
    let s = pending.subscriber().clone();
    svc.confirm(s.confirmation_token.as_str()).await.unwrap();

    svc.unsubscribe(s.unsubscribe_token.as_str()).await.unwrap();

    let stored = store.get("ana@x.com").unwrap();
    assert!(stored.confirmed);
    assert!(!stored.active);
    assert_eq!(stored.unsubscribe_token, s.unsubscribe_token);
  }
}
