//! The subscriber record and the validated values it is built from.
//!
//! A subscriber is created pending (active, unconfirmed) and is only ever
//! mutated by the confirm and unsubscribe transitions in
//! [`crate::subscription`]. Nothing in this module fills in defaults or issues
//! tokens; that is the state machine's job.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::{Error, Result, token::Token};

const MAX_NAME_GRAPHEMES: usize = 256;

// ─── Email ───────────────────────────────────────────────────────────────────

/// A syntactically valid email address in canonical form (trimmed and
/// lower-cased). Two addresses that differ only in case are the same
/// subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
  pub fn parse(raw: &str) -> Result<Self> {
    let canonical = raw.trim().to_lowercase();
    if canonical.is_empty() {
      return Err(Error::Validation("email is required".into()));
    }
    if !validator::validate_email(canonical.as_str()) {
      return Err(Error::Validation(format!(
        "{raw:?} is not a valid email address"
      )));
    }
    Ok(Self(canonical))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl AsRef<str> for SubscriberEmail {
  fn as_ref(&self) -> &str { &self.0 }
}

impl fmt::Display for SubscriberEmail {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl TryFrom<String> for SubscriberEmail {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<SubscriberEmail> for String {
  fn from(email: SubscriberEmail) -> Self { email.0 }
}

// ─── Name ────────────────────────────────────────────────────────────────────

/// An optional display name supplied at signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberName(String);

impl SubscriberName {
  /// Parse a display name. A blank name is not an error: it means the
  /// subscriber gave none, so `Ok(None)` is returned.
  pub fn parse(raw: &str) -> Result<Option<Self>> {
    let name = raw.trim();
    if name.is_empty() {
      return Ok(None);
    }
    if name.graphemes(true).count() > MAX_NAME_GRAPHEMES {
      return Err(Error::Validation(format!(
        "name is longer than {MAX_NAME_GRAPHEMES} characters"
      )));
    }
    Ok(Some(Self(name.to_owned())))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl AsRef<str> for SubscriberName {
  fn as_ref(&self) -> &str { &self.0 }
}

// ─── Subscriber ──────────────────────────────────────────────────────────────

/// One newsletter recipient and its consent state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
  /// Assigned by the store on creation.
  pub id:                 Uuid,
  pub email:              SubscriberEmail,
  pub name:               Option<SubscriberName>,
  /// `false` once the subscriber has unsubscribed.
  pub active:             bool,
  /// `false` until the double opt-in link is followed. Never reset.
  pub confirmed:          bool,
  pub confirmation_token: Token,
  /// Set exactly once, by the confirm transition.
  pub confirmed_at:       Option<DateTime<Utc>>,
  /// Issued at creation and never reissued.
  pub unsubscribe_token:  Token,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
}

impl Subscriber {
  /// Only active, confirmed subscribers receive campaigns.
  pub fn is_eligible(&self) -> bool { self.active && self.confirmed }

  /// Still waiting on the double opt-in.
  pub fn is_pending(&self) -> bool { self.active && !self.confirmed }

  /// The name to greet the subscriber with, if they gave one.
  pub fn display_name(&self) -> Option<&str> {
    self.name.as_ref().map(SubscriberName::as_str)
  }
}

/// Input to [`crate::store::SubscriberStore::create`].
///
/// The store persists the record as active and unconfirmed, assigning `id`
/// and the audit timestamps itself.
#[derive(Debug, Clone)]
pub struct NewSubscriber {
  pub email:              SubscriberEmail,
  pub name:               Option<SubscriberName>,
  pub confirmation_token: Token,
  pub unsubscribe_token:  Token,
}

// ─── Counts ──────────────────────────────────────────────────────────────────

/// Headline numbers for the admin subscriber listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberCounts {
  pub total:            usize,
  pub active_confirmed: usize,
  /// Active but not yet confirmed.
  pub pending:          usize,
  pub inactive:         usize,
}

impl SubscriberCounts {
  pub fn tally<'a>(subscribers: impl IntoIterator<Item = &'a Subscriber>) -> Self {
    subscribers
      .into_iter()
      .fold(Self::default(), |mut counts, s| {
        counts.total += 1;
        if !s.active {
          counts.inactive += 1;
        } else if s.confirmed {
          counts.active_confirmed += 1;
        } else {
          counts.pending += 1;
        }
        counts
      })
  }
}
