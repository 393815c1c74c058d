//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and UUIDs as hyphenated lowercase
//! strings. Booleans use SQLite's native 0/1 integers.

use bulletin_core::{
  subscriber::{Subscriber, SubscriberEmail, SubscriberName},
  token::Token,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawSubscriber::from_row`].
pub const SUBSCRIBER_COLUMNS: &str = "id, email, name, active, confirmed, \
  confirmation_token, confirmed_at, unsubscribe_token, created_at, updated_at";

/// Raw values read directly from a `subscribers` row.
pub struct RawSubscriber {
  pub id:                 String,
  pub email:              String,
  pub name:               Option<String>,
  pub active:             bool,
  pub confirmed:          bool,
  pub confirmation_token: String,
  pub confirmed_at:       Option<String>,
  pub unsubscribe_token:  String,
  pub created_at:         String,
  pub updated_at:         String,
}

impl RawSubscriber {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                 row.get(0)?,
      email:              row.get(1)?,
      name:               row.get(2)?,
      active:             row.get(3)?,
      confirmed:          row.get(4)?,
      confirmation_token: row.get(5)?,
      confirmed_at:       row.get(6)?,
      unsubscribe_token:  row.get(7)?,
      created_at:         row.get(8)?,
      updated_at:         row.get(9)?,
    })
  }

  pub fn into_subscriber(self) -> Result<Subscriber> {
    let name = match self.name.as_deref() {
      Some(raw) => SubscriberName::parse(raw)?,
      None => None,
    };
    Ok(Subscriber {
      id: decode_uuid(&self.id)?,
      email: SubscriberEmail::parse(&self.email)?,
      name,
      active: self.active,
      confirmed: self.confirmed,
      confirmation_token: Token::from(self.confirmation_token),
      confirmed_at: self.confirmed_at.as_deref().map(decode_dt).transpose()?,
      unsubscribe_token: Token::from(self.unsubscribe_token),
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
