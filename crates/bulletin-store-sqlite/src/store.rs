//! [`SqliteStore`], the SQLite implementation of [`SubscriberStore`].

use std::path::Path;

use bulletin_core::{
  store::{SubscriberStore, UniqueField},
  subscriber::{NewSubscriber, Subscriber, SubscriberEmail},
  token::Token,
};
use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawSubscriber, SUBSCRIBER_COLUMNS, encode_dt, encode_uuid},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A subscriber store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  pub(crate) async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn conn_for_tests(&self) -> &tokio_rusqlite::Connection { &self.conn }

  /// Fetch the single subscriber whose `column` equals `value`.
  async fn find_by(
    &self,
    column: &'static str,
    value: String,
  ) -> Result<Option<Subscriber>> {
    let sql = format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE {column} = ?1");

    let raw: Option<RawSubscriber> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![value], RawSubscriber::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubscriber::into_subscriber).transpose()
  }

  /// Fetch every subscriber matching `filter`, oldest first.
  async fn list_where(&self, filter: &'static str) -> Result<Vec<Subscriber>> {
    let sql = format!(
      "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE {filter} \
       ORDER BY created_at, rowid"
    );

    let raws: Vec<RawSubscriber> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawSubscriber::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubscriber::into_subscriber).collect()
  }
}

// ─── Constraint errors ───────────────────────────────────────────────────────

/// Turn a `UNIQUE` violation into [`Error::Conflict`]; anything else stays a
/// database error.
pub(crate) fn classify(e: tokio_rusqlite::Error) -> Error {
  if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(code, Some(msg))) =
    &e
    && code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    && let Some(field) = unique_field(msg)
  {
    return Error::Conflict(field);
  }
  Error::Database(e)
}

/// SQLite reports e.g. `UNIQUE constraint failed: subscribers.email`.
fn unique_field(message: &str) -> Option<UniqueField> {
  match message.rsplit('.').next()? {
    "email" => Some(UniqueField::Email),
    "confirmation_token" => Some(UniqueField::ConfirmationToken),
    "unsubscribe_token" => Some(UniqueField::UnsubscribeToken),
    _ => None,
  }
}

// ─── SubscriberStore impl ────────────────────────────────────────────────────

impl SubscriberStore for SqliteStore {
  type Error = Error;

  async fn find_by_email(&self, email: &SubscriberEmail) -> Result<Option<Subscriber>> {
    self.find_by("email", email.to_string()).await
  }

  async fn find_by_confirmation_token(&self, token: &Token) -> Result<Option<Subscriber>> {
    self.find_by("confirmation_token", token.to_string()).await
  }

  async fn find_by_unsubscribe_token(&self, token: &Token) -> Result<Option<Subscriber>> {
    self.find_by("unsubscribe_token", token.to_string()).await
  }

  async fn create(&self, input: NewSubscriber) -> Result<Subscriber> {
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

    let id_str       = encode_uuid(subscriber.id);
    let email        = subscriber.email.to_string();
    let name         = subscriber.name.as_ref().map(|n| n.as_str().to_owned());
    let confirmation = subscriber.confirmation_token.to_string();
    let unsubscribe  = subscriber.unsubscribe_token.to_string();
    let at_str       = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subscribers (
             id, email, name, active, confirmed,
             confirmation_token, confirmed_at, unsubscribe_token,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, 1, 0, ?4, NULL, ?5, ?6, ?6)",
          rusqlite::params![id_str, email, name, confirmation, unsubscribe, at_str],
        )?;
        Ok(())
      })
      .await
      .map_err(classify)?;

    Ok(subscriber)
  }

  async fn save(&self, subscriber: &Subscriber) -> Result<()> {
    let id           = subscriber.id;
    let id_str       = encode_uuid(id);
    let name         = subscriber.name.as_ref().map(|n| n.as_str().to_owned());
    let active       = subscriber.active;
    let confirmed    = subscriber.confirmed;
    let confirmed_at = subscriber.confirmed_at.map(encode_dt);
    let updated_at   = encode_dt(subscriber.updated_at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE subscribers
              SET name = ?2, active = ?3, confirmed = ?4,
                  confirmed_at = ?5, updated_at = ?6
            WHERE id = ?1",
          rusqlite::params![id_str, name, active, confirmed, confirmed_at, updated_at],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::SubscriberNotFound(id));
    }
    Ok(())
  }

  async fn list_active_confirmed(&self) -> Result<Vec<Subscriber>> {
    self.list_where("active = 1 AND confirmed = 1").await
  }

  async fn list_all(&self) -> Result<Vec<Subscriber>> {
    self.list_where("1 = 1").await
  }
}
