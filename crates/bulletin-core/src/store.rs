//! The `SubscriberStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `bulletin-store-sqlite`). The state machine and the HTTP layer depend on
//! this abstraction, not on any concrete backend.

use std::{fmt, future::Future};

use crate::{
  subscriber::{NewSubscriber, Subscriber, SubscriberEmail},
  token::Token,
};

/// A column the store keeps unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
  Email,
  ConfirmationToken,
  UnsubscribeToken,
}

impl fmt::Display for UniqueField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Email => "email",
      Self::ConfirmationToken => "confirmation_token",
      Self::UnsubscribeToken => "unsubscribe_token",
    })
  }
}

/// Errors returned by a [`SubscriberStore`].
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The unique field whose constraint rejected a write, if that is why the
  /// write failed.
  fn conflict(&self) -> Option<UniqueField>;
}

/// Abstraction over subscriber persistence.
///
/// Email lookups are case-insensitive. Uniqueness of the email and of both
/// tokens is enforced by the store itself as part of [`create`], never by a
/// separate read beforehand.
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers and spawned tasks.
///
/// [`create`]: SubscriberStore::create
pub trait SubscriberStore: Send + Sync {
  type Error: StoreError;

  fn find_by_email<'a>(
    &'a self,
    email: &'a SubscriberEmail,
  ) -> impl Future<Output = Result<Option<Subscriber>, Self::Error>> + Send + 'a;

  fn find_by_confirmation_token<'a>(
    &'a self,
    token: &'a Token,
  ) -> impl Future<Output = Result<Option<Subscriber>, Self::Error>> + Send + 'a;

  fn find_by_unsubscribe_token<'a>(
    &'a self,
    token: &'a Token,
  ) -> impl Future<Output = Result<Option<Subscriber>, Self::Error>> + Send + 'a;

  /// Insert a new active, unconfirmed subscriber.
  ///
  /// Fails with an error whose [`StoreError::conflict`] names the offending
  /// field if the email or either token is already taken.
  fn create(
    &self,
    input: NewSubscriber,
  ) -> impl Future<Output = Result<Subscriber, Self::Error>> + Send + '_;

  /// Persist the mutable fields (`name`, `active`, `confirmed`,
  /// `confirmed_at`, `updated_at`) of an existing subscriber.
  fn save<'a>(
    &'a self,
    subscriber: &'a Subscriber,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Every subscriber eligible for campaign delivery.
  fn list_active_confirmed(
    &self,
  ) -> impl Future<Output = Result<Vec<Subscriber>, Self::Error>> + Send + '_;

  /// Every subscriber, oldest first.
  fn list_all(
    &self,
  ) -> impl Future<Output = Result<Vec<Subscriber>, Self::Error>> + Send + '_;
}
