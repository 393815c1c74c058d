//! Handlers for the public `/newsletter` endpoints.
//!
//! Responses never include tokens; those only travel by email.

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
};
use bulletin_core::{
  content::ContentProvider,
  mail::MailTransport,
  store::SubscriberStore,
  subscription::{ConfirmOutcome, SubscribeOutcome, UnsubscribeOutcome},
};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

/// Body of every successful `/newsletter` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
  pub status:  String,
  pub message: String,
}

impl StatusBody {
  fn new(status: &str, message: &str) -> Json<Self> {
    Json(Self { status: status.to_owned(), message: message.to_owned() })
  }
}

// ─── Subscribe ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubscribeBody {
  /// Missing and empty are both reported as a validation error.
  #[serde(default)]
  pub email: String,
  pub name:  Option<String>,
}

/// `POST /newsletter/subscribe`: 201 for a new signup, 200 when the
/// confirmation was resent.
pub async fn subscribe<S, M, C>(
  State(state): State<AppState<S, M, C>>,
  body: Result<Json<SubscribeBody>, JsonRejection>,
) -> Result<(StatusCode, Json<StatusBody>), ApiError>
where
  S: SubscriberStore,
  M: MailTransport + 'static,
  C: ContentProvider,
{
  let Json(body) = body?;
  let outcome = state
    .subscriptions
    .subscribe(&body.email, body.name.as_deref())
    .await?;

  let (status, label) = match outcome {
    SubscribeOutcome::Pending(_) => (StatusCode::CREATED, "pending"),
    SubscribeOutcome::ConfirmationResent(_) => (StatusCode::OK, "confirmation_resent"),
  };
  Ok((status, StatusBody::new(label, outcome.message())))
}

// ─── Confirm ─────────────────────────────────────────────────────────────────

/// `GET /newsletter/confirm/{token}`
pub async fn confirm<S, M, C>(
  State(state): State<AppState<S, M, C>>,
  Path(token): Path<String>,
) -> Result<Json<StatusBody>, ApiError>
where
  S: SubscriberStore,
  M: MailTransport + 'static,
  C: ContentProvider,
{
  let outcome = state.subscriptions.confirm(&token).await?;
  let label = match outcome {
    ConfirmOutcome::Confirmed(_) => "confirmed",
    ConfirmOutcome::AlreadyConfirmed(_) => "already_confirmed",
  };
  Ok(StatusBody::new(label, outcome.message()))
}

// ─── Unsubscribe ─────────────────────────────────────────────────────────────

/// `GET /newsletter/unsubscribe/{token}`
pub async fn unsubscribe<S, M, C>(
  State(state): State<AppState<S, M, C>>,
  Path(token): Path<String>,
) -> Result<Json<StatusBody>, ApiError>
where
  S: SubscriberStore,
  M: MailTransport + 'static,
  C: ContentProvider,
{
  let outcome = state.subscriptions.unsubscribe(&token).await?;
  let label = match outcome {
    UnsubscribeOutcome::Unsubscribed(_) => "unsubscribed",
    UnsubscribeOutcome::AlreadyInactive(_) => "already_inactive",
  };
  Ok(StatusBody::new(label, outcome.message()))
}
