//! Handlers for `/admin` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/subscribers` | Every subscriber plus headline counts |
//! | `POST` | `/admin/campaigns/{content_id}/dispatch` | 404 unknown content, 422 nobody to send to |

use axum::{
  Json,
  extract::{Path, State},
};
use bulletin_core::{
  content::ContentProvider,
  delivery::DeliveryReport,
  mail::MailTransport,
  report::DeliverySummary,
  store::SubscriberStore,
  subscriber::{Subscriber, SubscriberCounts},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

/// A subscriber as shown to administrators, without its tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriberView {
  pub id:           Uuid,
  pub email:        String,
  pub name:         Option<String>,
  pub active:       bool,
  pub confirmed:    bool,
  pub confirmed_at: Option<DateTime<Utc>>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

impl From<Subscriber> for SubscriberView {
  fn from(s: Subscriber) -> Self {
    Self {
      id:           s.id,
      name:         s.display_name().map(str::to_owned),
      email:        s.email.into(),
      active:       s.active,
      confirmed:    s.confirmed,
      confirmed_at: s.confirmed_at,
      created_at:   s.created_at,
      updated_at:   s.updated_at,
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriberList {
  pub subscribers: Vec<SubscriberView>,
  pub counts:      SubscriberCounts,
}

/// `GET /admin/subscribers`
pub async fn list_subscribers<S, M, C>(
  State(state): State<AppState<S, M, C>>,
) -> Result<Json<SubscriberList>, ApiError>
where
  S: SubscriberStore,
  M: MailTransport + 'static,
  C: ContentProvider,
{
  let subscribers = state
    .subscriptions
    .store()
    .list_all()
    .await
    .map_err(|e| ApiError::Internal(Box::new(e)))?;

  let counts = SubscriberCounts::tally(&subscribers);
  Ok(Json(SubscriberList {
    subscribers: subscribers.into_iter().map(SubscriberView::from).collect(),
    counts,
  }))
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct DispatchResponse {
  pub summary: DeliverySummary,
  pub report:  DeliveryReport,
}

/// `POST /admin/campaigns/{content_id}/dispatch`
///
/// Sends the content to every active, confirmed subscriber. Answers once
/// every recipient has an outcome.
#[tracing::instrument(name = "Dispatch request", skip(state))]
pub async fn dispatch<S, M, C>(
  State(state): State<AppState<S, M, C>>,
  Path(content_id): Path<String>,
) -> Result<Json<DispatchResponse>, ApiError>
where
  S: SubscriberStore,
  M: MailTransport + 'static,
  C: ContentProvider,
{
  let campaign = state
    .content
    .campaign(&content_id)
    .await
    .map_err(|e| ApiError::Upstream(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("content {content_id} not found")))?;

  let recipients = state
    .subscriptions
    .store()
    .list_active_confirmed()
    .await
    .map_err(|e| ApiError::Internal(Box::new(e)))?;
  if recipients.is_empty() {
    return Err(ApiError::Unprocessable(
      "no active, confirmed subscribers to send to".to_owned(),
    ));
  }

  let report = state
    .delivery
    .dispatch_until(&campaign, recipients, state.shutdown.clone())
    .await;
  let summary = DeliverySummary::from(&report);
  tracing::info!(summary = %summary.message, "campaign dispatched");

  Ok(Json(DispatchResponse { summary, report }))
}
