//! JSON HTTP API for Bulletin.
//!
//! Exposes an axum [`Router`] over the subscription state machine and the
//! campaign delivery engine. Admin authentication and TLS are the caller's
//! responsibility.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/newsletter/subscribe` | Body: `{"email":"…","name":"…"}` |
//! | `GET`  | `/newsletter/confirm/{token}` | |
//! | `GET`  | `/newsletter/unsubscribe/{token}` | |
//! | `GET`  | `/admin/subscribers` | |
//! | `POST` | `/admin/campaigns/{content_id}/dispatch` | |
//! | `GET`  | `/health` | |

pub mod admin;
pub mod error;
pub mod newsletter;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post},
};
use bulletin_core::{
  confirmation::ConfirmationMailer,
  content::ContentProvider,
  delivery::{DeliveryConfig, DeliveryEngine},
  mail::MailTransport,
  store::SubscriberStore,
  subscription::Subscriptions,
};
use serde_json::{Value, json};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, M, C> {
  pub subscriptions: Arc<Subscriptions<S, M>>,
  pub delivery:      Arc<DeliveryEngine<M>>,
  pub content:       Arc<C>,
  /// Flips to `true` when the server is shutting down; running dispatches
  /// stop starting new sends.
  pub shutdown:      watch::Receiver<bool>,
}

impl<S, M, C> AppState<S, M, C>
where
  S: SubscriberStore,
  M: MailTransport + 'static,
  C: ContentProvider,
{
  pub fn new(
    store: Arc<S>,
    transport: Arc<M>,
    content: Arc<C>,
    delivery: DeliveryConfig,
  ) -> Self {
    let mailer = ConfirmationMailer::new(transport.clone(), delivery.base_url.clone());
    // With the sender gone, this receiver never reports a shutdown.
    let (_, shutdown) = watch::channel(false);
    Self {
      subscriptions: Arc::new(Subscriptions::new(store, mailer)),
      delivery: Arc::new(DeliveryEngine::new(transport, delivery)),
      content,
      shutdown,
    }
  }

  pub fn with_shutdown(self, shutdown: watch::Receiver<bool>) -> Self {
    Self { shutdown, ..self }
  }
}

impl<S, M, C> Clone for AppState<S, M, C> {
  fn clone(&self) -> Self {
    Self {
      subscriptions: Arc::clone(&self.subscriptions),
      delivery:      Arc::clone(&self.delivery),
      content:       Arc::clone(&self.content),
      shutdown:      self.shutdown.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
pub fn router<S, M, C>(state: AppState<S, M, C>) -> Router
where
  S: SubscriberStore + 'static,
  M: MailTransport + 'static,
  C: ContentProvider + 'static,
{
  Router::new()
    // Public subscription flow
    .route("/newsletter/subscribe", post(newsletter::subscribe::<S, M, C>))
    .route("/newsletter/confirm/{token}", get(newsletter::confirm::<S, M, C>))
    .route("/newsletter/unsubscribe/{token}", get(newsletter::unsubscribe::<S, M, C>))
    // Admin
    .route("/admin/subscribers", get(admin::list_subscribers::<S, M, C>))
    .route(
      "/admin/campaigns/{content_id}/dispatch",
      post(admin::dispatch::<S, M, C>),
    )
    .route("/health", get(health))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
