//! HTTP surfaces for sift.
//!
//! [`public_router`] serves owner-scoped CRUD under `/v1/interests`;
//! [`private_router`] serves the streaming condition scan and internal
//! helpers under `/private/v1`. Both are backed by one
//! [`sift_service::Service`] and are meant to be bound to separate ports.

pub mod auth;
pub mod error;
pub mod private;
pub mod public;
pub mod wire;

use std::{future::Future, sync::Arc, time::Duration};

use axum::{
  Router,
  extract::{FromRequest, FromRequestParts},
  routing::{get, post},
};
use sift_core::{
  condition::LeafKind,
  registry::{KiwiTree, TextConditions},
  store::InterestStore,
};
use sift_service::Service;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Settings / state ────────────────────────────────────────────────────────

/// Request-handling knobs shared by both surfaces.
#[derive(Debug, Clone)]
pub struct ApiSettings {
  /// Group used when `x-group-id` is absent.
  pub default_group_id:  String,
  /// Leaf kinds the public surface accepts on input.
  pub public_leaf_kinds: Vec<LeafKind>,
  /// Deadline for unary public calls.
  pub request_timeout:   Duration,
  /// Matches buffered between a scan and its SSE response.
  pub stream_buffer:     usize,
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self {
      default_group_id:  "default".to_owned(),
      public_leaf_kinds: vec![LeafKind::Kiwi, LeafKind::KiwiTree, LeafKind::Text],
      request_timeout:   Duration::from_secs(30),
      stream_buffer:     16,
    }
  }
}

/// Shared state threaded through all axum handlers.
pub struct AppState<S, K, T> {
  pub service:  Service<S, K, T>,
  pub settings: Arc<ApiSettings>,
}

impl<S, K, T> Clone for AppState<S, K, T> {
  fn clone(&self) -> Self {
    Self { service: self.service.clone(), settings: self.settings.clone() }
  }
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// `axum::Json` with rejections encoded as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

/// `axum::extract::Query` with rejections encoded as [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

/// Run `fut` under the request deadline; running out maps to
/// `ShouldRetry` so callers see `UNAVAILABLE`.
pub(crate) async fn deadline<R>(
  limit: Duration,
  fut: impl Future<Output = sift_core::Result<R>>,
) -> Result<R, ApiError> {
  match tokio::time::timeout(limit, fut).await {
    Ok(result) => Ok(result?),
    Err(_) => Err(ApiError(sift_core::Error::ShouldRetry(
      "request deadline exceeded".to_owned(),
    ))),
  }
}

// ─── Routers ─────────────────────────────────────────────────────────────────

/// Owner-scoped CRUD.
pub fn public_router<S, K, T>(state: AppState<S, K, T>) -> Router<()>
where
  S: InterestStore + 'static,
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  Router::new()
    .route(
      "/v1/interests",
      get(public::search::<S, K, T>).post(public::create::<S, K, T>),
    )
    .route(
      "/v1/interests/{id}",
      get(public::read::<S, K, T>)
        .put(public::update::<S, K, T>)
        .delete(public::delete::<S, K, T>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Condition scan and internal helpers. Not user-scoped.
pub fn private_router<S, K, T>(state: AppState<S, K, T>) -> Router<()>
where
  S: InterestStore + 'static,
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  Router::new()
    .route(
      "/private/v1/search-by-condition",
      post(private::search_by_condition::<S, K, T>),
    )
    .route(
      "/private/v1/interests/{id}/followers",
      post(private::update_followers::<S, K, T>),
    )
    .route("/private/v1/stats", get(private::stats::<S, K, T>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests;
