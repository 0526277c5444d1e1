//! Handlers for the private `/private/v1` endpoints.
//!
//! `search-by-condition` answers with a server-sent event stream: one
//! `match` event per interest, then a single `error` event if the scan
//! failed part way.

use std::convert::Infallible;

use axum::{
  extract::{Path, State},
  response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt as _, stream};
use sift_core::{
  interest::ConditionMatch,
  registry::{KiwiTree, TextConditions},
  store::InterestStore,
};
use sift_service::ConditionSelector;
use tokio::{sync::mpsc, task::JoinError};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};

use crate::{
  AppState, Json,
  error::{ApiError, ErrorBody},
  wire::{
    ConditionQueryBody, Empty, FollowersRequest, SearchByConditionRequest, StatsReply, WireMatch,
  },
};

// ─── Search by condition ─────────────────────────────────────────────────────

fn selector(body: ConditionQueryBody) -> Result<ConditionSelector, ApiError> {
  match (body.kiwi, body.id) {
    (Some(k), None) if !k.pattern.is_empty() => Ok(ConditionSelector::Kiwi {
      key:     k.key,
      pattern: k.pattern,
      partial: k.partial,
    }),
    (None, Some(id)) if !id.is_empty() => Ok(ConditionSelector::Id(id)),
    _ => Err(ApiError(sift_core::Error::InvalidInput(
      "cond must set exactly one of a non-empty kiwi query or id".to_owned(),
    ))),
  }
}

fn match_event(m: &ConditionMatch) -> Event {
  Event::default()
    .event("match")
    .json_data(WireMatch::from(m))
    .unwrap_or_else(|e| {
      error!(interest_id = %m.interest_id, error = %e, "failed to encode match");
      error_event(&sift_core::Error::Internal(e.to_string()))
    })
}

fn error_event(e: &sift_core::Error) -> Event {
  let body = ErrorBody::from_error(e);
  let data = serde_json::to_string(&body)
    .unwrap_or_else(|_| format!("{{\"code\":\"{}\"}}", body.code));
  Event::default().event("error").data(data)
}

/// The trailing event, if the scan did not finish cleanly.
fn outcome_event(joined: Result<sift_core::Result<u64>, JoinError>) -> Option<Event> {
  match joined {
    Ok(Ok(_)) => None,
    Ok(Err(e)) => {
      warn!(error = %e, "condition scan failed");
      Some(error_event(&e))
    }
    Err(e) => Some(error_event(&sift_core::Error::Internal(format!("scan task: {e}")))),
  }
}

/// `POST /private/v1/search-by-condition`
pub async fn search_by_condition<S, K, T>(
  State(state): State<AppState<S, K, T>>,
  Json(body): Json<SearchByConditionRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError>
where
  S: InterestStore + 'static,
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  let selector = selector(body.cond)?;
  let cursor = body.cursor;

  let (tx, rx) = mpsc::channel(state.settings.stream_buffer.max(1));
  let service = state.service.clone();
  let scan = tokio::spawn(async move {
    let mut tx = tx;
    service.search_by_condition(&selector, &cursor, &mut tx).await
  });

  let matches = ReceiverStream::new(rx).map(|m| Ok(match_event(&m)));
  let tail = stream::once(async move { outcome_event(scan.await) })
    .filter_map(|event| async move { event.map(Ok) });

  Ok(Sse::new(matches.chain(tail)).keep_alive(KeepAlive::default()))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// `POST /private/v1/interests/{id}/followers` with body `{"delta": n}`
pub async fn update_followers<S, K, T>(
  State(state): State<AppState<S, K, T>>,
  Path(id): Path<String>,
  Json(body): Json<FollowersRequest>,
) -> Result<axum::Json<Empty>, ApiError>
where
  S: InterestStore + 'static,
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  state.service.update_followers(&id, body.delta).await?;
  Ok(axum::Json(Empty {}))
}

/// `GET /private/v1/stats`
pub async fn stats<S, K, T>(
  State(state): State<AppState<S, K, T>>,
) -> Result<axum::Json<StatsReply>, ApiError>
where
  S: InterestStore + 'static,
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  let stats = state.service.stats().await?;
  Ok(axum::Json(StatsReply { count: stats.count, users_unique: stats.users_unique }))
}
