//! Handlers for the public `/v1/interests` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/v1/interests` | Body `{md, cond}`; `201 {id}` |
//! | `GET`    | `/v1/interests/{id}` | Own or public interest |
//! | `PUT`    | `/v1/interests/{id}` | Body `{md}`; the condition is immutable |
//! | `DELETE` | `/v1/interests/{id}` | |
//! | `GET`    | `/v1/interests` | Cursored id listing |

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use sift_core::{
  interest::InterestData,
  registry::{KiwiTree, TextConditions},
  store::{self, Cursor, InterestStore, Order, Sort},
};
use tracing::debug;

use crate::{
  AppState, Json, Query,
  auth::Caller,
  deadline,
  error::ApiError,
  wire::{
    CreateReply, CreateRequest, Empty, ReadReply, SearchReply, UpdateRequest, WireCondition,
    WireMetadata,
  },
};

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /v1/interests`
pub async fn create<S, K, T>(
  State(state): State<AppState<S, K, T>>,
  Caller(owner): Caller,
  Json(body): Json<CreateRequest>,
) -> Result<impl IntoResponse, ApiError>
where
  S: InterestStore + 'static,
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  let condition = body.cond.decode(&state.settings.public_leaf_kinds)?;
  let data = InterestData { metadata: body.md.into_metadata(), condition };
  let id = deadline(state.settings.request_timeout, state.service.create(&owner, data)).await?;
  Ok((StatusCode::CREATED, axum::Json(CreateReply { id })))
}

// ─── Read ────────────────────────────────────────────────────────────────────

/// `GET /v1/interests/{id}`
pub async fn read<S, K, T>(
  State(state): State<AppState<S, K, T>>,
  Caller(owner): Caller,
  Path(id): Path<String>,
) -> Result<axum::Json<ReadReply>, ApiError>
where
  S: InterestStore + 'static,
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  let interest = deadline(state.settings.request_timeout, state.service.read(&id, &owner)).await?;
  Ok(axum::Json(ReadReply {
    md:   WireMetadata::from(&interest.data.metadata),
    cond: WireCondition::from(&interest.data.condition),
  }))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PUT /v1/interests/{id}`
pub async fn update<S, K, T>(
  State(state): State<AppState<S, K, T>>,
  Caller(owner): Caller,
  Path(id): Path<String>,
  Json(body): Json<UpdateRequest>,
) -> Result<axum::Json<Empty>, ApiError>
where
  S: InterestStore + 'static,
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  let metadata = body.md.into_metadata();
  deadline(
    state.settings.request_timeout,
    state.service.update_metadata(&id, &owner, metadata),
  )
  .await?;
  Ok(axum::Json(Empty {}))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /v1/interests/{id}`
pub async fn delete<S, K, T>(
  State(state): State<AppState<S, K, T>>,
  Caller(owner): Caller,
  Path(id): Path<String>,
) -> Result<axum::Json<Empty>, ApiError>
where
  S: InterestStore + 'static,
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  deadline(state.settings.request_timeout, state.service.delete(&id, &owner)).await?;
  Ok(axum::Json(Empty {}))
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchParams {
  /// Id of the last interest of the previous page.
  pub cursor:           String,
  /// Follower count of `cursor`, used if it has since been deleted.
  pub cursor_followers: i64,
  pub limit:            u32,
  pub sort:             Sort,
  pub order:            Order,
  /// Substring of the description.
  pub pattern:          Option<String>,
  pub include_public:   bool,
  pub private_only:     bool,
}

/// `GET /v1/interests?cursor=&limit=&sort=&order=&pattern=&includePublic=&privateOnly=`
pub async fn search<S, K, T>(
  State(state): State<AppState<S, K, T>>,
  Caller(owner): Caller,
  Query(params): Query<SearchParams>,
) -> Result<axum::Json<SearchReply>, ApiError>
where
  S: InterestStore + 'static,
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  debug!(?params, "search own");
  let query = store::Query {
    owner,
    limit: params.limit,
    sort: params.sort,
    order: params.order,
    pattern: params.pattern,
    include_public: params.include_public,
    private_only: params.private_only,
  };
  let cursor = Cursor { id: params.cursor, followers: params.cursor_followers };
  let ids = deadline(
    state.settings.request_timeout,
    state.service.search_own(query, &cursor),
  )
  .await?;
  Ok(axum::Json(SearchReply { ids }))
}
