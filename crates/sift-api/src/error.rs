//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure leaves the server as `{"code": "<STATUS>", "message": …}`
//! with the HTTP status of [`Status::http_code`].

use axum::{
  Json,
  extract::rejection::{JsonRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;
use sift_core::Status;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub sift_core::Error);

/// Error body, also used as the payload of a terminal SSE `error` event.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
  pub code:    String,
  pub message: String,
}

impl ErrorBody {
  /// Internal errors are logged here and reach the caller without detail.
  pub fn from_error(e: &sift_core::Error) -> Self {
    let status = Status::from(e);
    let message = match status {
      Status::Internal => {
        error!(error = %e, "internal error");
        "internal error".to_owned()
      }
      _ => e.message().to_owned(),
    };
    Self { code: status.to_string(), message }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = StatusCode::from_u16(Status::from(&self.0).http_code())
      .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorBody::from_error(&self.0))).into_response()
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self(sift_core::Error::InvalidInput(rejection.body_text()))
  }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self {
    Self(sift_core::Error::InvalidInput(rejection.body_text()))
  }
}
