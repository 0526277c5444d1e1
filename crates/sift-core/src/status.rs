//! Wire status codes and their mapping to and from domain errors.
//!
//! Both API surfaces encode errors with [`Status::from`], and both external
//! service clients decode responses with [`Status::from_http_code`] followed
//! by [`Status::into_error`]. Keeping the table in one place guarantees the
//! two directions agree.

use strum::{AsRefStr, Display};

use crate::Error;

/// A non-OK wire status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
  InvalidArgument,
  AlreadyExists,
  NotFound,
  Unavailable,
  Unauthenticated,
  Internal,
}

impl Status {
  pub const ALL: [Status; 6] = [
    Status::InvalidArgument,
    Status::AlreadyExists,
    Status::NotFound,
    Status::Unavailable,
    Status::Unauthenticated,
    Status::Internal,
  ];

  /// The HTTP status code carrying this status.
  pub fn http_code(self) -> u16 {
    match self {
      Self::InvalidArgument => 400,
      Self::Unauthenticated => 401,
      Self::NotFound => 404,
      Self::AlreadyExists => 409,
      Self::Internal => 500,
      Self::Unavailable => 503,
    }
  }

  /// Classify a non-2xx HTTP status code. Unknown codes are `Internal`.
  pub fn from_http_code(code: u16) -> Self {
    match code {
      400 | 422 => Self::InvalidArgument,
      401 => Self::Unauthenticated,
      404 => Self::NotFound,
      409 => Self::AlreadyExists,
      429 | 503 => Self::Unavailable,
      _ => Self::Internal,
    }
  }

  /// Decode a status received from a peer into the domain error class.
  pub fn into_error(self, message: impl Into<String>) -> Error {
    let message = message.into();
    match self {
      Self::InvalidArgument => Error::InvalidInput(message),
      Self::AlreadyExists => Error::Conflict(message),
      Self::NotFound => Error::NotFound(message),
      Self::Unavailable => Error::ShouldRetry(message),
      Self::Unauthenticated => Error::Unauthenticated(message),
      Self::Internal => Error::Internal(message),
    }
  }
}

impl From<&Error> for Status {
  fn from(e: &Error) -> Self {
    match e {
      Error::InvalidCondition(_) | Error::InvalidGroup(_) | Error::InvalidInput(_) => {
        Self::InvalidArgument
      }
      Error::Conflict(_) => Self::AlreadyExists,
      Error::NotFound(_) => Self::NotFound,
      Error::ShouldRetry(_) => Self::Unavailable,
      Error::Unauthenticated(_) => Self::Unauthenticated,
      Error::Internal(_) => Self::Internal,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn domain_errors_map_to_one_status_each() {
    let cases = [
      (Error::InvalidCondition("x".into()), Status::InvalidArgument),
      (Error::InvalidGroup("x".into()), Status::InvalidArgument),
      (Error::InvalidInput("x".into()), Status::InvalidArgument),
      (Error::Conflict("x".into()), Status::AlreadyExists),
      (Error::NotFound("x".into()), Status::NotFound),
      (Error::ShouldRetry("x".into()), Status::Unavailable),
      (Error::Unauthenticated("x".into()), Status::Unauthenticated),
      (Error::Internal("x".into()), Status::Internal),
    ];
    for (err, status) in cases {
      assert_eq!(Status::from(&err), status, "{err}");
    }
  }

  #[test]
  fn every_status_decodes_back_to_its_class() {
    for status in Status::ALL {
      let err = status.into_error("boom");
      assert_eq!(Status::from(&err), status);
      assert_eq!(err.message(), "boom");
    }
  }

  #[test]
  fn http_codes_round_trip() {
    for status in Status::ALL {
      assert_eq!(Status::from_http_code(status.http_code()), status);
    }
    assert_eq!(Status::from_http_code(429), Status::Unavailable);
    assert_eq!(Status::from_http_code(418), Status::Internal);
  }

  #[test]
  fn display_uses_grpc_style_names() {
    assert_eq!(Status::InvalidArgument.to_string(), "INVALID_ARGUMENT");
    assert_eq!(Status::AlreadyExists.as_ref(), "ALREADY_EXISTS");
  }
}
