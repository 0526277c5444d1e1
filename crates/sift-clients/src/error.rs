//! Error type for `sift-clients`.

use sift_core::Status;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Connection, timeout or body decoding failure.
  #[error("transport error: {0}")]
  Http(#[from] reqwest::Error),

  /// The registry answered with a non-2xx status.
  #[error("{method} → {status}: {message}")]
  Status {
    method:  &'static str,
    status:  Status,
    message: String,
  },
}

impl From<Error> for sift_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Status { status, message, .. } => match status {
        Status::NotFound
        | Status::AlreadyExists
        | Status::Unavailable
        | Status::InvalidArgument => status.into_error(message),
        Status::Unauthenticated | Status::Internal => Self::Internal(message),
      },
      other => Self::Internal(other.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  fn status(status: Status) -> sift_core::Error {
    Error::Status { method: "create", status, message: "m".into() }.into()
  }

  #[test]
  fn statuses_decode_to_domain_errors() {
    assert_eq!(status(Status::NotFound), sift_core::Error::NotFound("m".into()));
    assert_eq!(status(Status::AlreadyExists), sift_core::Error::Conflict("m".into()));
    assert_eq!(status(Status::Unavailable), sift_core::Error::ShouldRetry("m".into()));
    assert_eq!(status(Status::InvalidArgument), sift_core::Error::InvalidInput("m".into()));
    assert_eq!(status(Status::Unauthenticated), sift_core::Error::Internal("m".into()));
    assert_eq!(status(Status::Internal), sift_core::Error::Internal("m".into()));
  }
}
