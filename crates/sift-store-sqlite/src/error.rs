//! Error type for `sift-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] sift_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored condition document is not a valid condition tree.
  #[error("malformed condition document: {0}")]
  MalformedCondition(String),

  /// Absent, or not visible to the requesting owner.
  #[error("interest not found: {0}")]
  InterestNotFound(String),

  #[error("interest already exists: {0}")]
  Duplicate(String),

  #[error("follower count of {0} cannot go below zero")]
  NegativeFollowers(String),
}

impl Error {
  /// Whether the underlying SQLite error is a uniqueness violation.
  pub(crate) fn is_unique_violation(e: &tokio_rusqlite::Error) -> bool {
    matches!(
      e,
      tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _))
        if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
          || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
  }
}

impl From<Error> for sift_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(inner) => inner,
      Error::InterestNotFound(id) => Self::NotFound(format!("interest {id} not found")),
      Error::Duplicate(id) => Self::Conflict(format!("interest {id} already exists")),
      Error::NegativeFollowers(id) => {
        Self::InvalidInput(format!("follower count of {id} cannot go below zero"))
      }
      other => Self::Internal(other.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
