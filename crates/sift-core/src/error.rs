//! Domain error type shared by every sift crate.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  /// The condition tree breaks a root-level or leaf rule.
  #[error("invalid condition: {0}")]
  InvalidCondition(String),

  /// A group has fewer than two members or duplicate members.
  #[error("invalid group condition: {0}")]
  InvalidGroup(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("not found: {0}")]
  NotFound(String),

  /// Transient lock contention in an external service.
  #[error("should retry: {0}")]
  ShouldRetry(String),

  #[error("unauthenticated: {0}")]
  Unauthenticated(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl Error {
  /// The bare message without the kind prefix; this is what goes on the wire.
  pub fn message(&self) -> &str {
    match self {
      Self::InvalidCondition(m)
      | Self::InvalidGroup(m)
      | Self::InvalidInput(m)
      | Self::Conflict(m)
      | Self::NotFound(m)
      | Self::ShouldRetry(m)
      | Self::Unauthenticated(m)
      | Self::Internal(m) => m,
    }
  }

  pub fn is_retryable(&self) -> bool { matches!(self, Self::ShouldRetry(_)) }

  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
