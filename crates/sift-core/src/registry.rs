//! Narrow interfaces over the external condition registries.
//!
//! Pattern compilation and matching live outside this system. The service
//! only needs to register, pin, unpin and remove leaf payloads; every
//! method reports failures as domain [`Error`](crate::Error)s.

use std::future::Future;

use crate::Result;

/// Outcome of an idempotent `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
  /// This call created the entry; rollback must delete it.
  Created,
  /// The entry already existed; rollback must leave it alone.
  Existing,
}

impl Registration {
  pub fn is_fresh(self) -> bool { matches!(self, Self::Created) }
}

/// Result of registering a text term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRegistration {
  pub id:           String,
  /// The term as normalized by the registry.
  pub term:         String,
  pub registration: Registration,
}

/// A `(key, pattern)` wildcard registry.
pub trait KiwiTree: Send + Sync {
  /// Register a pattern. Idempotent for identical pairs; fails with
  /// `ShouldRetry` while the pair is locked.
  fn create<'a>(
    &'a self,
    key: &'a str,
    pattern: &'a str,
  ) -> impl Future<Output = Result<Registration>> + Send + 'a;

  /// Pin a registered pattern against deletion. `NotFound` if absent.
  fn lock_create<'a>(
    &'a self,
    key: &'a str,
    pattern: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Release the pin. Idempotent.
  fn unlock_create<'a>(
    &'a self,
    key: &'a str,
    pattern: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Remove a pattern. `NotFound` if absent.
  fn delete<'a>(
    &'a self,
    key: &'a str,
    pattern: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;
}

/// A free-text term registry.
pub trait TextConditions: Send + Sync {
  fn create<'a>(
    &'a self,
    key: &'a str,
    term: &'a str,
    exact: bool,
  ) -> impl Future<Output = Result<TextRegistration>> + Send + 'a;

  fn lock_create<'a>(&'a self, id: &'a str) -> impl Future<Output = Result<()>> + Send + 'a;

  fn unlock_create<'a>(&'a self, id: &'a str) -> impl Future<Output = Result<()>> + Send + 'a;

  fn delete<'a>(&'a self, id: &'a str) -> impl Future<Output = Result<()>> + Send + 'a;
}
