//! Bounded retry of calls failing with [`Error::ShouldRetry`].

use std::{future::Future, time::Duration};

use sift_core::{Error, Result};
use tracing::debug;

/// Exponential backoff: `initial_delay`, doubling, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first. Zero behaves like one.
  pub attempts:      u32,
  pub initial_delay: Duration,
  pub max_delay:     Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      attempts:      5,
      initial_delay: Duration::from_millis(50),
      max_delay:     Duration::from_millis(1000),
    }
  }
}

impl RetryPolicy {
  /// Run `op` until it succeeds, fails with a non-retryable error, or the
  /// attempts are used up. The last error is returned as-is.
  pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let mut delay = self.initial_delay;
    let mut attempt = 1;
    loop {
      match op().await {
        Err(Error::ShouldRetry(reason)) if attempt < self.attempts => {
          debug!(what, attempt, ?delay, %reason, "retrying");
          tokio::time::sleep(delay).await;
          delay = (delay * 2).min(self.max_delay);
          attempt += 1;
        }
        other => return other,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  fn fast(attempts: u32) -> RetryPolicy {
    RetryPolicy {
      attempts,
      initial_delay: Duration::from_millis(1),
      max_delay: Duration::from_millis(2),
    }
  }

  #[tokio::test]
  async fn retries_until_success() {
    let calls = &AtomicU32::new(0);
    let out = fast(5)
      .run("op", move || async move {
        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
          Err(Error::ShouldRetry("locked".into()))
        } else {
          Ok(7)
        }
      })
      .await;
    assert_eq!(out, Ok(7));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn gives_up_after_attempts() {
    let calls = &AtomicU32::new(0);
    let out: Result<()> = fast(3)
      .run("op", move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::ShouldRetry("locked".into()))
      })
      .await;
    assert_eq!(out, Err(Error::ShouldRetry("locked".into())));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn other_errors_are_not_retried() {
    let calls = &AtomicU32::new(0);
    let out: Result<()> = fast(5)
      .run("op", move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::NotFound("gone".into()))
      })
      .await;
    assert!(out.unwrap_err().is_not_found());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
