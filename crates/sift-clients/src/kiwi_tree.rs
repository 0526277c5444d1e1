//! Client for a kiwi-tree `(key, pattern)` registry.

use serde::Serialize;
use sift_core::registry::{KiwiTree, Registration};
use tracing::debug;

use crate::{
  http::{ClientConfig, Transport},
  Result,
};

#[derive(Serialize)]
struct PatternBody<'a> {
  key:     &'a str,
  pattern: &'a str,
}

/// HTTP implementation of [`KiwiTree`].
#[derive(Clone)]
pub struct HttpKiwiTree {
  transport: Transport,
}

impl HttpKiwiTree {
  pub fn new(config: &ClientConfig) -> Result<Self> {
    Ok(Self { transport: Transport::new(config)? })
  }

  async fn unit(&self, method: &'static str, key: &str, pattern: &str) -> sift_core::Result<()> {
    self.transport.call(method, &PatternBody { key, pattern }).await?;
    Ok(())
  }
}

impl KiwiTree for HttpKiwiTree {
  async fn create(&self, key: &str, pattern: &str) -> sift_core::Result<Registration> {
    let resp = self.transport.call("create", &PatternBody { key, pattern }).await?;
    let registration = if Transport::is_created(&resp) {
      Registration::Created
    } else {
      Registration::Existing
    };
    debug!(key, pattern, ?registration, "kiwi-tree create");
    Ok(registration)
  }

  async fn lock_create(&self, key: &str, pattern: &str) -> sift_core::Result<()> {
    self.unit("lock-create", key, pattern).await
  }

  async fn unlock_create(&self, key: &str, pattern: &str) -> sift_core::Result<()> {
    self.unit("unlock-create", key, pattern).await
  }

  async fn delete(&self, key: &str, pattern: &str) -> sift_core::Result<()> {
    self.unit("delete", key, pattern).await
  }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
  };

  use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
  };
  use serde::Deserialize;
  use serde_json::{json, Value};
  use sift_core::Error;

  use super::*;
  use crate::testing::serve;

  #[derive(Deserialize)]
  struct Body {
    key:     String,
    pattern: String,
  }

  /// `(key, pattern)` → locked.
  type Patterns = Arc<Mutex<HashMap<(String, String), bool>>>;

  fn reply(code: StatusCode, body: Value) -> (StatusCode, Json<Value>) { (code, Json(body)) }

  fn mock() -> Router {
    let patterns: Patterns = Arc::default();
    Router::new()
      .route(
        "/v1/create",
        post(|State(p): State<Patterns>, Json(b): Json<Body>| async move {
          let mut p = p.lock().unwrap();
          match p.get(&(b.key.clone(), b.pattern.clone())) {
            Some(true) => reply(
              StatusCode::SERVICE_UNAVAILABLE,
              json!({"code": "UNAVAILABLE", "message": "pattern is locked"}),
            ),
            Some(false) => reply(StatusCode::OK, json!({})),
            None => {
              p.insert((b.key, b.pattern), false);
              reply(StatusCode::CREATED, json!({}))
            }
          }
        }),
      )
      .route(
        "/v1/lock-create",
        post(|State(p): State<Patterns>, Json(b): Json<Body>| async move {
          match p.lock().unwrap().get_mut(&(b.key, b.pattern)) {
            Some(locked) => {
              *locked = true;
              reply(StatusCode::OK, json!({}))
            }
            None => reply(StatusCode::NOT_FOUND, json!({"code": "NOT_FOUND", "message": "no such pattern"})),
          }
        }),
      )
      .route(
        "/v1/unlock-create",
        post(|State(p): State<Patterns>, Json(b): Json<Body>| async move {
          if let Some(locked) = p.lock().unwrap().get_mut(&(b.key, b.pattern)) {
            *locked = false;
          }
          reply(StatusCode::OK, json!({}))
        }),
      )
      .route(
        "/v1/delete",
        post(|State(p): State<Patterns>, Json(b): Json<Body>| async move {
          match p.lock().unwrap().remove(&(b.key, b.pattern)) {
            Some(_) => reply(StatusCode::OK, json!({})),
            None => reply(StatusCode::NOT_FOUND, json!({"code": "NOT_FOUND", "message": "no such pattern"})),
          }
        }),
      )
      .with_state(patterns)
  }

  async fn client() -> HttpKiwiTree {
    let base = serve(mock()).await;
    HttpKiwiTree::new(&ClientConfig::new(base, Duration::from_secs(5))).unwrap()
  }

  #[tokio::test]
  async fn create_reports_freshness() {
    let c = client().await;
    assert_eq!(c.create("k", "p*").await.unwrap(), Registration::Created);
    assert_eq!(c.create("k", "p*").await.unwrap(), Registration::Existing);
  }

  #[tokio::test]
  async fn create_on_locked_pattern_should_retry() {
    let c = client().await;
    c.create("k", "p").await.unwrap();
    c.lock_create("k", "p").await.unwrap();

    let err = c.create("k", "p").await.unwrap_err();
    assert_eq!(err, Error::ShouldRetry("pattern is locked".into()));

    c.unlock_create("k", "p").await.unwrap();
    assert_eq!(c.create("k", "p").await.unwrap(), Registration::Existing);
  }

  #[tokio::test]
  async fn lock_and_delete_missing_are_not_found() {
    let c = client().await;
    assert!(c.lock_create("k", "none").await.unwrap_err().is_not_found());
    assert!(c.delete("k", "none").await.unwrap_err().is_not_found());
    c.unlock_create("k", "none").await.unwrap();
  }

  #[tokio::test]
  async fn delete_then_create_is_fresh_again() {
    let c = client().await;
    c.create("k", "p").await.unwrap();
    c.delete("k", "p").await.unwrap();
    assert_eq!(c.create("k", "p").await.unwrap(), Registration::Created);
  }

  #[tokio::test]
  async fn unreachable_registry_is_internal() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let c = HttpKiwiTree::new(&ClientConfig::new(base, Duration::from_secs(1))).unwrap();
    assert!(matches!(c.create("k", "p").await, Err(Error::Internal(_))));
  }
}
