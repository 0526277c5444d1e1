//! Process bootstrap for sift: configuration and wiring of the store, the
//! registry clients and the two HTTP surfaces.

pub mod config;

use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use sift_api::AppState;
use sift_clients::{HttpKiwiTree, HttpTextConditions};
use sift_service::{KiwiTrees, Service};
use sift_store_sqlite::SqliteStore;

pub use crate::config::ServerConfig;

pub type SiftService = Service<SqliteStore, HttpKiwiTree, HttpTextConditions>;

/// Everything `main` needs to serve.
pub struct App {
  pub public:  Router,
  pub private: Router,
  /// Kept to close the store on shutdown.
  pub service: SiftService,
}

/// Open the store, build the clients and both routers.
pub async fn build(cfg: &ServerConfig) -> anyhow::Result<App> {
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  let complete = HttpKiwiTree::new(&cfg.client(&cfg.kiwi_tree_complete_uri))
    .context("failed to build kiwi-tree (complete) client")?;
  let partial = HttpKiwiTree::new(&cfg.client(&cfg.kiwi_tree_partial_uri))
    .context("failed to build kiwi-tree (partial) client")?;
  let text = HttpTextConditions::new(&cfg.client(&cfg.conditions_text_uri))
    .context("failed to build text-conditions client")?;

  let service = Service::new(
    Arc::new(store),
    KiwiTrees::new(Arc::new(complete), Arc::new(partial)),
    Arc::new(text),
    cfg.service(),
  );
  let state = AppState { service: service.clone(), settings: Arc::new(cfg.api()) };

  Ok(App {
    public: sift_api::public_router(state.clone()),
    private: sift_api::private_router(state),
    service,
  })
}

#[cfg(test)]
mod tests {
  use axum::{body::Body, http::Request};
  use tower::ServiceExt as _;

  use super::*;

  #[tokio::test]
  async fn builds_against_an_in_memory_store() {
    let cfg = ServerConfig { store_path: ":memory:".to_owned(), ..Default::default() };
    let app = build(&cfg).await.unwrap();

    let resp = app
      .private
      .oneshot(Request::get("/private/v1/stats").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), 200);

    app.service.close().await.unwrap();
  }
}
