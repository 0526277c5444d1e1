//! Server configuration: an optional TOML file layered under `SIFT_*`
//! environment variables.

use std::{path::Path, time::Duration};

use anyhow::Context as _;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use sift_api::ApiSettings;
use sift_clients::ClientConfig;
use sift_core::condition::LeafKind;
use sift_service::{RetryPolicy, ServiceConfig};

/// Runtime server configuration. Every field has a default, so an empty
/// (or missing) file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                    String,
  pub port:                    u16,
  pub private_port:            u16,
  pub store_path:              String,
  pub kiwi_tree_complete_uri:  String,
  pub kiwi_tree_partial_uri:   String,
  pub conditions_text_uri:     String,
  pub client_timeout_ms:       u64,
  pub search_limit_default:    u32,
  pub search_limit_max:        u32,
  pub scan_page_size:          u32,
  pub request_timeout_ms:      u64,
  pub compensation_timeout_ms: u64,
  pub retry_attempts:          u32,
  pub retry_initial_delay_ms:  u64,
  pub retry_max_delay_ms:      u64,
  pub default_group_id:        String,
  pub public_leaf_kinds:       Vec<LeafKind>,
  pub stream_buffer:           usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                    "0.0.0.0".to_owned(),
      port:                    8080,
      private_port:            8081,
      store_path:              "sift.db".to_owned(),
      kiwi_tree_complete_uri:  "http://kiwi-tree-complete:8080".to_owned(),
      kiwi_tree_partial_uri:   "http://kiwi-tree-partial:8080".to_owned(),
      conditions_text_uri:     "http://conditions-text:8080".to_owned(),
      client_timeout_ms:       10_000,
      search_limit_default:    100,
      search_limit_max:        1000,
      scan_page_size:          100,
      request_timeout_ms:      30_000,
      compensation_timeout_ms: 10_000,
      retry_attempts:          5,
      retry_initial_delay_ms:  50,
      retry_max_delay_ms:      1000,
      default_group_id:        "default".to_owned(),
      public_leaf_kinds:       vec![LeafKind::Kiwi, LeafKind::KiwiTree, LeafKind::Text],
      stream_buffer:           16,
    }
  }
}

impl ServerConfig {
  /// Read `path` if it exists, then apply `SIFT_*` overrides.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::from_builder(Config::builder().add_source(File::from(path).required(false)))
  }

  /// Finish `builder` with the environment layer and deserialise.
  /// `SIFT_PUBLIC_LEAF_KINDS` takes a comma-separated list.
  pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
    builder
      .add_source(
        Environment::with_prefix("SIFT")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("public_leaf_kinds"),
      )
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn client(&self, base_url: &str) -> ClientConfig {
    ClientConfig::new(base_url, Duration::from_millis(self.client_timeout_ms))
  }

  pub fn service(&self) -> ServiceConfig {
    ServiceConfig {
      search_limit_default: self.search_limit_default,
      search_limit_max:     self.search_limit_max,
      scan_page_size:       self.scan_page_size,
      compensation_timeout: Duration::from_millis(self.compensation_timeout_ms),
      retry:                RetryPolicy {
        attempts:      self.retry_attempts,
        initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
        max_delay:     Duration::from_millis(self.retry_max_delay_ms),
      },
    }
  }

  pub fn api(&self) -> ApiSettings {
    ApiSettings {
      default_group_id:  self.default_group_id.clone(),
      public_leaf_kinds: self.public_leaf_kinds.clone(),
      request_timeout:   Duration::from_millis(self.request_timeout_ms),
      stream_buffer:     self.stream_buffer,
    }
  }
}

#[cfg(test)]
mod tests {
  use config::FileFormat;

  use super::*;

  fn from_toml(text: &str) -> ServerConfig {
    ServerConfig::from_builder(
      Config::builder().add_source(File::from_str(text, FileFormat::Toml)),
    )
    .unwrap()
  }

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/sift.toml")).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.private_port, 8081);
    assert_eq!(cfg.store_path, "sift.db");
  }

  #[test]
  fn file_overrides_only_what_it_names() {
    let cfg = from_toml(
      r#"
        port = 9000
        store_path = ":memory:"
        public_leaf_kinds = ["kiwi_tree", "number"]
        retry_attempts = 2
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.store_path, ":memory:");
    assert_eq!(cfg.public_leaf_kinds, vec![LeafKind::KiwiTree, LeafKind::Number]);
    assert_eq!(cfg.private_port, 8081);
    assert_eq!(cfg.default_group_id, "default");

    let service = cfg.service();
    assert_eq!(service.retry.attempts, 2);
    assert_eq!(service.retry.initial_delay, Duration::from_millis(50));
  }

  #[test]
  fn unknown_leaf_kind_is_rejected() {
    let result = ServerConfig::from_builder(
      Config::builder()
        .add_source(File::from_str(r#"public_leaf_kinds = ["colour"]"#, FileFormat::Toml)),
    );
    assert!(result.is_err());
  }

  #[test]
  fn derived_settings_carry_timeouts() {
    let cfg = from_toml("request_timeout_ms = 250\nclient_timeout_ms = 75");
    assert_eq!(cfg.api().request_timeout, Duration::from_millis(250));
    assert_eq!(cfg.client("http://x").timeout, Duration::from_millis(75));
    assert_eq!(cfg.api().public_leaf_kinds, ServerConfig::default().public_leaf_kinds);
  }
}
