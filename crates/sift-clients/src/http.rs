//! Shared JSON-over-HTTP transport.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use sift_core::Status;

use crate::{Error, Result};

/// Connection settings for one registry.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub base_url: String,
  /// Per-call timeout.
  pub timeout:  Duration,
}

impl ClientConfig {
  pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
    Self { base_url: base_url.into(), timeout }
  }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  message: String,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub(crate) struct Transport {
  client:   Client,
  base_url: String,
}

impl Transport {
  pub fn new(config: &ClientConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_owned() })
  }

  /// `POST {base}/v1/{method}` with `body`. Non-2xx responses become
  /// [`Error::Status`].
  pub async fn call<B: Serialize + ?Sized>(
    &self,
    method: &'static str,
    body: &B,
  ) -> Result<Response> {
    let url = format!("{}/v1/{method}", self.base_url);
    let resp = self.client.post(&url).json(body).send().await?;
    if resp.status().is_success() {
      return Ok(resp);
    }

    let code = resp.status();
    let message = match resp.json::<ErrorBody>().await {
      Ok(body) if !body.message.is_empty() => body.message,
      _ => code.canonical_reason().unwrap_or("unknown status").to_owned(),
    };
    Err(Error::Status {
      method,
      status: Status::from_http_code(code.as_u16()),
      message,
    })
  }

  /// Whether a successful `create` response reports a fresh entry.
  pub fn is_created(resp: &Response) -> bool { resp.status() == StatusCode::CREATED }
}
