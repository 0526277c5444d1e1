//! Client for the free-text condition registry.

use serde::{Deserialize, Serialize};
use sift_core::registry::{Registration, TextConditions, TextRegistration};
use tracing::debug;

use crate::{
  http::{ClientConfig, Transport},
  Result,
};

#[derive(Serialize)]
struct CreateBody<'a> {
  key:   &'a str,
  term:  &'a str,
  exact: bool,
}

#[derive(Deserialize)]
struct CreateReply {
  id:   String,
  term: String,
}

#[derive(Serialize)]
struct IdBody<'a> {
  id: &'a str,
}

/// HTTP implementation of [`TextConditions`].
#[derive(Clone)]
pub struct HttpTextConditions {
  transport: Transport,
}

impl HttpTextConditions {
  pub fn new(config: &ClientConfig) -> Result<Self> {
    Ok(Self { transport: Transport::new(config)? })
  }

  async fn unit(&self, method: &'static str, id: &str) -> sift_core::Result<()> {
    self.transport.call(method, &IdBody { id }).await?;
    Ok(())
  }
}

impl TextConditions for HttpTextConditions {
  async fn create(&self, key: &str, term: &str, exact: bool) -> sift_core::Result<TextRegistration> {
    let resp = self.transport.call("create", &CreateBody { key, term, exact }).await?;
    let registration = if Transport::is_created(&resp) {
      Registration::Created
    } else {
      Registration::Existing
    };
    let reply: CreateReply = resp.json().await.map_err(crate::Error::from)?;
    debug!(key, id = %reply.id, ?registration, "text condition create");
    Ok(TextRegistration { id: reply.id, term: reply.term, registration })
  }

  async fn lock_create(&self, id: &str) -> sift_core::Result<()> {
    self.unit("lock-create", id).await
  }

  async fn unlock_create(&self, id: &str) -> sift_core::Result<()> {
    self.unit("unlock-create", id).await
  }

  async fn delete(&self, id: &str) -> sift_core::Result<()> { self.unit("delete", id).await }
}
