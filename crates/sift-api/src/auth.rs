//! Caller identification for the public surface.
//!
//! A request names its user with either `x-api-key` (the key is the user
//! id) or `x-endpoint-api-userinfo` (base64-url JSON with an `email` claim,
//! as forwarded by an API gateway). `x-api-key` wins when both are set. The
//! group comes from `x-group-id`, falling back to the configured default.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
use sift_core::{Error, Result, interest::Owner};

use crate::{AppState, error::ApiError};

pub const API_KEY: &str = "x-api-key";
pub const USERINFO: &str = "x-endpoint-api-userinfo";
pub const GROUP_ID: &str = "x-group-id";

/// The authenticated owner of a public request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Owner);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>> {
  headers
    .get(name)
    .map(|v| {
      v.to_str()
        .map_err(|_| Error::Unauthenticated(format!("{name:?} is not valid ASCII")))
    })
    .transpose()
}

fn user_from_userinfo(encoded: &str) -> Result<String> {
  let raw = B64URL
    .decode(encoded.trim().trim_end_matches('='))
    .map_err(|e| Error::Unauthenticated(format!("{USERINFO:?} is not base64-url: {e}")))?;
  let claims: serde_json::Value = serde_json::from_slice(&raw)
    .map_err(|e| Error::Unauthenticated(format!("{USERINFO:?} is not JSON: {e}")))?;
  match claims.get("email").and_then(serde_json::Value::as_str) {
    Some(email) if !email.is_empty() => Ok(email.to_owned()),
    _ => Err(Error::Unauthenticated(format!(
      "{USERINFO:?} has no string claim \"email\""
    ))),
  }
}

/// Resolve the request owner from its headers.
pub fn authenticate(headers: &HeaderMap, default_group_id: &str) -> Result<Owner> {
  let user_id = match (header(headers, API_KEY)?, header(headers, USERINFO)?) {
    (Some(key), _) if !key.is_empty() => key.to_owned(),
    (Some(_), None) => {
      return Err(Error::Unauthenticated(format!("{API_KEY:?} is empty")));
    }
    (_, Some(info)) => user_from_userinfo(info)?,
    (None, None) => {
      return Err(Error::Unauthenticated(format!(
        "missing request metadata, neither {API_KEY:?} nor {USERINFO:?} set"
      )));
    }
  };

  let group_id = match header(headers, GROUP_ID)? {
    Some(g) if !g.is_empty() => g.to_owned(),
    _ => default_group_id.to_owned(),
  };
  Ok(Owner { group_id, user_id })
}

impl<S, K, T> FromRequestParts<AppState<S, K, T>> for Caller
where
  S: Send + Sync,
  K: Send + Sync,
  T: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, K, T>,
  ) -> Result<Self, Self::Rejection> {
    Ok(Caller(authenticate(&parts.headers, &state.settings.default_group_id)?))
  }
}
