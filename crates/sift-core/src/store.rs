//! The `InterestStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `sift-store-sqlite`).
//! The service layer depends on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::interest::{ConditionMatch, Interest, InterestData, Metadata, Owner};

// ─── Query types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
  #[default]
  Id,
  Followers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
  #[default]
  Asc,
  Desc,
}

/// Parameters for [`InterestStore::search`].
#[derive(Debug, Clone, Default)]
pub struct Query {
  pub owner:          Owner,
  pub limit:          u32,
  pub sort:           Sort,
  pub order:          Order,
  /// Substring filter over the description.
  pub pattern:        Option<String>,
  /// Also list public interests of other owners.
  pub include_public: bool,
  /// Only list non-public interests. Takes precedence over
  /// `include_public`.
  pub private_only:   bool,
}

/// Position after the last row of the previous page.
///
/// An empty `id` starts from the beginning. When sorting by
/// [`Sort::Followers`] the store uses the current follower count of `id`,
/// falling back to `followers` if that interest no longer exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
  pub id:        String,
  pub followers: i64,
}

impl Cursor {
  pub fn after(id: impl Into<String>) -> Self { Self { id: id.into(), followers: 0 } }

  pub fn is_start(&self) -> bool { self.id.is_empty() }
}

/// Parameters for [`InterestStore::search_by_condition`].
#[derive(Debug, Clone, Default)]
pub struct ConditionQuery {
  pub cond_id:          String,
  pub limit:            u32,
  /// If `false`, disabled and expired interests are skipped.
  pub include_inactive: bool,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a sift interest store backend.
///
/// The condition of an interest is written once by `create`; `update` only
/// ever touches metadata. The flat `cond_ids` index is written in the same
/// atomic step as the record.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait InterestStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  /// Persist a new interest and return its id.
  fn create<'a>(
    &'a self,
    owner: &'a Owner,
    data: InterestData,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Read an interest owned by `owner`, or any public interest.
  fn read<'a>(
    &'a self,
    id: &'a str,
    owner: &'a Owner,
  ) -> impl Future<Output = Result<Interest, Self::Error>> + Send + 'a;

  /// Replace the metadata of an owned interest and return the previous
  /// value.
  fn update<'a>(
    &'a self,
    id: &'a str,
    owner: &'a Owner,
    metadata: Metadata,
  ) -> impl Future<Output = Result<Interest, Self::Error>> + Send + 'a;

  /// Atomically add `delta` to the follower count; the count never goes
  /// below zero.
  fn update_followers<'a>(
    &'a self,
    id: &'a str,
    delta: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove an owned interest and return it.
  fn delete<'a>(
    &'a self,
    id: &'a str,
    owner: &'a Owner,
  ) -> impl Future<Output = Result<Interest, Self::Error>> + Send + 'a;

  /// One page of interest ids matching `query`, after `cursor`.
  fn search<'a>(
    &'a self,
    query: &'a Query,
    cursor: &'a Cursor,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  /// One page of interests whose condition contains `query.cond_id`,
  /// ordered by interest id, after interest id `cursor`.
  fn search_by_condition<'a>(
    &'a self,
    query: &'a ConditionQuery,
    cursor: &'a str,
  ) -> impl Future<Output = Result<Vec<ConditionMatch>, Self::Error>> + Send + 'a;

  fn count(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Number of distinct owners.
  fn count_users_unique(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Release backing resources. Later calls fail.
  fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
