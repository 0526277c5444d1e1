//! Interest: a persisted subscription binding an owner to a condition tree.

use chrono::{DateTime, Utc};

use crate::condition::Condition;

// ─── Owner ───────────────────────────────────────────────────────────────────

/// The `(group, user)` tuple every interest belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Owner {
  pub group_id: String,
  pub user_id:  String,
}

impl Owner {
  pub fn new(group_id: impl Into<String>, user_id: impl Into<String>) -> Self {
    Self { group_id: group_id.into(), user_id: user_id.into() }
  }
}

// ─── Metadata ────────────────────────────────────────────────────────────────

/// The mutable part of an interest.
///
/// `created`, `followers` and `enabled_since` are maintained by the store;
/// values supplied on update are ignored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
  pub description:   String,
  pub enabled:       bool,
  /// Last time `enabled` flipped from false to true.
  pub enabled_since: Option<DateTime<Utc>>,
  /// After this instant the interest no longer matches.
  pub expires:       Option<DateTime<Utc>>,
  pub created:       DateTime<Utc>,
  pub updated:       DateTime<Utc>,
  /// Time of the most recent delivered result.
  pub result:        Option<DateTime<Utc>>,
  /// Public interests are readable by anyone and can be followed.
  pub public:        bool,
  pub followers:     i64,
  /// Maximum results per minute; 0 disables the limit.
  pub rate_limit:    u32,
}

impl Metadata {
  pub fn new(description: impl Into<String>, enabled: bool) -> Self {
    Self { description: description.into(), enabled, ..Default::default() }
  }

  /// Whether the interest takes part in matching at `now`.
  pub fn is_active(&self, now: DateTime<Utc>) -> bool {
    self.enabled && self.expires.is_none_or(|exp| exp > now)
  }
}

// ─── Interest ────────────────────────────────────────────────────────────────

/// Everything the owner supplies: metadata plus the (immutable) condition.
#[derive(Debug, Clone, PartialEq)]
pub struct InterestData {
  pub metadata:  Metadata,
  pub condition: Condition,
}

/// A persisted interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Interest {
  pub id:       String,
  pub owner:    Owner,
  pub data:     InterestData,
  /// Flat, duplicate-free leaf ids of `data.condition`.
  pub cond_ids: Vec<String>,
}

/// One row of a condition scan: an interest containing a given leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionMatch {
  pub interest_id:  String,
  pub condition_id: String,
  /// Root condition of the owning interest.
  pub condition:    Condition,
}
