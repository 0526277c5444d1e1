//! JSON shapes of the HTTP surfaces and their conversion to domain types.
//!
//! A condition is a oneof: exactly one of `gc` (group), `kc` (kiwi), `ktc`
//! (kiwi tree), `tc` (text), `nc` (number) or `sc` (semantic) is set. Leaf
//! ids are output-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sift_core::{
  Error, Result,
  condition::{
    Condition, ConditionKind, GroupCondition, KiwiCondition, LeafKind, NumberCondition,
    SemanticCondition, TextCondition,
  },
  interest::{ConditionMatch, Metadata},
};

// ─── Condition ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireGroup {
  #[serde(default)]
  pub logic: i32,
  #[serde(default)]
  pub group: Vec<WireCondition>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WireKiwi {
  pub id:      String,
  pub key:     String,
  pub pattern: String,
  pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WireText {
  pub id:    String,
  pub key:   String,
  pub term:  String,
  pub exact: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WireNumber {
  pub id:  String,
  pub key: String,
  pub op:  i32,
  pub val: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WireSemantic {
  pub id: String,
  pub q:  String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireCondition {
  #[serde(default)]
  pub not: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gc:  Option<WireGroup>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub kc:  Option<WireKiwi>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ktc: Option<WireKiwi>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tc:  Option<WireText>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub nc:  Option<WireNumber>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sc:  Option<WireSemantic>,
}

impl From<&Condition> for WireCondition {
  fn from(c: &Condition) -> Self {
    let mut w = WireCondition { not: c.not, ..Default::default() };
    match &c.kind {
      ConditionKind::Group(g) => {
        w.gc = Some(WireGroup {
          logic: g.logic.into(),
          group: g.group.iter().map(WireCondition::from).collect(),
        });
      }
      ConditionKind::Kiwi(k) => {
        let kiwi = WireKiwi {
          id:      k.id.clone(),
          key:     k.key.clone(),
          pattern: k.pattern.clone(),
          partial: k.partial,
        };
        if k.tree {
          w.ktc = Some(kiwi);
        } else {
          w.kc = Some(kiwi);
        }
      }
      ConditionKind::Text(t) => {
        w.tc = Some(WireText {
          id:    t.id.clone(),
          key:   t.key.clone(),
          term:  t.term.clone(),
          exact: t.exact,
        });
      }
      ConditionKind::Number(n) => {
        w.nc = Some(WireNumber { id: n.id.clone(), key: n.key.clone(), op: n.op.into(), val: n.val });
      }
      ConditionKind::Semantic(s) => {
        w.sc = Some(WireSemantic { id: s.id.clone(), q: s.query.clone() });
      }
    }
    w
  }
}

impl WireCondition {
  /// Decode a submitted condition. Leaf ids are dropped; leaves whose kind
  /// is not in `allowed` are rejected.
  pub fn decode(self, allowed: &[LeafKind]) -> Result<Condition> {
    let kind = match (self.gc, self.kc, self.ktc, self.tc, self.nc, self.sc) {
      (Some(g), None, None, None, None, None) => ConditionKind::Group(GroupCondition {
        logic: g.logic.try_into()?,
        group: g
          .group
          .into_iter()
          .map(|c| c.decode(allowed))
          .collect::<Result<Vec<_>>>()?,
      }),
      (None, Some(k), None, None, None, None) => ConditionKind::Kiwi(KiwiCondition {
        id:      String::new(),
        key:     k.key,
        pattern: k.pattern,
        partial: k.partial,
        tree:    false,
      }),
      (None, None, Some(k), None, None, None) => ConditionKind::Kiwi(KiwiCondition {
        id:      String::new(),
        key:     k.key,
        pattern: k.pattern,
        partial: k.partial,
        tree:    true,
      }),
      (None, None, None, Some(t), None, None) => ConditionKind::Text(TextCondition {
        id:    String::new(),
        key:   t.key,
        term:  t.term,
        exact: t.exact,
      }),
      (None, None, None, None, Some(n), None) => ConditionKind::Number(NumberCondition {
        id:  String::new(),
        key: n.key,
        op:  n.op.try_into()?,
        val: n.val,
      }),
      (None, None, None, None, None, Some(s)) => {
        ConditionKind::Semantic(SemanticCondition { id: String::new(), query: s.q })
      }
      _ => {
        return Err(Error::InvalidCondition(
          "condition must set exactly one of gc, kc, ktc, tc, nc, sc".to_owned(),
        ));
      }
    };

    let condition = Condition { not: self.not, kind };
    if let Some(kind) = condition.leaf_kind()
      && !allowed.contains(&kind)
    {
      return Err(Error::InvalidCondition(format!("{kind} conditions are not accepted")));
    }
    Ok(condition)
  }
}

// ─── Metadata ────────────────────────────────────────────────────────────────

/// Interest metadata. Server-maintained fields (`created`, `updated`,
/// `enabledSince`, `followers`) are ignored on input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireMetadata {
  pub description:   String,
  pub enabled:       bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub enabled_since: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expires:       Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub created:       Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub updated:       Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result:        Option<DateTime<Utc>>,
  pub public:        bool,
  pub followers:     i64,
  pub rate_limit:    u32,
}

impl From<&Metadata> for WireMetadata {
  fn from(md: &Metadata) -> Self {
    Self {
      description:   md.description.clone(),
      enabled:       md.enabled,
      enabled_since: md.enabled_since,
      expires:       md.expires,
      created:       Some(md.created),
      updated:       Some(md.updated),
      result:        md.result,
      public:        md.public,
      followers:     md.followers,
      rate_limit:    md.rate_limit,
    }
  }
}

impl WireMetadata {
  pub fn into_metadata(self) -> Metadata {
    Metadata {
      description: self.description,
      enabled: self.enabled,
      expires: self.expires,
      result: self.result,
      public: self.public,
      rate_limit: self.rate_limit,
      ..Default::default()
    }
  }
}

// ─── Request / response bodies ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
  #[serde(default)]
  pub md:   WireMetadata,
  pub cond: WireCondition,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateReply {
  pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadReply {
  pub md:   WireMetadata,
  pub cond: WireCondition,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
  pub md: WireMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchReply {
  pub ids: Vec<String>,
}

/// The empty object returned by mutations.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KiwiQuery {
  pub key:     String,
  pub pattern: String,
  #[serde(default)]
  pub partial: bool,
}

/// Either a kiwi-tree leaf or a raw condition id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConditionQueryBody {
  pub kiwi: Option<KiwiQuery>,
  pub id:   Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchByConditionRequest {
  pub cond:   ConditionQueryBody,
  #[serde(default)]
  pub cursor: String,
}

/// One row of the private condition scan.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMatch {
  pub sub_id:  String,
  pub cond_id: String,
  pub cond:    WireCondition,
}

impl From<&ConditionMatch> for WireMatch {
  fn from(m: &ConditionMatch) -> Self {
    Self {
      sub_id:  m.interest_id.clone(),
      cond_id: m.condition_id.clone(),
      cond:    WireCondition::from(&m.condition),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct FollowersRequest {
  pub delta: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReply {
  pub count:        u64,
  pub users_unique: u64,
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use sift_core::condition::Logic;

  use super::*;

  const ALL: [LeafKind; 5] =
    [LeafKind::Kiwi, LeafKind::KiwiTree, LeafKind::Text, LeafKind::Number, LeafKind::Semantic];

  fn decode(v: serde_json::Value, allowed: &[LeafKind]) -> Result<Condition> {
    serde_json::from_value::<WireCondition>(v).unwrap().decode(allowed)
  }

  #[test]
  fn decodes_group_and_drops_ids() {
    let c = decode(
      json!({"gc": {"logic": 0, "group": [
        {"kc": {"id": "client-id", "key": "key0", "pattern": "p0", "partial": true}},
        {"not": true, "ktc": {"key": "key1", "pattern": "p1"}}
      ]}}),
      &ALL,
    )
    .unwrap();

    let expected = Condition::group(Logic::And, vec![
      Condition::kiwi("key0", "p0", true),
      Condition::kiwi_tree("key1", "p1", false).negated(),
    ]);
    assert_eq!(c, expected);
  }

  #[test]
  fn rejects_zero_or_many_variants() {
    assert!(matches!(decode(json!({"not": false}), &ALL), Err(Error::InvalidCondition(_))));
    let both = json!({"kc": {"key": "k", "pattern": "p"}, "sc": {"q": "x"}});
    assert!(matches!(decode(both, &ALL), Err(Error::InvalidCondition(_))));
  }

  #[test]
  fn allow_list_gates_leaf_kinds() {
    let nested = json!({"gc": {"logic": 1, "group": [
      {"kc": {"key": "k", "pattern": "p"}},
      {"nc": {"key": "price", "op": 1, "val": 3.5}}
    ]}});
    let err = decode(nested.clone(), &[LeafKind::Kiwi]).unwrap_err();
    assert_eq!(err, Error::InvalidCondition("number conditions are not accepted".into()));
    assert!(decode(nested, &[LeafKind::Kiwi, LeafKind::Number]).is_ok());
  }

  #[test]
  fn encodes_assigned_ids() {
    let c = Condition::text("title", "rust", true).with_leaf_ids(|_| "t1".into());
    let v = serde_json::to_value(WireCondition::from(&c)).unwrap();
    assert_eq!(v, json!({"not": false, "tc": {"id": "t1", "key": "title", "term": "rust", "exact": true}}));
  }

  #[test]
  fn metadata_ignores_server_fields_on_input() {
    let md: WireMetadata = serde_json::from_value(json!({
      "description": "d", "enabled": true, "followers": 40, "rateLimit": 2,
      "created": "2020-01-01T00:00:00Z"
    }))
    .unwrap();
    let md = md.into_metadata();
    assert_eq!(md.description, "d");
    assert_eq!(md.rate_limit, 2);
    assert_eq!(md.followers, 0);
    assert_eq!(md.created, DateTime::<Utc>::default());
  }
}
