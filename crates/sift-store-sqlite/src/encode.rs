//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are fixed-width RFC 3339 strings (microseconds, `Z`) so they
//! order lexicographically. Conditions are stored as a JSON document with a
//! `base` envelope and exactly one variant object.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sift_core::{
  condition::{
    Condition, ConditionKind, GroupCondition, KiwiCondition, NumberCondition, SemanticCondition,
    TextCondition,
  },
  interest::{Interest, InterestData, Metadata, Owner},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Condition document ──────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct BaseDoc {
  not: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupDoc {
  logic: i32,
  group: Vec<CondDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct KiwiDoc {
  id:      String,
  key:     String,
  pattern: String,
  partial: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextDoc {
  id:    String,
  key:   String,
  term:  String,
  exact: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct NumberDoc {
  id:  String,
  key: String,
  op:  i32,
  val: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SemanticDoc {
  id: String,
  q:  String,
}

/// `{"base": {"not": …}, "<variant>": {…}}`; exactly one variant is set.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CondDoc {
  base:      BaseDoc,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  group:     Option<GroupDoc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  kiwi:      Option<KiwiDoc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  kiwi_tree: Option<KiwiDoc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  text:      Option<TextDoc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  number:    Option<NumberDoc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  semantic:  Option<SemanticDoc>,
}

impl CondDoc {
  fn empty(not: bool) -> Self {
    Self {
      base:      BaseDoc { not },
      group:     None,
      kiwi:      None,
      kiwi_tree: None,
      text:      None,
      number:    None,
      semantic:  None,
    }
  }

  fn from_condition(c: &Condition) -> Self {
    let mut doc = Self::empty(c.not);
    match &c.kind {
      ConditionKind::Group(g) => {
        doc.group = Some(GroupDoc {
          logic: g.logic.into(),
          group: g.group.iter().map(Self::from_condition).collect(),
        });
      }
      ConditionKind::Kiwi(k) => {
        let kd = KiwiDoc {
          id:      k.id.clone(),
          key:     k.key.clone(),
          pattern: k.pattern.clone(),
          partial: k.partial,
        };
        if k.tree {
          doc.kiwi_tree = Some(kd);
        } else {
          doc.kiwi = Some(kd);
        }
      }
      ConditionKind::Text(t) => {
        doc.text = Some(TextDoc {
          id:    t.id.clone(),
          key:   t.key.clone(),
          term:  t.term.clone(),
          exact: t.exact,
        });
      }
      ConditionKind::Number(n) => {
        doc.number = Some(NumberDoc {
          id:  n.id.clone(),
          key: n.key.clone(),
          op:  n.op.into(),
          val: n.val,
        });
      }
      ConditionKind::Semantic(s) => {
        doc.semantic = Some(SemanticDoc { id: s.id.clone(), q: s.query.clone() });
      }
    }
    doc
  }

  fn into_condition(self) -> Result<Condition> {
    let not = self.base.not;
    let kind = match (self.group, self.kiwi, self.kiwi_tree, self.text, self.number, self.semantic) {
      (Some(g), None, None, None, None, None) => {
        let logic = g
          .logic
          .try_into()
          .map_err(|e: sift_core::Error| Error::MalformedCondition(e.message().to_owned()))?;
        let group = g
          .group
          .into_iter()
          .map(Self::into_condition)
          .collect::<Result<Vec<_>>>()?;
        ConditionKind::Group(GroupCondition { logic, group })
      }
      (None, Some(k), None, None, None, None) => ConditionKind::Kiwi(KiwiCondition {
        id:      k.id,
        key:     k.key,
        pattern: k.pattern,
        partial: k.partial,
        tree:    false,
      }),
      (None, None, Some(k), None, None, None) => ConditionKind::Kiwi(KiwiCondition {
        id:      k.id,
        key:     k.key,
        pattern: k.pattern,
        partial: k.partial,
        tree:    true,
      }),
      (None, None, None, Some(t), None, None) => ConditionKind::Text(TextCondition {
        id:    t.id,
        key:   t.key,
        term:  t.term,
        exact: t.exact,
      }),
      (None, None, None, None, Some(n), None) => ConditionKind::Number(NumberCondition {
        id:  n.id,
        key: n.key,
        op:  n
          .op
          .try_into()
          .map_err(|e: sift_core::Error| Error::MalformedCondition(e.message().to_owned()))?,
        val: n.val,
      }),
      (None, None, None, None, None, Some(s)) => {
        ConditionKind::Semantic(SemanticCondition { id: s.id, query: s.q })
      }
      _ => {
        return Err(Error::MalformedCondition(
          "expected exactly one condition variant".to_owned(),
        ));
      }
    };
    Ok(Condition { not, kind })
  }
}

pub fn encode_condition(c: &Condition) -> Result<String> {
  Ok(serde_json::to_string(&CondDoc::from_condition(c))?)
}

pub fn decode_condition(s: &str) -> Result<Condition> {
  let doc: CondDoc =
    serde_json::from_str(s).map_err(|e| Error::MalformedCondition(e.to_string()))?;
  doc.into_condition()
}

// ─── Condition ids ───────────────────────────────────────────────────────────

pub fn encode_cond_ids(ids: &[String]) -> Result<String> { Ok(serde_json::to_string(ids)?) }

pub fn decode_cond_ids(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawInterest::from_row`].
pub const INTEREST_COLUMNS: &str = "id, group_id, user_id, descr, enabled, enabled_since, \
   expires, created, updated, result, public, followers, rate_limit, cond, cond_ids";

/// Raw values read directly from an `interests` row.
pub struct RawInterest {
  pub id:            String,
  pub group_id:      String,
  pub user_id:       String,
  pub descr:         String,
  pub enabled:       bool,
  pub enabled_since: Option<String>,
  pub expires:       Option<String>,
  pub created:       String,
  pub updated:       String,
  pub result:        Option<String>,
  pub public:        bool,
  pub followers:     i64,
  pub rate_limit:    u32,
  pub cond:          String,
  pub cond_ids:      String,
}

impl RawInterest {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      group_id:      row.get(1)?,
      user_id:       row.get(2)?,
      descr:         row.get(3)?,
      enabled:       row.get(4)?,
      enabled_since: row.get(5)?,
      expires:       row.get(6)?,
      created:       row.get(7)?,
      updated:       row.get(8)?,
      result:        row.get(9)?,
      public:        row.get(10)?,
      followers:     row.get(11)?,
      rate_limit:    row.get(12)?,
      cond:          row.get(13)?,
      cond_ids:      row.get(14)?,
    })
  }

  pub fn into_interest(self) -> Result<Interest> {
    let metadata = Metadata {
      description:   self.descr,
      enabled:       self.enabled,
      enabled_since: decode_opt_dt(self.enabled_since)?,
      expires:       decode_opt_dt(self.expires)?,
      created:       decode_dt(&self.created)?,
      updated:       decode_dt(&self.updated)?,
      result:        decode_opt_dt(self.result)?,
      public:        self.public,
      followers:     self.followers,
      rate_limit:    self.rate_limit,
    };
    Ok(Interest {
      id:       self.id,
      owner:    Owner { group_id: self.group_id, user_id: self.user_id },
      data:     InterestData { metadata, condition: decode_condition(&self.cond)? },
      cond_ids: decode_cond_ids(&self.cond_ids)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use sift_core::condition::{Logic, Op};

  use super::*;

  #[test]
  fn condition_document_round_trip() {
    let c = Condition::group(Logic::Xor, vec![
      Condition::kiwi("k0", "p*", true),
      Condition::kiwi_tree("k1", "?x", false).negated(),
      Condition::group(Logic::Or, vec![
        Condition::text("k2", "rust", true),
        Condition::number("k3", Op::Lte, -2.5),
      ]),
      Condition::semantic("weather in Oslo"),
    ])
    .with_leaf_ids(|l| format!("id-{}", l.leaf_kind().unwrap()));

    let decoded = decode_condition(&encode_condition(&c).unwrap()).unwrap();
    assert_eq!(decoded, c);
    assert!(decoded.equal(&c));
  }

  #[test]
  fn document_uses_base_envelope() {
    let json = encode_condition(&Condition::kiwi_tree("k", "p", false)).unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v["base"]["not"], false);
    assert_eq!(v["kiwiTree"]["pattern"], "p");
    assert!(v.get("kiwi").is_none());
  }

  #[test]
  fn rejects_documents_without_exactly_one_variant() {
    let none = r#"{"base":{"not":false}}"#;
    let both = r#"{"base":{"not":false},
      "kiwi":{"id":"","key":"k","pattern":"p","partial":false},
      "semantic":{"id":"","q":"x"}}"#;
    assert!(matches!(decode_condition(none), Err(Error::MalformedCondition(_))));
    assert!(matches!(decode_condition(both), Err(Error::MalformedCondition(_))));
  }

  #[test]
  fn rejects_unknown_logic() {
    let doc = r#"{"base":{"not":false},"group":{"logic":7,"group":[]}}"#;
    assert!(matches!(decode_condition(doc), Err(Error::MalformedCondition(_))));
  }

  #[test]
  fn timestamps_are_fixed_width() {
    let a = encode_dt(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
    let b = encode_dt(DateTime::from_timestamp(1_700_000_000, 123_456_000).unwrap());
    assert_eq!(a.len(), b.len());
    assert!(a < b);
    assert_eq!(decode_dt(&b).unwrap().timestamp_subsec_micros(), 123_456);
  }
}
