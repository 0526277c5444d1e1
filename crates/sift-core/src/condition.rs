//! Condition trees: the routing predicate attached to every interest.
//!
//! A condition is either a group combining two or more child conditions, or
//! a leaf testing a single input-metadata field. Every node may be negated.
//! Leaves carry a server-assigned id; ids are assigned once when the
//! interest is created and never change afterwards.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

// ─── Enumerations ────────────────────────────────────────────────────────────

/// How the members of a group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Logic {
  #[default]
  And,
  Or,
  Xor,
}

impl From<Logic> for i32 {
  fn from(l: Logic) -> Self {
    match l {
      Logic::And => 0,
      Logic::Or => 1,
      Logic::Xor => 2,
    }
  }
}

impl TryFrom<i32> for Logic {
  type Error = Error;

  fn try_from(v: i32) -> Result<Self> {
    match v {
      0 => Ok(Self::And),
      1 => Ok(Self::Or),
      2 => Ok(Self::Xor),
      other => Err(Error::InvalidCondition(format!("unknown group logic: {other}"))),
    }
  }
}

/// Comparison operator of a number condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Op {
  #[default]
  Undefined,
  Gt,
  Gte,
  Eq,
  Lte,
  Lt,
}

impl From<Op> for i32 {
  fn from(op: Op) -> Self {
    match op {
      Op::Undefined => 0,
      Op::Gt => 1,
      Op::Gte => 2,
      Op::Eq => 3,
      Op::Lte => 4,
      Op::Lt => 5,
    }
  }
}

impl TryFrom<i32> for Op {
  type Error = Error;

  fn try_from(v: i32) -> Result<Self> {
    match v {
      0 => Ok(Self::Undefined),
      1 => Ok(Self::Gt),
      2 => Ok(Self::Gte),
      3 => Ok(Self::Eq),
      4 => Ok(Self::Lte),
      5 => Ok(Self::Lt),
      other => Err(Error::InvalidCondition(format!("unknown number operator: {other}"))),
    }
  }
}

/// Names the leaf variants; used for allow-lists and log fields.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeafKind {
  Kiwi,
  KiwiTree,
  Text,
  Number,
  Semantic,
}

// ─── Node payloads ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct GroupCondition {
  pub logic: Logic,
  pub group: Vec<Condition>,
}

/// Wildcard pattern over a metadata field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KiwiCondition {
  pub id:      String,
  pub key:     String,
  pub pattern: String,
  /// Match any lexeme of the tokenized value rather than the whole value.
  pub partial: bool,
  /// The pattern lives in the external kiwi-tree service.
  pub tree:    bool,
}

/// Full-text term over a metadata field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextCondition {
  pub id:    String,
  pub key:   String,
  pub term:  String,
  pub exact: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumberCondition {
  pub id:  String,
  pub key: String,
  pub op:  Op,
  pub val: f64,
}

/// Free-form semantic query; not bound to a key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SemanticCondition {
  pub id:    String,
  pub query: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionKind {
  Group(GroupCondition),
  Kiwi(KiwiCondition),
  Text(TextCondition),
  Number(NumberCondition),
  Semantic(SemanticCondition),
}

// ─── Condition ───────────────────────────────────────────────────────────────

/// A node of a condition tree.
///
/// `PartialEq` compares everything including leaf ids. [`Condition::equal`]
/// is the structural comparison that ignores ids, used to detect duplicate
/// group members and duplicate leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
  pub not:  bool,
  pub kind: ConditionKind,
}

impl Condition {
  pub fn new(kind: ConditionKind) -> Self { Self { not: false, kind } }

  pub fn group(logic: Logic, group: Vec<Condition>) -> Self {
    Self::new(ConditionKind::Group(GroupCondition { logic, group }))
  }

  pub fn kiwi(key: impl Into<String>, pattern: impl Into<String>, partial: bool) -> Self {
    Self::new(ConditionKind::Kiwi(KiwiCondition {
      id: String::new(),
      key: key.into(),
      pattern: pattern.into(),
      partial,
      tree: false,
    }))
  }

  pub fn kiwi_tree(key: impl Into<String>, pattern: impl Into<String>, partial: bool) -> Self {
    Self::new(ConditionKind::Kiwi(KiwiCondition {
      id: String::new(),
      key: key.into(),
      pattern: pattern.into(),
      partial,
      tree: true,
    }))
  }

  pub fn text(key: impl Into<String>, term: impl Into<String>, exact: bool) -> Self {
    Self::new(ConditionKind::Text(TextCondition {
      id: String::new(),
      key: key.into(),
      term: term.into(),
      exact,
    }))
  }

  pub fn number(key: impl Into<String>, op: Op, val: f64) -> Self {
    Self::new(ConditionKind::Number(NumberCondition {
      id: String::new(),
      key: key.into(),
      op,
      val,
    }))
  }

  pub fn semantic(query: impl Into<String>) -> Self {
    Self::new(ConditionKind::Semantic(SemanticCondition {
      id:    String::new(),
      query: query.into(),
    }))
  }

  /// The same condition with `not` set.
  pub fn negated(mut self) -> Self {
    self.not = true;
    self
  }

  pub fn is_leaf(&self) -> bool { !matches!(self.kind, ConditionKind::Group(_)) }

  pub fn leaf_kind(&self) -> Option<LeafKind> {
    match &self.kind {
      ConditionKind::Group(_) => None,
      ConditionKind::Kiwi(k) if k.tree => Some(LeafKind::KiwiTree),
      ConditionKind::Kiwi(_) => Some(LeafKind::Kiwi),
      ConditionKind::Text(_) => Some(LeafKind::Text),
      ConditionKind::Number(_) => Some(LeafKind::Number),
      ConditionKind::Semantic(_) => Some(LeafKind::Semantic),
    }
  }

  /// The server-assigned id of a leaf; `None` for groups.
  pub fn leaf_id(&self) -> Option<&str> {
    match &self.kind {
      ConditionKind::Group(_) => None,
      ConditionKind::Kiwi(k) => Some(&k.id),
      ConditionKind::Text(t) => Some(&t.id),
      ConditionKind::Number(n) => Some(&n.id),
      ConditionKind::Semantic(s) => Some(&s.id),
    }
  }

  /// Set the id of a leaf. No-op on groups.
  pub fn set_leaf_id(&mut self, id: impl Into<String>) {
    let id = id.into();
    match &mut self.kind {
      ConditionKind::Group(_) => {}
      ConditionKind::Kiwi(k) => k.id = id,
      ConditionKind::Text(t) => t.id = id,
      ConditionKind::Number(n) => n.id = id,
      ConditionKind::Semantic(s) => s.id = id,
    }
  }

  // ── Equality ────────────────────────────────────────────────────────────

  /// Structural equality: variant, negation and payload must match; leaf
  /// ids are ignored. Group members are compared in order.
  pub fn equal(&self, other: &Self) -> bool {
    if self.not != other.not {
      return false;
    }
    match (&self.kind, &other.kind) {
      (ConditionKind::Group(a), ConditionKind::Group(b)) => {
        a.logic == b.logic
          && a.group.len() == b.group.len()
          && a.group.iter().zip(&b.group).all(|(x, y)| x.equal(y))
      }
      (ConditionKind::Kiwi(a), ConditionKind::Kiwi(b)) => {
        a.tree == b.tree && a.partial == b.partial && a.key == b.key && a.pattern == b.pattern
      }
      (ConditionKind::Text(a), ConditionKind::Text(b)) => {
        a.exact == b.exact && a.key == b.key && a.term == b.term
      }
      (ConditionKind::Number(a), ConditionKind::Number(b)) => {
        a.op == b.op && a.key == b.key && a.val == b.val
      }
      (ConditionKind::Semantic(a), ConditionKind::Semantic(b)) => a.query == b.query,
      _ => false,
    }
  }

  // ── Validation ──────────────────────────────────────────────────────────

  /// Validate a condition as the root of an interest.
  ///
  /// The root must not be negated and must include at least one
  /// non-negated branch; every group needs two or more distinct members;
  /// every leaf needs its payload, including a key on kiwi, text and number
  /// leaves.
  pub fn validate(&self) -> Result<()> {
    if self.not {
      return Err(Error::InvalidCondition(
        "root condition must not be negated".to_owned(),
      ));
    }
    self.validate_node()?;
    if !self.includes() {
      return Err(Error::InvalidCondition(
        "condition must contain at least one non-negated branch".to_owned(),
      ));
    }
    Ok(())
  }

  fn validate_node(&self) -> Result<()> {
    match &self.kind {
      ConditionKind::Group(g) => {
        if g.group.len() < 2 {
          return Err(Error::InvalidGroup(format!(
            "group must have at least 2 members, got {}",
            g.group.len()
          )));
        }
        for (i, a) in g.group.iter().enumerate() {
          if g.group[i + 1..].iter().any(|b| a.equal(b)) {
            return Err(Error::InvalidGroup(format!(
              "group member #{i} is duplicated"
            )));
          }
        }
        g.group.iter().try_for_each(Condition::validate_node)
      }
      ConditionKind::Kiwi(k) if k.key.is_empty() => Err(Error::InvalidCondition(
        "kiwi condition requires a key".to_owned(),
      )),
      ConditionKind::Text(t) if t.key.is_empty() => Err(Error::InvalidCondition(
        "text condition requires a key".to_owned(),
      )),
      ConditionKind::Kiwi(k) if k.pattern.is_empty() => Err(Error::InvalidCondition(
        format!("kiwi condition on key {:?} has an empty pattern", k.key),
      )),
      ConditionKind::Text(t) if t.term.trim().is_empty() => Err(Error::InvalidCondition(
        format!("text condition on key {:?} has an empty term", t.key),
      )),
      ConditionKind::Number(n) if n.key.is_empty() => Err(Error::InvalidCondition(
        "number condition requires a key".to_owned(),
      )),
      ConditionKind::Number(n) if n.op == Op::Undefined => Err(Error::InvalidCondition(
        format!("number condition on key {:?} has no operator", n.key),
      )),
      ConditionKind::Number(n) if !n.val.is_finite() => Err(Error::InvalidCondition(
        format!("number condition on key {:?} has a non-finite value", n.key),
      )),
      ConditionKind::Semantic(s) if s.query.trim().is_empty() => Err(Error::InvalidCondition(
        "semantic condition has an empty query".to_owned(),
      )),
      _ => Ok(()),
    }
  }

  /// Whether this sub-tree can select anything on its own, i.e. contains a
  /// path of non-negated nodes down to a leaf.
  fn includes(&self) -> bool {
    if self.not {
      return false;
    }
    match &self.kind {
      ConditionKind::Group(g) => g.group.iter().any(Condition::includes),
      _ => true,
    }
  }

  // ── Traversal ───────────────────────────────────────────────────────────

  /// Visit every leaf in pre-order.
  pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Condition)) {
    match &self.kind {
      ConditionKind::Group(g) => {
        for c in &g.group {
          c.walk(visit);
        }
      }
      _ => visit(self),
    }
  }

  /// All leaves in pre-order.
  pub fn leaves(&self) -> Vec<&Condition> {
    let mut out = Vec::new();
    self.walk(&mut |c| out.push(c));
    out
  }

  /// The duplicate-free leaf ids in first-seen order. Empty ids are skipped.
  pub fn cond_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    self.walk(&mut |c| {
      if let Some(id) = c.leaf_id()
        && !id.is_empty()
        && !ids.iter().any(|seen| seen == id)
      {
        ids.push(id.to_owned());
      }
    });
    ids
  }

  /// Rebuild the tree, replacing every leaf with `f(leaf)`. Groups keep
  /// their logic and negation; leaves are visited in pre-order.
  pub fn map_leaves(&self, f: &mut impl FnMut(&Condition) -> Condition) -> Condition {
    match &self.kind {
      ConditionKind::Group(g) => {
        let mut group = Vec::with_capacity(g.group.len());
        for c in &g.group {
          group.push(c.map_leaves(&mut *f));
        }
        Condition {
          not:  self.not,
          kind: ConditionKind::Group(GroupCondition { logic: g.logic, group }),
        }
      }
      _ => f(self),
    }
  }

  /// Rebuild the tree with every leaf id set to `assign(leaf)`.
  pub fn with_leaf_ids(&self, mut assign: impl FnMut(&Condition) -> String) -> Condition {
    self.map_leaves(&mut |leaf| {
      let mut out = leaf.clone();
      out.set_leaf_id(assign(leaf));
      out
    })
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
