//! [`Service`]: interest CRUD and condition scans over a store and the
//! external registries.

use std::{sync::Arc, time::Duration};

use sift_core::{
  Error, Result,
  condition::{Condition, ConditionKind},
  interest::{Interest, InterestData, Metadata, Owner},
  registry::{KiwiTree, TextConditions},
  store::{ConditionQuery, Cursor, InterestStore, Query},
};
use tracing::{debug, warn};

use crate::{
  RetryPolicy,
  compensation::{Compensation, External},
  ids::{kiwi_tree_id, local_id},
  sink::MatchSink,
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServiceConfig {
  /// Page size for [`Service::search_own`] when the caller gives none.
  pub search_limit_default: u32,
  pub search_limit_max:     u32,
  /// Storage page size for [`Service::search_by_condition`].
  pub scan_page_size:       u32,
  pub compensation_timeout: Duration,
  pub retry:                RetryPolicy,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      search_limit_default: 100,
      search_limit_max:     1000,
      scan_page_size:       100,
      compensation_timeout: Duration::from_secs(10),
      retry:                RetryPolicy::default(),
    }
  }
}

/// One kiwi-tree per role: `complete` serves `partial = false` patterns,
/// `partial` serves `partial = true` ones.
pub struct KiwiTrees<K> {
  pub complete: Arc<K>,
  pub partial:  Arc<K>,
}

impl<K> KiwiTrees<K> {
  pub fn new(complete: Arc<K>, partial: Arc<K>) -> Self { Self { complete, partial } }

  pub fn role(&self, partial: bool) -> &K {
    if partial { &self.partial } else { &self.complete }
  }
}

impl<K> Clone for KiwiTrees<K> {
  fn clone(&self) -> Self {
    Self { complete: self.complete.clone(), partial: self.partial.clone() }
  }
}

/// What a condition scan looks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionSelector {
  /// A kiwi-tree leaf, resolved to its deterministic id.
  Kiwi {
    key:     String,
    pattern: String,
    partial: bool,
  },
  /// A raw condition id.
  Id(String),
}

impl ConditionSelector {
  pub fn cond_id(&self) -> String {
    match self {
      Self::Kiwi { key, pattern, partial } => kiwi_tree_id(*partial, key, pattern),
      Self::Id(id) => id.clone(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
  pub count:        u64,
  pub users_unique: u64,
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Leaf identity after registration.
struct Assigned {
  id:   String,
  /// Normalized term for text leaves.
  term: Option<String>,
}

pub struct Service<S, K, T> {
  store:  Arc<S>,
  kiwi:   KiwiTrees<K>,
  text:   Arc<T>,
  config: ServiceConfig,
}

impl<S, K, T> Clone for Service<S, K, T> {
  fn clone(&self) -> Self {
    Self {
      store:  self.store.clone(),
      kiwi:   self.kiwi.clone(),
      text:   self.text.clone(),
      config: self.config.clone(),
    }
  }
}

/// Structural identity of a leaf for registration: payload only, no
/// negation and no id.
fn leaf_key(leaf: &Condition) -> Condition {
  let mut key = Condition::new(leaf.kind.clone());
  key.set_leaf_id("");
  key
}

impl<S, K, T> Service<S, K, T>
where
  S: InterestStore + 'static,
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  pub fn new(store: Arc<S>, kiwi: KiwiTrees<K>, text: Arc<T>, config: ServiceConfig) -> Self {
    Self { store, kiwi, text, config }
  }

  pub fn config(&self) -> &ServiceConfig { &self.config }

  // ── Create ──────────────────────────────────────────────────────────────

  /// Validate, register external leaves, pin them, store the interest and
  /// unpin. Any failure before the store commit undoes the registrations
  /// this call made.
  ///
  /// Dropping the future before the write starts compensates in the
  /// background. Once the write has started it runs to completion, followed
  /// by its commit or rollback.
  pub async fn create(&self, owner: &Owner, data: InterestData) -> Result<String> {
    data.condition.validate()?;

    let mut comp = Compensation::new(
      self.kiwi.clone(),
      self.text.clone(),
      self.config.compensation_timeout,
    );

    let assigned = match self.register_leaves(&data.condition, &mut comp).await {
      Ok(assigned) => assigned,
      Err(e) => {
        comp.rollback().await;
        return Err(e);
      }
    };

    let externals = assigned
      .iter()
      .filter_map(|(key, a)| {
        let mut leaf = key.clone();
        leaf.set_leaf_id(a.id.clone());
        External::of(&leaf)
      })
      .collect::<Vec<_>>();
    for external in externals {
      let locked = self
        .config
        .retry
        .run("lock", || external.lock(&self.kiwi, self.text.as_ref()))
        .await;
      if let Err(e) = locked {
        warn!(?external, error = %e, "lock failed; rolling back");
        comp.rollback().await;
        return Err(e);
      }
      comp.locked(external);
    }

    let condition = data.condition.map_leaves(&mut |leaf| {
      let mut out = leaf.clone();
      let key = leaf_key(leaf);
      if let Some((_, a)) = assigned.iter().find(|(k, _)| k.equal(&key)) {
        out.set_leaf_id(a.id.clone());
        if let (ConditionKind::Text(t), Some(term)) = (&mut out.kind, &a.term) {
          t.term = term.clone();
        }
      }
      out
    });

    let data = InterestData { metadata: data.metadata, condition };
    let store = self.store.clone();
    let owner = owner.clone();

    // The write and its commit or rollback run as one detached task; a
    // cancelled caller cannot split them.
    let persist = tokio::spawn(async move {
      match store.create(&owner, data).await {
        Ok(id) => {
          comp.commit().await;
          debug!(interest_id = %id, "interest created");
          Ok(id)
        }
        Err(e) => {
          let e: Error = e.into();
          warn!(error = %e, "store create failed; rolling back");
          comp.rollback().await;
          Err(e)
        }
      }
    });
    persist
      .await
      .map_err(|e| Error::Internal(format!("interest write task failed: {e}")))?
  }

  /// Register each distinct leaf once, in pre-order.
  async fn register_leaves(
    &self,
    root: &Condition,
    comp: &mut Compensation<K, T>,
  ) -> Result<Vec<(Condition, Assigned)>> {
    let mut assigned: Vec<(Condition, Assigned)> = Vec::new();

    for leaf in root.leaves() {
      let key = leaf_key(leaf);
      if assigned.iter().any(|(k, _)| k.equal(&key)) {
        continue;
      }

      let a = match &key.kind {
        ConditionKind::Kiwi(k) if k.tree => {
          let tree = self.kiwi.role(k.partial);
          let (name, pattern) = (k.key.as_str(), k.pattern.as_str());
          let registration = self
            .config
            .retry
            .run("kiwi-tree create", move || tree.create(name, pattern))
            .await?;
          comp.registered(
            External::KiwiTree { partial: k.partial, key: k.key.clone(), pattern: k.pattern.clone() },
            registration,
          );
          Assigned { id: kiwi_tree_id(k.partial, &k.key, &k.pattern), term: None }
        }
        ConditionKind::Text(t) => {
          let text = self.text.as_ref();
          let (name, term, exact) = (t.key.as_str(), t.term.as_str(), t.exact);
          let reg = self
            .config
            .retry
            .run("text create", move || text.create(name, term, exact))
            .await?;
          comp.registered(External::Text { id: reg.id.clone() }, reg.registration);
          Assigned { id: reg.id, term: Some(reg.term) }
        }
        _ => Assigned { id: local_id(), term: None },
      };
      assigned.push((key, a));
    }

    Ok(assigned)
  }

  // ── Read / update / delete ──────────────────────────────────────────────

  pub async fn read(&self, id: &str, owner: &Owner) -> Result<Interest> {
    self.store.read(id, owner).await.map_err(Into::into)
  }

  /// Replace the metadata. The condition is never touched.
  pub async fn update_metadata(&self, id: &str, owner: &Owner, metadata: Metadata) -> Result<()> {
    self.store.update(id, owner, metadata).await.map_err(Into::into)?;
    Ok(())
  }

  /// Remove the interest, then delete each external leaf no other interest
  /// references. Cleanup failures are logged, never returned.
  pub async fn delete(&self, id: &str, owner: &Owner) -> Result<()> {
    let removed = self.store.delete(id, owner).await.map_err(Into::into)?;
    debug!(interest_id = %id, "interest deleted");

    let mut seen: Vec<&str> = Vec::new();
    for leaf in removed.data.condition.leaves() {
      let (Some(cond_id), Some(external)) = (leaf.leaf_id(), External::of(leaf)) else {
        continue;
      };
      if cond_id.is_empty() || seen.contains(&cond_id) {
        continue;
      }
      seen.push(cond_id);

      let query = ConditionQuery { cond_id: cond_id.to_owned(), limit: 1, include_inactive: true };
      match self.store.search_by_condition(&query, "").await {
        Ok(rows) if rows.is_empty() => match external.delete(&self.kiwi, self.text.as_ref()).await {
          Ok(()) => debug!(cond_id, "external leaf removed"),
          Err(e) => warn!(cond_id, ?external, error = %e, "external leaf cleanup failed"),
        },
        Ok(_) => debug!(cond_id, "external leaf still referenced"),
        Err(e) => {
          let e: Error = e.into();
          warn!(cond_id, error = %e, "reference check failed; leaf kept");
        }
      }
    }
    Ok(())
  }

  // ── Listings ────────────────────────────────────────────────────────────

  /// One page of the owner's interest ids. A zero limit means the default;
  /// larger limits are capped.
  pub async fn search_own(&self, mut query: Query, cursor: &Cursor) -> Result<Vec<String>> {
    query.limit = match query.limit {
      0 => self.config.search_limit_default,
      n => n.min(self.config.search_limit_max),
    };
    self.store.search(&query, cursor).await.map_err(Into::into)
  }

  /// Stream every active interest containing the selected leaf into `sink`,
  /// in interest id order after `cursor`. Stops early when the sink closes.
  /// Returns the number of matches delivered.
  pub async fn search_by_condition(
    &self,
    selector: &ConditionSelector,
    cursor: &str,
    sink: &mut impl MatchSink,
  ) -> Result<u64> {
    let query = ConditionQuery {
      cond_id:          selector.cond_id(),
      limit:            self.config.scan_page_size.max(1),
      include_inactive: false,
    };
    let mut cursor = cursor.to_owned();
    let mut delivered = 0;

    loop {
      let page = self
        .store
        .search_by_condition(&query, &cursor)
        .await
        .map_err(Into::into)?;
      let full = page.len() >= query.limit as usize;

      for m in page {
        cursor.clone_from(&m.interest_id);
        if sink.accept(m).await.is_err() {
          debug!(cond_id = %query.cond_id, delivered, "scan consumer gone");
          return Ok(delivered);
        }
        delivered += 1;
      }
      if !full {
        break;
      }
    }

    debug!(cond_id = %query.cond_id, delivered, "scan complete");
    Ok(delivered)
  }

  // ── Private helpers ─────────────────────────────────────────────────────

  pub async fn update_followers(&self, id: &str, delta: i64) -> Result<()> {
    self.store.update_followers(id, delta).await.map_err(Into::into)
  }

  pub async fn stats(&self) -> Result<Stats> {
    Ok(Stats {
      count:        self.store.count().await.map_err(Into::into)?,
      users_unique: self.store.count_users_unique().await.map_err(Into::into)?,
    })
  }

  pub async fn close(&self) -> Result<()> { self.store.close().await.map_err(Into::into) }
}
