//! Undo log for external registrations made while creating an interest.
//!
//! Every unlock and delete runs on a spawned task under its own timeout, so
//! a cancelled request still releases what it pinned.

use std::{sync::Arc, time::Duration};

use sift_core::{
  Result,
  condition::{Condition, ConditionKind},
  registry::{KiwiTree, Registration, TextConditions},
};
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, warn};

use crate::service::KiwiTrees;

// ─── External leaves ─────────────────────────────────────────────────────────

/// A leaf whose payload lives in an external registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum External {
  KiwiTree {
    partial: bool,
    key:     String,
    pattern: String,
  },
  Text {
    id: String,
  },
}

impl External {
  /// The registry entry behind `leaf`, if any. Text leaves must already
  /// carry their registry id.
  pub fn of(leaf: &Condition) -> Option<Self> {
    match &leaf.kind {
      ConditionKind::Kiwi(k) if k.tree => Some(Self::KiwiTree {
        partial: k.partial,
        key:     k.key.clone(),
        pattern: k.pattern.clone(),
      }),
      ConditionKind::Text(t) if !t.id.is_empty() => Some(Self::Text { id: t.id.clone() }),
      _ => None,
    }
  }

  pub async fn lock<K: KiwiTree, T: TextConditions>(
    &self,
    kiwi: &KiwiTrees<K>,
    text: &T,
  ) -> Result<()> {
    match self {
      Self::KiwiTree { partial, key, pattern } => {
        kiwi.role(*partial).lock_create(key, pattern).await
      }
      Self::Text { id } => text.lock_create(id).await,
    }
  }

  pub async fn unlock<K: KiwiTree, T: TextConditions>(
    &self,
    kiwi: &KiwiTrees<K>,
    text: &T,
  ) -> Result<()> {
    match self {
      Self::KiwiTree { partial, key, pattern } => {
        kiwi.role(*partial).unlock_create(key, pattern).await
      }
      Self::Text { id } => text.unlock_create(id).await,
    }
  }

  pub async fn delete<K: KiwiTree, T: TextConditions>(
    &self,
    kiwi: &KiwiTrees<K>,
    text: &T,
  ) -> Result<()> {
    match self {
      Self::KiwiTree { partial, key, pattern } => kiwi.role(*partial).delete(key, pattern).await,
      Self::Text { id } => text.delete(id).await,
    }
  }
}

// ─── Compensation ────────────────────────────────────────────────────────────

/// Tracks what a create call registered and pinned.
///
/// Resolve it with [`commit`](Self::commit) or [`rollback`](Self::rollback).
/// If it is dropped unresolved (the request was cancelled), the rollback is
/// spawned from `Drop`.
pub(crate) struct Compensation<K, T>
where
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  kiwi:    KiwiTrees<K>,
  text:    Arc<T>,
  timeout: Duration,
  /// Entries this call created; only these are deleted on rollback.
  created: Vec<External>,
  locked:  Vec<External>,
  armed:   bool,
}

impl<K, T> Compensation<K, T>
where
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  pub fn new(kiwi: KiwiTrees<K>, text: Arc<T>, timeout: Duration) -> Self {
    Self { kiwi, text, timeout, created: Vec::new(), locked: Vec::new(), armed: true }
  }

  pub fn registered(&mut self, external: External, registration: Registration) {
    if registration.is_fresh() {
      self.created.push(external);
    }
  }

  pub fn locked(&mut self, external: External) { self.locked.push(external); }

  /// The record is stored: release the pins, keep the entries.
  pub async fn commit(mut self) {
    let locked = std::mem::take(&mut self.locked);
    self.created.clear();
    self.armed = false;
    if let Some(handle) = self.spawn(locked, Vec::new()) {
      let _ = handle.await;
    }
  }

  /// Undo everything: unlock in reverse order, then delete fresh entries in
  /// reverse order. Failures are logged.
  pub async fn rollback(mut self) {
    let locked = std::mem::take(&mut self.locked);
    let created = std::mem::take(&mut self.created);
    self.armed = false;
    if let Some(handle) = self.spawn(locked, created) {
      let _ = handle.await;
    }
  }

  fn spawn(&self, locked: Vec<External>, created: Vec<External>) -> Option<JoinHandle<()>> {
    if locked.is_empty() && created.is_empty() {
      return None;
    }
    let Ok(runtime) = Handle::try_current() else {
      warn!(
        locked = locked.len(),
        created = created.len(),
        "no runtime to compensate on; external entries left behind"
      );
      return None;
    };

    let kiwi = self.kiwi.clone();
    let text = self.text.clone();
    let timeout = self.timeout;
    Some(runtime.spawn(async move {
      let undo = undo(&kiwi, text.as_ref(), &locked, &created);
      if tokio::time::timeout(timeout, undo).await.is_err() {
        warn!(?timeout, "compensation timed out");
      }
    }))
  }
}

impl<K, T> Drop for Compensation<K, T>
where
  K: KiwiTree + 'static,
  T: TextConditions + 'static,
{
  fn drop(&mut self) {
    if !self.armed {
      return;
    }
    debug!("create abandoned; compensating in the background");
    let locked = std::mem::take(&mut self.locked);
    let created = std::mem::take(&mut self.created);
    drop(self.spawn(locked, created));
  }
}

async fn undo<K: KiwiTree, T: TextConditions>(
  kiwi: &KiwiTrees<K>,
  text: &T,
  locked: &[External],
  created: &[External],
) {
  for external in locked.iter().rev() {
    if let Err(e) = external.unlock(kiwi, text).await {
      warn!(?external, error = %e, "unlock failed");
    }
  }
  for external in created.iter().rev() {
    match external.delete(kiwi, text).await {
      Ok(()) => debug!(?external, "registration rolled back"),
      Err(e) => warn!(?external, error = %e, "rollback delete failed"),
    }
  }
}
