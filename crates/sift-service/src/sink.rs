//! Consumers of a streaming condition scan.

use std::future::Future;

use sift_core::interest::ConditionMatch;
use thiserror::Error;
use tokio::sync::mpsc;

/// The consumer went away; the scan stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("match sink closed")]
pub struct SinkClosed;

/// Receives scan results one at a time, in scan order.
pub trait MatchSink: Send {
  fn accept(
    &mut self,
    m: ConditionMatch,
  ) -> impl Future<Output = Result<(), SinkClosed>> + Send + '_;
}

/// Forwards into a bounded channel; fails once the receiver is dropped.
impl MatchSink for mpsc::Sender<ConditionMatch> {
  async fn accept(&mut self, m: ConditionMatch) -> Result<(), SinkClosed> {
    self.send(m).await.map_err(|_| SinkClosed)
  }
}

/// Collects everything.
impl MatchSink for Vec<ConditionMatch> {
  async fn accept(&mut self, m: ConditionMatch) -> Result<(), SinkClosed> {
    self.push(m);
    Ok(())
  }
}
