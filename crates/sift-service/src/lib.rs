//! The sift service core.
//!
//! [`Service`] ties an [`InterestStore`](sift_core::store::InterestStore) to
//! the external condition registries. It owns the create protocol (register,
//! lock, commit, unlock, with compensation on failure), the best-effort
//! external cleanup on delete, and the paged condition scan that feeds a
//! [`MatchSink`].

#![allow(async_fn_in_trait)]

mod compensation;
pub mod ids;
pub mod retry;
pub mod service;
pub mod sink;

pub use retry::RetryPolicy;
pub use service::{ConditionSelector, KiwiTrees, Service, ServiceConfig, Stats};
pub use sink::{MatchSink, SinkClosed};
