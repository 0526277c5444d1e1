//! HTTP clients for the external condition registries.
//!
//! [`HttpKiwiTree`] implements [`sift_core::registry::KiwiTree`] and
//! [`HttpTextConditions`] implements [`sift_core::registry::TextConditions`].
//! Both speak RPC-style JSON: every method is a `POST {base}/v1/<method>`.

mod http;
pub mod error;
pub mod kiwi_tree;
pub mod text;

pub use error::{Error, Result};
pub use http::ClientConfig;
pub use kiwi_tree::HttpKiwiTree;
pub use text::HttpTextConditions;
