//! Leaf id minting.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Deterministic id of a kiwi-tree leaf: hex SHA-256 over
/// `(partial, key, pattern)`. Equal leaves in different interests share it.
pub fn kiwi_tree_id(partial: bool, key: &str, pattern: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update([u8::from(partial)]);
  hasher.update((key.len() as u64).to_le_bytes());
  hasher.update(key.as_bytes());
  hasher.update(pattern.as_bytes());
  hex::encode(hasher.finalize())
}

/// Fresh id for a leaf that lives only in the store.
pub fn local_id() -> String { Uuid::new_v4().to_string() }
