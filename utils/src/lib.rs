//! # Context Engine Utilities
//!
//! Hashing and id generation shared by the workspace crates.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Compute SHA-256 hash of content string
///
/// # Examples
///
/// ```
/// use utils::compute_content_hash;
///
/// let hash = compute_content_hash("hello world");
/// assert_eq!(hash.len(), 64);
/// ```
#[must_use]
pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fingerprint a JSON value.
///
/// `serde_json::Map` keeps keys sorted, so two values that compare equal
/// always serialize to the same bytes and therefore hash identically.
#[must_use]
pub fn compute_json_hash(value: &serde_json::Value) -> String {
    compute_content_hash(&value.to_string())
}

/// Generate a random v4 UUID.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}
