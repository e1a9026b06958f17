//! Attribute snapshot hashing for change detection.
//!
//! This module provides deterministic hashing of resource attribute maps to
//! detect changes between runs and enable idempotent planning.

use sha2::{Digest, Sha256};

use super::spec::AttrMap;

/// Hasher for computing attribute snapshot hashes.
#[derive(Debug, Default)]
pub struct AttrHasher;

impl AttrHasher {
    /// Creates a new attribute hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash over an attribute map.
    ///
    /// `AttrMap` is a `BTreeMap`, so its serialized form is canonical and the
    /// hash is stable across runs.
    #[must_use]
    pub fn hash_attributes(&self, attributes: &AttrMap) -> String {
        let mut hasher = Sha256::new();
        // BTreeMap iteration order is the canonical order.
        let canonical =
            serde_json::to_vec(attributes).unwrap_or_else(|_| b"<unserializable>".to_vec());
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes for equality.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        // Constant-time comparison.
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::spec::AttrValue;

    fn sample_attrs(cidr: &str) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert(
            String::from("cidr_block"),
            AttrValue::String(String::from(cidr)),
        );
        attrs.insert(String::from("az_count"), AttrValue::Integer(3));
        attrs
    }

    #[test]
    fn test_hash_deterministic() {
        let hasher = AttrHasher::new();
        let attrs = sample_attrs("10.0.0.0/16");

        assert_eq!(hasher.hash_attributes(&attrs), hasher.hash_attributes(&attrs));
    }

    #[test]
    fn test_changed_attribute_changes_hash() {
        let hasher = AttrHasher::new();

        let hash1 = hasher.hash_attributes(&sample_attrs("10.0.0.0/16"));
        let hash2 = hasher.hash_attributes(&sample_attrs("10.1.0.0/16"));

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_short_hash() {
        let hasher = AttrHasher::new();
        let short = hasher.short_hash("abcdef1234567890abcdef1234567890");

        assert_eq!(short, "abcdef12");
    }

    #[test]
    fn test_hashes_match() {
        assert!(AttrHasher::hashes_match("abc123", "abc123"));
        assert!(!AttrHasher::hashes_match("abc123", "abc124"));
        assert!(!AttrHasher::hashes_match("abc123", "abc12"));
    }
}
