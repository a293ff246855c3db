//! Hash-based identifiers for issues and links.
//!
//! Both kinds of identifier are SHA-256 digests rendered in base36:
//!
//! - **Link IDs** are a pure function of `(source, type, target)`, so the same
//!   edge read back from any backing store, from either endpoint, always has
//!   the same identifier. Format: `lnk-{12 chars}`.
//! - **Issue IDs** (in-memory store only) hash the title, the local number,
//!   and a nonce, retrying on collision. Format: `{prefix}-{6 chars}`.
//!
//! # Example
//!
//! ```
//! use meridian::domain::IssueId;
//! use meridian::ids::link_id;
//!
//! let a = link_id(&IssueId::new("mer-aaaa"), "blocks", &IssueId::new("mer-bbbb"));
//! let b = link_id(&IssueId::new("mer-aaaa"), "blocks", &IssueId::new("mer-bbbb"));
//! assert_eq!(a, b);
//! assert!(a.as_str().starts_with("lnk-"));
//! ```

use crate::domain::{IssueId, LinkId};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::debug;

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const LINK_ID_LENGTH: usize = 12;
const ISSUE_ID_LENGTH: usize = 6;
const MAX_NONCE: u32 = 100;

/// Derive the stable identifier of a link.
#[must_use]
pub fn link_id(source: &IssueId, link_type: &str, target: &IssueId) -> LinkId {
    let mut hasher = Sha256::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(link_type.as_bytes());
    hasher.update([0]);
    hasher.update(target.as_str().as_bytes());
    let digest = hasher.finalize();

    LinkId::new(format!(
        "lnk-{}",
        encode_base36(&digest[..16], LINK_ID_LENGTH)
    ))
}

/// Generator for in-memory issue identifiers with collision detection.
#[derive(Debug, Clone)]
pub struct IssueIdGenerator {
    prefix: String,
    existing_ids: HashSet<String>,
}

impl IssueIdGenerator {
    /// Create a generator for the given prefix (e.g. "mer").
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            existing_ids: HashSet::new(),
        }
    }

    /// Forget a previously issued ID so it may be produced again.
    pub fn release(&mut self, id: &IssueId) {
        self.existing_ids.remove(id.as_str());
    }

    /// Generate a new unique ID for an issue.
    ///
    /// Retries with an increasing nonce on collision; after [`MAX_NONCE`]
    /// attempts the local number is appended, which is unique by construction.
    pub fn generate(&mut self, title: &str, number: u64) -> IssueId {
        for nonce in 0..MAX_NONCE {
            let mut hasher = Sha256::new();
            hasher.update(format!("{title}|{number}|{nonce}").as_bytes());
            let digest = hasher.finalize();
            let candidate = format!(
                "{}-{}",
                self.prefix,
                encode_base36(&digest[..8], ISSUE_ID_LENGTH)
            );

            if self.existing_ids.insert(candidate.clone()) {
                if nonce > 0 {
                    debug!(nonce, "Generated unique issue ID after collision retries");
                }
                return IssueId::new(candidate);
            }
        }

        let fallback = format!("{}-n{number}", self.prefix);
        self.existing_ids.insert(fallback.clone());
        IssueId::new(fallback)
    }
}

/// Encode bytes as a fixed-length base36 string.
///
/// Bytes are folded into a `u128`, so at most 16 are significant; the
/// result is left-padded with `0` when the number is short.
fn encode_base36(bytes: &[u8], length: usize) -> String {
    let mut num: u128 = 0;
    for &byte in bytes.iter().take(16) {
        num = (num << 8) | u128::from(byte);
    }

    let mut result = Vec::with_capacity(length);
    while result.len() < length {
        let remainder = usize::try_from(num % 36).unwrap_or_default();
        result.push(char::from(BASE36_CHARS[remainder]));
        num /= 36;
    }

    result.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_id_depends_on_direction_and_type() {
        let a = IssueId::new("a");
        let b = IssueId::new("b");
        assert_ne!(link_id(&a, "blocks", &b), link_id(&b, "blocks", &a));
        assert_ne!(link_id(&a, "blocks", &b), link_id(&a, "duplicates", &b));
    }

    #[test]
    fn test_link_id_format() {
        let id = link_id(&IssueId::new("a"), "blocks", &IssueId::new("b"));
        let hash = id.as_str().strip_prefix("lnk-").unwrap();
        assert_eq!(hash.len(), LINK_ID_LENGTH);
        assert!(hash.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_issue_ids_are_unique_for_identical_titles() {
        let mut generator = IssueIdGenerator::new("mer");
        let first = generator.generate("Same title", 1);
        let second = generator.generate("Same title", 1);
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("mer-"));
    }

    #[test]
    fn test_encode_base36_pads_to_length() {
        assert_eq!(encode_base36(&[0], 4), "0000");
        assert_eq!(encode_base36(&[35], 2), "0z");
    }
}
