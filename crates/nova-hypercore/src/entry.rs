//! [`LogEntry`] — a single append-only record in a [`crate::LogStore`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::canonical_bytes;

/// A single entry in an append-only log.
///
/// Once appended, no field ever changes: `seq` equals its index in the
/// owning log, `hash` is deterministic over `(seq, previous_hash, data)`, and
/// `signature` (when the store is keyed) covers the same canonical bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub seq: u64,
    pub hash: String,
    pub timestamp: u64,
    pub byte_length: u32,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl LogEntry {
    /// Canonical bytes of `data`, used both for hashing and signing.
    pub fn canonical_data(&self) -> Vec<u8> {
        canonical_bytes(&self.data)
    }

    /// `H(seq ∥ prev_hash ∥ canonical_data)` — a 256-bit collision-resistant hash.
    pub fn compute_hash(seq: u64, prev_hash: &str, data: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(seq.to_be_bytes());
        hasher.update(prev_hash.as_bytes());
        hasher.update(canonical_bytes(data));
        hex::encode(hasher.finalize())
    }

    /// Bytes signed by the store's keypair for this entry: `seq ∥ hash ∥ data`.
    pub fn signable_bytes(seq: u64, hash: &str, data: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&seq.to_be_bytes());
        out.extend_from_slice(hash.as_bytes());
        out.extend_from_slice(&canonical_bytes(data));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_depends_on_seq_prev_and_data() {
        let h1 = LogEntry::compute_hash(0, "", &json!({"v": "a"}));
        let h2 = LogEntry::compute_hash(1, &h1, &json!({"v": "b"}));
        assert_ne!(h1, h2);

        // identical inputs produce byte-identical hashes
        let h1_again = LogEntry::compute_hash(0, "", &json!({"v": "a"}));
        assert_eq!(h1, h1_again);
    }

    #[test]
    fn hash_changes_if_prev_hash_changes() {
        let h_a = LogEntry::compute_hash(1, "aaa", &json!({"v": 1}));
        let h_b = LogEntry::compute_hash(1, "bbb", &json!({"v": 1}));
        assert_ne!(h_a, h_b);
    }
}
