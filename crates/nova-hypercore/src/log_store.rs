//! LogStore (C1): single append-only log with hash chain, signatures, range
//! reads, and a payload cap.

use ed25519_dalek::{Signer, SigningKey, Verifier};
use serde_json::Value;

use crate::entry::LogEntry;
use crate::error::HypercoreError;

/// Result of a single [`LogStore::append`] call.
#[derive(Debug, Clone)]
pub struct AppendResult {
    pub seq: u64,
    pub hash: String,
    pub byte_length: u32,
}

/// A single append-only log: hash chain, optional Ed25519 signing, range
/// reads, and a payload cap.
///
/// Invariants: `length()` is monotonically non-decreasing; `entries[i].seq
/// == i`; `entries[i].hash` depends on `entries[i-1].hash`; for any `i`,
/// `verify_signature(i)` returns true whenever the store is keyed.
pub struct LogStore {
    name: String,
    entries: Vec<LogEntry>,
    writable: bool,
    max_payload_bytes: u32,
    keypair: Option<SigningKey>,
}

impl LogStore {
    pub fn new(name: impl Into<String>, max_payload_bytes: u32) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            writable: true,
            max_payload_bytes,
            keypair: None,
        }
    }

    pub fn with_keypair(mut self, keypair: SigningKey) -> Self {
        self.keypair = Some(keypair);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    /// Serialise `data` to canonical bytes, hash-chain it onto the tail, and
    /// (if keyed) sign it.
    pub fn append(&mut self, data: Value, now_ms: u64) -> Result<AppendResult, HypercoreError> {
        if !self.writable {
            return Err(HypercoreError::NotWritable(self.name.clone()));
        }

        let byte_length = crate::canonical::canonical_bytes(&data).len();
        if byte_length > self.max_payload_bytes as usize {
            return Err(HypercoreError::PayloadTooLarge {
                size: byte_length,
                max: self.max_payload_bytes,
            });
        }

        let seq = self.entries.len() as u64;
        let prev_hash = self.entries.last().map(|e| e.hash.as_str()).unwrap_or("");
        let hash = LogEntry::compute_hash(seq, prev_hash, &data);

        let signature = self.keypair.as_ref().map(|kp| {
            let bytes = LogEntry::signable_bytes(seq, &hash, &data);
            hex::encode(kp.sign(&bytes).to_bytes())
        });

        let entry = LogEntry {
            seq,
            hash: hash.clone(),
            timestamp: now_ms,
            byte_length: byte_length as u32,
            data,
            signature,
        };
        let result = AppendResult {
            seq,
            hash,
            byte_length: entry.byte_length,
        };
        self.entries.push(entry);
        tracing::debug!(log = %self.name, seq, "appended entry");
        Ok(result)
    }

    pub fn get(&self, seq: u64) -> Result<&LogEntry, HypercoreError> {
        self.entries.get(seq as usize).ok_or(HypercoreError::OutOfRange {
            seq,
            length: self.length(),
        })
    }

    /// Clamps `[start, end)` to `[0, length)` and returns an ordered slice.
    pub fn get_range(&self, start: u64, end: Option<u64>) -> Vec<LogEntry> {
        let len = self.length();
        let start = start.min(len);
        let end = end.unwrap_or(len).min(len);
        if start >= end {
            return Vec::new();
        }
        self.entries[start as usize..end as usize].to_vec()
    }

    pub fn length(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Degenerate Merkle root: hash of the last entry, empty string if empty.
    pub fn root(&self) -> String {
        self.entries.last().map(|e| e.hash.clone()).unwrap_or_default()
    }

    /// Recompute every hash from the head; `Err(ChainCorrupted)` names the
    /// first seq whose hash doesn't match.
    pub fn verify_chain(&self) -> Result<(), HypercoreError> {
        let mut prev_hash = String::new();
        for entry in &self.entries {
            let expected = LogEntry::compute_hash(entry.seq, &prev_hash, &entry.data);
            if expected != entry.hash {
                return Err(HypercoreError::ChainCorrupted { seq: entry.seq });
            }
            prev_hash = entry.hash.clone();
        }
        Ok(())
    }

    /// Re-verify the Ed25519 signature over entry `seq`'s canonical bytes.
    /// An unkeyed store or an unsigned entry is not an error — there is
    /// nothing to verify, so this returns `Ok(())`.
    pub fn verify_signature(&self, seq: u64) -> Result<(), HypercoreError> {
        let entry = self.get(seq)?;
        let Some(keypair) = &self.keypair else {
            return Ok(());
        };
        let Some(sig_hex) = &entry.signature else {
            return Ok(());
        };
        let valid = hex::decode(sig_hex)
            .ok()
            .and_then(|bytes| <[u8; 64]>::try_from(bytes).ok())
            .map(|sig_arr| {
                let sig = ed25519_dalek::Signature::from_bytes(&sig_arr);
                let bytes = LogEntry::signable_bytes(entry.seq, &entry.hash, &entry.data);
                keypair.verifying_key().verify(&bytes, &sig).is_ok()
            })
            .unwrap_or(false);
        if valid {
            Ok(())
        } else {
            Err(HypercoreError::SignatureInvalid { seq })
        }
    }

    pub fn export_entries(&self, from_seq: u64) -> Vec<LogEntry> {
        self.get_range(from_seq, None)
    }

    /// Add only entries with `seq >= length()` contiguous to the tail;
    /// refuses any gap or mismatching prev-hash by silently skipping it
    /// (and everything after it), counting only successful adds.
    pub fn import_entries(&mut self, entries: &[LogEntry]) -> u64 {
        let mut added = 0u64;
        for entry in entries {
            let expected_seq = self.length();
            if entry.seq != expected_seq {
                break;
            }
            let prev_hash = self.entries.last().map(|e| e.hash.as_str()).unwrap_or("");
            let expected_hash = LogEntry::compute_hash(entry.seq, prev_hash, &entry.data);
            if expected_hash != entry.hash {
                break;
            }
            self.entries.push(entry.clone());
            added += 1;
        }
        added
    }
}
