//! ReplicationManager (C3): bidirectional entry transfer between peers,
//! Merkle root check, per-peer byte/seq accounting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use sha2::{Digest, Sha256};

use crate::error::HypercoreError;
use crate::log_store::LogStore;
use crate::registry::SharedLogStore;

#[derive(Debug, Clone, Default)]
pub struct ReplicationPeer {
    pub peer_id: String,
    pub address: String,
    pub connected_at: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub logs_replicated: Vec<String>,
    pub is_active: bool,
    pub last_synced_seq: HashMap<String, u64>,
}

impl ReplicationPeer {
    fn new(peer_id: impl Into<String>, address: impl Into<String>, now_ms: u64) -> Self {
        Self {
            peer_id: peer_id.into(),
            address: address.into(),
            connected_at: now_ms,
            is_active: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncResult {
    pub log_name: String,
    pub entries_sent: u64,
    pub entries_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub merkle_valid: bool,
    pub local_root: String,
    pub remote_root: String,
}

/// Hash of the concatenation of `hashes`; empty input hashes to the empty
/// string. Exposed as a standalone helper for tests — the store's actual
/// root is simply the hash of its last entry (see [`LogStore::root`]).
pub fn compute_merkle_root(hashes: &[String]) -> String {
    if hashes.is_empty() {
        return String::new();
    }
    let mut hasher = Sha256::new();
    for h in hashes {
        hasher.update(h.as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub struct ReplicationManager {
    self_peer_id: String,
    stores: Mutex<HashMap<String, Weak<Mutex<LogStore>>>>,
    peers: Mutex<HashMap<String, ReplicationPeer>>,
    enabled: Mutex<bool>,
}

impl ReplicationManager {
    pub fn new(self_peer_id: impl Into<String>) -> Self {
        Self {
            self_peer_id: self_peer_id.into(),
            stores: Mutex::new(HashMap::new()),
            peers: Mutex::new(HashMap::new()),
            enabled: Mutex::new(true),
        }
    }

    pub fn self_peer_id(&self) -> &str {
        &self.self_peer_id
    }

    /// Holds only a weak reference — the `LogRegistry` exclusively owns the store.
    pub fn register_store(&self, name: &str, log: &SharedLogStore) {
        self.stores
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::downgrade(log));
    }

    pub fn add_peer(&self, peer_id: &str, address: &str, now_ms: u64) {
        self.peers
            .lock()
            .unwrap()
            .entry(peer_id.to_string())
            .or_insert_with(|| ReplicationPeer::new(peer_id, address, now_ms));
    }

    pub fn remove_peer(&self, peer_id: &str) {
        self.peers.lock().unwrap().remove(peer_id);
    }

    pub fn get_peer(&self, peer_id: &str) -> Result<ReplicationPeer, HypercoreError> {
        self.peers
            .lock()
            .unwrap()
            .get(peer_id)
            .cloned()
            .ok_or_else(|| HypercoreError::PeerNotFound(peer_id.to_string()))
    }

    pub fn enable(&self) {
        *self.enabled.lock().unwrap() = true;
    }

    pub fn disable(&self) {
        *self.enabled.lock().unwrap() = false;
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.lock().unwrap()
    }

    /// For each log name present in both managers, transfer missing tail
    /// entries in both directions. Always locks `self`'s store before
    /// `other`'s; callers must not run `A.sync(B)` and `B.sync(A)`
    /// concurrently on the same log pair, or the fixed order deadlocks.
    pub fn sync(&self, other: &ReplicationManager) -> Vec<SyncResult> {
        if !self.is_enabled() || !other.is_enabled() {
            return Vec::new();
        }

        let mut names: Vec<String> = {
            let a = self.stores.lock().unwrap();
            let b = other.stores.lock().unwrap();
            a.keys().filter(|n| b.contains_key(*n)).cloned().collect()
        };
        names.sort();

        let mut results = Vec::new();
        for name in names {
            let local = {
                let g = self.stores.lock().unwrap();
                g.get(&name).and_then(Weak::upgrade)
            };
            let remote = {
                let g = other.stores.lock().unwrap();
                g.get(&name).and_then(Weak::upgrade)
            };
            let (Some(local), Some(remote)) = (local, remote) else {
                continue;
            };
            if Arc::ptr_eq(&local, &remote) {
                // Syncing a store against itself transfers nothing.
                let root = local.lock().unwrap().root();
                results.push(SyncResult {
                    log_name: name,
                    entries_sent: 0,
                    entries_received: 0,
                    bytes_sent: 0,
                    bytes_received: 0,
                    merkle_valid: true,
                    local_root: root.clone(),
                    remote_root: root,
                });
                continue;
            }

            let result = sync_one_log(&name, &local, &remote);
            self.update_peer_stats(other.self_peer_id(), &result);
            other.update_peer_stats(self.self_peer_id(), &inverse(&result));
            results.push(result);
        }
        results
    }

    fn update_peer_stats(&self, peer_id: &str, result: &SyncResult) {
        let mut peers = self.peers.lock().unwrap();
        if let Some(peer) = peers.get_mut(peer_id) {
            peer.bytes_sent += result.bytes_sent;
            peer.bytes_received += result.bytes_received;
            if !peer.logs_replicated.iter().any(|l| l == &result.log_name) {
                peer.logs_replicated.push(result.log_name.clone());
            }
        }
    }
}

fn inverse(r: &SyncResult) -> SyncResult {
    SyncResult {
        log_name: r.log_name.clone(),
        entries_sent: r.entries_received,
        entries_received: r.entries_sent,
        bytes_sent: r.bytes_received,
        bytes_received: r.bytes_sent,
        merkle_valid: r.merkle_valid,
        local_root: r.remote_root.clone(),
        remote_root: r.local_root.clone(),
    }
}

fn sync_one_log(
    name: &str,
    local: &Arc<Mutex<LogStore>>,
    remote: &Arc<Mutex<LogStore>>,
) -> SyncResult {
    let (entries_sent, entries_received, bytes_sent, bytes_received) = {
        let mut l = local.lock().unwrap();
        let mut r = remote.lock().unwrap();
        transfer(&mut l, &mut r)
    };

    let local_root = local.lock().unwrap().root();
    let remote_root = remote.lock().unwrap().root();
    let merkle_valid = local_root == remote_root;

    SyncResult {
        log_name: name.to_string(),
        entries_sent,
        entries_received,
        bytes_sent,
        bytes_received,
        merkle_valid,
        local_root,
        remote_root,
    }
}

/// Transfer missing tail entries in both directions between two already-locked stores.
/// Returns `(entries_sent, entries_received, bytes_sent, bytes_received)` from `local`'s
/// point of view.
fn transfer(local: &mut LogStore, remote: &mut LogStore) -> (u64, u64, u64, u64) {
    let local_len = local.length();
    let remote_len = remote.length();

    let mut entries_sent = 0u64;
    let mut bytes_sent = 0u64;
    if local_len > remote_len {
        let tail = local.export_entries(remote_len);
        bytes_sent = tail.iter().map(|e| e.byte_length as u64).sum();
        entries_sent = remote.import_entries(&tail);
    }

    let mut entries_received = 0u64;
    let mut bytes_received = 0u64;
    if remote_len > local_len {
        let tail = remote.export_entries(local_len);
        bytes_received = tail.iter().map(|e| e.byte_length as u64).sum();
        entries_received = local.import_entries(&tail);
    }

    (entries_sent, entries_received, bytes_sent, bytes_received)
}
