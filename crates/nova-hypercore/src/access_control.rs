//! AccessControl (C8): ACL, Ed25519 keypairs, challenge-response peer auth,
//! authenticated symmetric payload encryption, and discovery-key derivation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use crate::error::HypercoreError;

// ── ACL ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
    NoAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct Policy {
    pub mode: AccessMode,
    /// Unix millis; `None` never expires.
    pub expires_at: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub allowed: bool,
    pub mode: AccessMode,
}

const WILDCARD: &str = "*";

/// Per-store table of `{peer_id → {mode, expires_at?}}` with a `"*"` wildcard
/// entry, exact match overriding wildcard, and expired entries acting as
/// absent.
#[derive(Debug, Default)]
pub struct Acl {
    // store_name -> peer_id -> Policy
    tables: Mutex<HashMap<String, HashMap<String, Policy>>>,
}

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, store: &str, peer: &str, mode: AccessMode, expires_at: Option<u64>) {
        let mut g = self.tables.lock().unwrap();
        g.entry(store.to_string())
            .or_default()
            .insert(peer.to_string(), Policy { mode, expires_at });
    }

    pub fn revoke(&self, store: &str, peer: &str) {
        let mut g = self.tables.lock().unwrap();
        if let Some(table) = g.get_mut(store) {
            table.remove(peer);
        }
    }

    pub fn clear_store(&self, store: &str) {
        self.tables.lock().unwrap().remove(store);
    }

    pub fn list(&self, store: &str) -> Vec<(String, Policy)> {
        let g = self.tables.lock().unwrap();
        g.get(store)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// `check` never throws: an unknown store, unknown peer, and expired
    /// policy all fall through to the origin-based default.
    pub fn check(
        &self,
        store: &str,
        peer: &str,
        access: AccessKind,
        origin: Origin,
        now_ms: u64,
    ) -> CheckResult {
        let mode = self.effective_mode(store, peer, now_ms).unwrap_or(match origin {
            Origin::Local => AccessMode::ReadWrite,
            Origin::Remote => AccessMode::ReadOnly,
        });
        let allowed = match (mode, access) {
            (AccessMode::NoAccess, _) => false,
            (AccessMode::ReadOnly, AccessKind::Read) => true,
            (AccessMode::ReadOnly, AccessKind::Write) => false,
            (AccessMode::ReadWrite, _) => true,
        };
        CheckResult { allowed, mode }
    }

    fn effective_mode(&self, store: &str, peer: &str, now_ms: u64) -> Option<AccessMode> {
        let g = self.tables.lock().unwrap();
        let table = g.get(store)?;
        let live = |p: &Policy| p.expires_at.is_none_or(|exp| exp > now_ms);

        if let Some(p) = table.get(peer) {
            if live(p) {
                return Some(p.mode);
            }
        }
        if let Some(p) = table.get(WILDCARD) {
            if live(p) {
                return Some(p.mode);
            }
        }
        None
    }
}

// ── Encryption ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EncryptedPayload {
    pub iv: String,
    pub ciphertext: String,
    pub tag: String,
}

/// Encrypt `value` under `key` (32 raw bytes) with a fresh random 12-byte IV.
///
/// ChaCha20-Poly1305 appends its 16-byte authentication tag to the
/// ciphertext; we split it back out here so the wire shape matches the
/// spec's `{iv, ciphertext, tag}` triple.
pub fn encrypt_payload(value: &[u8], key: &[u8; 32]) -> EncryptedPayload {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut iv_bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut iv_bytes);
    let nonce = Nonce::from_slice(&iv_bytes);
    let mut sealed = cipher.encrypt(nonce, value).expect("chacha20poly1305 encrypt");
    let tag = sealed.split_off(sealed.len() - 16);
    EncryptedPayload {
        iv: hex::encode(iv_bytes),
        ciphertext: hex::encode(sealed),
        tag: hex::encode(tag),
    }
}

/// Decrypt a payload produced by [`encrypt_payload`]. Fails on tampering or a
/// wrong key — never panics.
pub fn decrypt_payload(
    payload: &EncryptedPayload,
    key: &[u8; 32],
) -> Result<Vec<u8>, HypercoreError> {
    let iv = hex::decode(&payload.iv).map_err(|_| HypercoreError::DecryptionFailed)?;
    let mut ct = hex::decode(&payload.ciphertext).map_err(|_| HypercoreError::DecryptionFailed)?;
    let tag = hex::decode(&payload.tag).map_err(|_| HypercoreError::DecryptionFailed)?;
    if iv.len() != 12 || tag.len() != 16 {
        return Err(HypercoreError::DecryptionFailed);
    }
    ct.extend_from_slice(&tag);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(&iv), ct.as_ref())
        .map_err(|_| HypercoreError::DecryptionFailed)
}

// ── Keys ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,
}

pub fn generate_key_pair() -> KeyPair {
    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);
    let signing_key = SigningKey::from_bytes(&seed);
    KeyPair {
        public_key: hex::encode(signing_key.verifying_key().to_bytes()),
        private_key: hex::encode(signing_key.to_bytes()),
    }
}

pub fn signing_key_from_hex(private_key: &str) -> Result<SigningKey, HypercoreError> {
    let bytes = hex::decode(private_key).map_err(|e| HypercoreError::Keypair(e.to_string()))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| HypercoreError::Keypair("private key must be 32 bytes".into()))?;
    Ok(SigningKey::from_bytes(&arr))
}

fn verifying_key_from_hex(public_key: &str) -> Option<VerifyingKey> {
    let bytes = hex::decode(public_key).ok()?;
    let arr: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&arr).ok()
}

pub fn sign_challenge(msg: &[u8], private_key: &str) -> Result<String, HypercoreError> {
    let key = signing_key_from_hex(private_key)?;
    Ok(hex::encode(key.sign(msg).to_bytes()))
}

/// Never throws: malformed hex, a malformed signature, or a mismatched
/// signature all simply return `false`.
pub fn verify_challenge(msg: &[u8], signature: &str, public_key: &str) -> bool {
    let Some(verifying_key) = verifying_key_from_hex(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(sig_arr): Result<[u8; 64], _> = sig_bytes.try_into() else {
        return false;
    };
    let sig = Signature::from_bytes(&sig_arr);
    verifying_key.verify(msg, &sig).is_ok()
}

// ── Discovery key ─────────────────────────────────────────────────────────────

/// Deterministic, HKDF-SHA256-derived discovery key: announceable without
/// revealing `store_name`, reproducible by any holder of `secret`.
pub fn derive_discovery_key(store_name: &str, secret: &[u8]) -> String {
    let hk = Hkdf::<Sha256>::new(None, secret);
    let mut okm = [0u8; 32];
    hk.expand(store_name.as_bytes(), &mut okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    hex::encode(okm)
}

// ── Key persistence ───────────────────────────────────────────────────────────

/// Seam between key material and wherever it is persisted. Kept separate
/// from `LogStore`'s data path: private keys never travel through the same
/// storage as log entries.
pub trait KeyStore: Send + Sync {
    fn load_or_create(&self, name: &str) -> Result<KeyPair, HypercoreError>;
}

/// Persists Ed25519 keypairs as `{name}.key` hex files under a dedicated
/// directory, distinct from any log-data storage path.
///
/// Mirrors `sven-p2p::transport::load_or_create_keypair`'s "persist or
/// generate" pattern, generalized from libp2p's protobuf keypair encoding to
/// raw hex-encoded Ed25519 key material.
pub struct FilesystemKeyStore {
    root: PathBuf,
}

impl FilesystemKeyStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.key"))
    }
}

impl KeyStore for FilesystemKeyStore {
    fn load_or_create(&self, name: &str) -> Result<KeyPair, HypercoreError> {
        let path = self.path_for(name);
        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let mut parts = raw.trim().splitn(2, ':');
            let private_key = parts
                .next()
                .ok_or_else(|| HypercoreError::Keypair("malformed key file".into()))?
                .to_string();
            let signing_key = signing_key_from_hex(&private_key)?;
            return Ok(KeyPair {
                public_key: hex::encode(signing_key.verifying_key().to_bytes()),
                private_key,
            });
        }

        let pair = generate_key_pair();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, format!("{}:{}", pair.private_key, pair.public_key))?;
        Ok(pair)
    }
}

// ── PeerAuthenticator ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PendingChallenge {
    nonce: Vec<u8>,
}

/// Issues a per-peer challenge, verifies signatures against the claimed
/// public key, and tracks which peers have successfully authenticated.
#[derive(Default)]
pub struct PeerAuthenticator {
    pending: Mutex<HashMap<String, PendingChallenge>>,
    authenticated: Mutex<HashMap<String, String>>, // peer_id -> public_key
}

impl PeerAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh random challenge nonce for `peer_id`.
    pub fn issue_challenge(&self, peer_id: &str) -> Vec<u8> {
        let mut nonce = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.pending.lock().unwrap().insert(
            peer_id.to_string(),
            PendingChallenge {
                nonce: nonce.clone(),
            },
        );
        nonce
    }

    /// Verify `signature` over the outstanding challenge for `peer_id`,
    /// claimed to come from `public_key`. On success, marks the peer
    /// authenticated and clears the pending challenge.
    pub fn verify(&self, peer_id: &str, signature: &str, public_key: &str) -> bool {
        let nonce = {
            let g = self.pending.lock().unwrap();
            match g.get(peer_id) {
                Some(c) => c.nonce.clone(),
                None => return false,
            }
        };
        if !verify_challenge(&nonce, signature, public_key) {
            return false;
        }
        self.pending.lock().unwrap().remove(peer_id);
        self.authenticated
            .lock()
            .unwrap()
            .insert(peer_id.to_string(), public_key.to_string());
        true
    }

    pub fn is_authenticated(&self, peer_id: &str) -> bool {
        self.authenticated.lock().unwrap().contains_key(peer_id)
    }

    pub fn revoke(&self, peer_id: &str) {
        self.authenticated.lock().unwrap().remove(peer_id);
        self.pending.lock().unwrap().remove(peer_id);
    }
}
