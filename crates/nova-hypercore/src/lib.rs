//! Hypercore layer: append-only log storage, replication, peer discovery,
//! CRDT synchronisation, secondary indices, offline queueing, access
//! control, and observability for nova26.

pub mod access_control;
pub mod canonical;
pub mod crdt_bridge;
pub mod discovery;
pub mod entry;
pub mod error;
pub mod indexed_memory;
pub mod log_store;
pub mod observability;
pub mod offline_queue;
pub mod registry;
pub mod replication;

pub use access_control::{
    decrypt_payload, derive_discovery_key, encrypt_payload, generate_key_pair, sign_challenge,
    verify_challenge, Acl, AccessKind, AccessMode, CheckResult, EncryptedPayload,
    FilesystemKeyStore, KeyPair, KeyStore, Origin, PeerAuthenticator, Policy,
};
pub use crdt_bridge::{CRDTBridge, CRDTOperation, CRDTUpdate, VectorClock};
pub use discovery::{DiscoveryEvent, DiscoveryManager, InMemoryTransport, PeerInfo, Transport};
pub use entry::LogEntry;
pub use error::HypercoreError;
pub use indexed_memory::{IndexedMemoryAdapter, MemoryNode};
pub use log_store::{AppendResult, LogStore};
pub use observability::{Event, Health, HealthStatus, Metrics, ObservabilityLogger};
pub use offline_queue::{OfflineQueue, QueuedWrite};
pub use registry::{LogRegistry, SharedLogStore};
pub use replication::{compute_merkle_root, ReplicationManager, ReplicationPeer, SyncResult};
