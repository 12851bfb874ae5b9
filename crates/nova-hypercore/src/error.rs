use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum HypercoreError {
    #[error("seq {seq} out of range (length {length})")]
    OutOfRange { seq: u64, length: u64 },

    #[error("payload of {size} bytes exceeds max_payload_bytes ({max})")]
    PayloadTooLarge { size: usize, max: u32 },

    #[error("hash chain corrupted at seq {seq}")]
    ChainCorrupted { seq: u64 },

    #[error("signature invalid at seq {seq}")]
    SignatureInvalid { seq: u64 },

    #[error("store '{0}' is not writable")]
    NotWritable(String),

    #[error("peer not found: {0}")]
    PeerNotFound(String),

    #[error("log not registered: {0}")]
    LogNotFound(String),

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("keypair error: {0}")]
    Keypair(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for HypercoreError {
    fn from(e: std::io::Error) -> Self {
        HypercoreError::Io(e.to_string())
    }
}
