//! Envelope & Schemas (C11): the typed message wrapper every agent sends
//! and receives, mirroring `sven-p2p::protocol::types`'s tagged request/
//! response shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::A2AError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    Request,
    Response,
    Notification,
    TaskProposal,
    TaskAccept,
    TaskReject,
    StreamData,
    Heartbeat,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub kind: EnvelopeKind,
    pub from: String,
    pub to: String,
    /// Threads related request/response/proposal/accept/reject messages.
    pub correlation_id: Option<String>,
    pub hop_count: u32,
    pub timestamp: u64,
    pub payload: Value,
    /// How long after `timestamp` this envelope may still be delivered;
    /// `None` falls back to the router's `default_timeout_ms`.
    pub ttl_ms: Option<u64>,
    /// Sandbox this envelope is allowed to cross into, beyond the sender's
    /// own sandbox membership; `None` means no additional grant.
    pub sandbox_id: Option<String>,
}

impl Envelope {
    pub fn new(kind: EnvelopeKind, from: &str, to: &str, payload: Value, timestamp: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            from: from.to_string(),
            to: to.to_string(),
            correlation_id: None,
            hop_count: 0,
            timestamp,
            payload,
            ttl_ms: None,
            sandbox_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    pub fn with_sandbox_id(mut self, sandbox_id: impl Into<String>) -> Self {
        self.sandbox_id = Some(sandbox_id.into());
        self
    }

    /// `true` once `timestamp + effective_ttl_ms` has passed as of `now_ms`.
    pub fn is_expired(&self, now_ms: u64, default_timeout_ms: u64) -> bool {
        let ttl = self.ttl_ms.unwrap_or(default_timeout_ms);
        now_ms.saturating_sub(self.timestamp) > ttl
    }

    pub fn reply(&self, kind: EnvelopeKind, payload: Value, timestamp: u64) -> Self {
        Envelope {
            id: Uuid::new_v4().to_string(),
            kind,
            from: self.to.clone(),
            to: self.from.clone(),
            correlation_id: self.correlation_id.clone().or_else(|| Some(self.id.clone())),
            hop_count: 0,
            timestamp,
            payload,
            ttl_ms: None,
            sandbox_id: None,
        }
    }

    pub fn bump_hop(&mut self) {
        self.hop_count += 1;
    }

    /// Structural validation only — `from`/`to` non-empty, `id` non-empty,
    /// `correlation_id` required for response/accept/reject kinds.
    pub fn validate(&self) -> Result<(), A2AError> {
        if self.id.is_empty() {
            return Err(A2AError::InvalidEnvelope("id must not be empty".into()));
        }
        if self.from.is_empty() || self.to.is_empty() {
            return Err(A2AError::InvalidEnvelope("from/to must not be empty".into()));
        }
        let needs_correlation = matches!(
            self.kind,
            EnvelopeKind::Response | EnvelopeKind::TaskAccept | EnvelopeKind::TaskReject
        );
        if needs_correlation && self.correlation_id.is_none() {
            return Err(A2AError::InvalidEnvelope(format!(
                "{:?} envelope requires a correlation_id",
                self.kind
            )));
        }
        Ok(())
    }
}
