//! CRDTSyncChannel (C17): carries `nova_hypercore::CRDTBridge` updates over
//! the A2A envelope transport instead of a direct peer link.

use std::sync::Arc;

use nova_hypercore::{CRDTBridge, CRDTOperation, CRDTUpdate};
use serde_json::Value;

use crate::envelope::{Envelope, EnvelopeKind};
use crate::error::A2AError;
use crate::router::A2ARouter;

pub struct CRDTSyncChannel {
    agent_id: String,
    bridge: Arc<CRDTBridge>,
    router: Arc<A2ARouter>,
}

impl CRDTSyncChannel {
    pub fn new(agent_id: impl Into<String>, bridge: Arc<CRDTBridge>, router: Arc<A2ARouter>) -> Self {
        Self {
            agent_id: agent_id.into(),
            bridge,
            router,
        }
    }

    /// Broadcasts a local CRDT update to every peer reachable via the
    /// router, wrapped in a `StreamData` envelope.
    pub fn broadcast(
        &self,
        target_node_id: &str,
        operation: CRDTOperation,
        payload: Value,
        timestamp: u64,
    ) -> Result<CRDTUpdate, A2AError> {
        let update = self
            .bridge
            .broadcast(target_node_id, operation, payload, timestamp)?;
        let envelope_payload = serde_json::to_value(&update)
            .map_err(|e| A2AError::Serialization(e.to_string()))?;
        for envelope in self
            .router
            .broadcast(&self.agent_id, envelope_payload, timestamp)
        {
            let _ = envelope;
        }
        Ok(update)
    }

    /// Applies a CRDT update carried inside an incoming envelope; ignores
    /// (returns `Ok(false)`) envelopes of the wrong kind or malformed payloads
    /// rather than treating transport noise as a protocol error.
    pub fn apply_incoming(&self, envelope: &Envelope) -> Result<bool, A2AError> {
        if envelope.kind != EnvelopeKind::StreamData {
            return Ok(false);
        }
        let update: CRDTUpdate = match serde_json::from_value(envelope.payload.clone()) {
            Ok(u) => u,
            Err(_) => return Ok(false),
        };
        Ok(self.bridge.apply_remote(update)?)
    }

    pub fn clock(&self) -> nova_hypercore::VectorClock {
        self.bridge.clock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_registry::{AgentCard, AgentRegistry, Tier};
    use nova_hypercore::LogStore;
    use serde_json::json;
    use std::sync::Mutex;

    fn router_with(agents: &[&str]) -> Arc<A2ARouter> {
        let registry = Arc::new(AgentRegistry::new());
        for agent in agents {
            registry.register(AgentCard::new(*agent, Tier::L1, "s")).unwrap();
        }
        Arc::new(A2ARouter::new(registry, true, true, 30_000))
    }

    fn bridge(node_id: &str) -> CRDTBridge {
        CRDTBridge::new(node_id, Arc::new(Mutex::new(LogStore::new(node_id, 1_048_576))))
    }

    #[test]
    fn broadcast_bumps_local_clock() {
        let router = router_with(&["a", "b"]);
        let bridge = Arc::new(bridge("a"));
        let channel = CRDTSyncChannel::new("a", bridge.clone(), router);
        channel
            .broadcast("b", CRDTOperation::Update, json!({"k": "v"}), 0)
            .unwrap();
        assert_eq!(bridge.clock()["a"], 1);
    }

    #[test]
    fn apply_incoming_ignores_non_stream_envelopes() {
        let router = router_with(&["a"]);
        let bridge = Arc::new(bridge("a"));
        let channel = CRDTSyncChannel::new("a", bridge, router);
        let envelope = Envelope::new(EnvelopeKind::Heartbeat, "b", "a", json!({}), 0);
        assert_eq!(channel.apply_incoming(&envelope).unwrap(), false);
    }

    #[test]
    fn apply_incoming_merges_valid_update() {
        let router_a = router_with(&["a"]);
        let router_b = router_with(&["b"]);
        let bridge_a = bridge("a");
        let bridge_b = Arc::new(bridge("b"));
        let channel_b = CRDTSyncChannel::new("b", bridge_b.clone(), router_b);

        let update = bridge_a
            .broadcast("b", CRDTOperation::Insert, json!({"op": "inc"}), 0)
            .unwrap();
        let _ = router_a;
        let envelope = Envelope::new(
            EnvelopeKind::StreamData,
            "a",
            "b",
            serde_json::to_value(&update).unwrap(),
            0,
        );
        assert!(channel_b.apply_incoming(&envelope).unwrap());
        assert_eq!(bridge_b.clock()["a"], 1);
    }
}
