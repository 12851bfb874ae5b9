//! Facade (C18): single entry point that wires the hypercore layer
//! (log storage, replication, discovery, CRDT, indices, offline queue,
//! access control, observability) to the A2A layer (agent registry,
//! router, channels, negotiation, swarm coordination, MCP bridge) behind
//! one struct, the way an embedding host is expected to use nova26.

use std::sync::Arc;

use nova_a2a::{
    A2AError, AgentCard, AgentRegistry, ChannelManager, Envelope, MCPBridge, RoutingResult,
    SwarmCoordinator, TaskNegotiator, Tier, A2ARouter,
};
use nova_config::CoreConfig;
use nova_hypercore::{
    Acl, CRDTBridge, DiscoveryManager, IndexedMemoryAdapter, InMemoryTransport, LogRegistry,
    OfflineQueue, ObservabilityLogger, PeerInfo, ReplicationManager, Transport,
};
use serde_json::json;

/// The hypercore-layer components, wired together with one `ObservabilityLogger`.
pub struct NovaCore {
    pub config: CoreConfig,
    pub logs: Arc<LogRegistry>,
    pub replication: Arc<ReplicationManager>,
    pub discovery: Arc<DiscoveryManager>,
    pub acl: Arc<Acl>,
    pub observability: Arc<ObservabilityLogger>,
    pub crdt: Arc<CRDTBridge>,
    pub memory: Arc<IndexedMemoryAdapter>,
    pub offline_queue: Arc<OfflineQueue>,
}

impl NovaCore {
    pub fn new(config: CoreConfig, node_id: &str, transport: Arc<dyn Transport>) -> Self {
        let me = PeerInfo {
            peer_id: node_id.to_string(),
            address: format!("nova26://{node_id}"),
        };
        let logs = Arc::new(LogRegistry::new(config.max_payload_bytes));
        let crdt_store = logs.get("crdt");
        let offline_store = logs.get("offline-queue");
        Self {
            replication: Arc::new(ReplicationManager::new(node_id)),
            discovery: Arc::new(DiscoveryManager::new(transport, me)),
            acl: Arc::new(Acl::new()),
            observability: Arc::new(ObservabilityLogger::new(config.observability_max_events)),
            crdt: Arc::new(CRDTBridge::new(node_id, crdt_store)),
            memory: Arc::new(IndexedMemoryAdapter::new(config.max_payload_bytes)),
            offline_queue: Arc::new(OfflineQueue::new(offline_store)),
            logs,
            config,
        }
    }

    /// Convenience for tests/demos: an in-memory, process-local transport.
    pub fn new_in_memory(config: CoreConfig, node_id: &str) -> Self {
        Self::new(config, node_id, Arc::new(InMemoryTransport::new()))
    }
}

/// The A2A-layer components, wired together so that every routed message
/// (success or failure) is mirrored into `NovaCore`'s observability log.
pub struct A2ALayer {
    pub registry: Arc<AgentRegistry>,
    pub router: Arc<A2ARouter>,
    pub channels: Arc<ChannelManager>,
    pub negotiator: Arc<TaskNegotiator>,
    pub swarm: Arc<SwarmCoordinator>,
    pub mcp: Arc<MCPBridge>,
    observability: Arc<ObservabilityLogger>,
}

impl A2ALayer {
    /// Routes `envelope`, recording an `a2a.send` or `a2a.send_error`
    /// observability event either way. A TTL-expired envelope is still
    /// `Ok` (see [`RoutingResult::delivered`]) but is mirrored as
    /// `a2a.send_error` since the caller's message never arrived.
    pub fn send(
        &self,
        envelope: Envelope,
        escalate: bool,
        now_ms: u64,
    ) -> Result<RoutingResult, A2AError> {
        match self.router.send(envelope, escalate, now_ms) {
            Ok(result) if result.delivered => {
                self.observability.record(
                    "a2a.send",
                    now_ms,
                    json!({
                        "from": result.envelope.from,
                        "to": result.envelope.to,
                        "kind": format!("{:?}", result.envelope.kind),
                        "handlers_invoked": result.handlers_invoked,
                    }),
                );
                Ok(result)
            }
            Ok(result) => {
                self.observability.record(
                    "a2a.send_error",
                    now_ms,
                    json!({"reason": result.reason.clone()}),
                );
                Ok(result)
            }
            Err(err) => {
                self.observability
                    .record("a2a.send_error", now_ms, json!({"error": err.to_string()}));
                Err(err)
            }
        }
    }
}

pub struct Facade {
    pub core: NovaCore,
    a2a: Option<A2ALayer>,
}

impl Facade {
    pub fn new(config: CoreConfig, node_id: &str) -> Self {
        Self {
            core: NovaCore::new_in_memory(config, node_id),
            a2a: None,
        }
    }

    pub fn with_core(core: NovaCore) -> Self {
        Self { core, a2a: None }
    }

    /// Builds the A2A layer on first call, registering `coordinator_agent_id`
    /// as an L0 agent; subsequent calls return the already-built layer.
    pub fn create_a2a_layer(&mut self, coordinator_agent_id: &str) -> &A2ALayer {
        if self.a2a.is_none() {
            let registry = Arc::new(AgentRegistry::new());
            let _ = registry.register(AgentCard::new(coordinator_agent_id, Tier::L0, "core"));
            let router = Arc::new(A2ARouter::new(
                registry.clone(),
                self.core.config.router_tier_enforcement,
                self.core.config.router_sandbox_enforcement,
                self.core.config.router_default_timeout_ms,
            ));
            let negotiator = Arc::new(TaskNegotiator::new());
            self.a2a = Some(A2ALayer {
                registry: registry.clone(),
                router,
                channels: Arc::new(ChannelManager::new(256, self.core.config.channel_default_max_retries)),
                swarm: Arc::new(SwarmCoordinator::new(registry, negotiator.clone())),
                negotiator,
                mcp: Arc::new(MCPBridge::new()),
                observability: self.core.observability.clone(),
            });
        }
        self.a2a.as_ref().unwrap()
    }

    pub fn a2a(&self) -> Option<&A2ALayer> {
        self.a2a.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nova_a2a::{AgentCard as OtherAgent, EnvelopeKind, Tier as OtherTier};
    use serde_json::json;

    #[test]
    fn create_a2a_layer_registers_coordinator() {
        let mut facade = Facade::new(CoreConfig::default(), "node-1");
        let a2a = facade.create_a2a_layer("coordinator");
        assert!(a2a.registry.get("coordinator").is_ok());
    }

    #[test]
    fn create_a2a_layer_is_idempotent() {
        let mut facade = Facade::new(CoreConfig::default(), "node-1");
        facade.create_a2a_layer("coordinator");
        facade.create_a2a_layer("coordinator"); // second call must not panic on re-registration
        assert!(facade.a2a().is_some());
    }

    #[test]
    fn routed_send_is_mirrored_into_observability() {
        let mut facade = Facade::new(CoreConfig::default(), "node-1");
        let a2a = facade.create_a2a_layer("coordinator");
        a2a.registry
            .register(OtherAgent::new("worker", OtherTier::L0, "core"))
            .unwrap();
        let envelope = nova_a2a::Envelope::new(
            EnvelopeKind::Notification,
            "coordinator",
            "worker",
            json!({}),
            0,
        );
        facade.a2a().unwrap().send(envelope, false, 0).unwrap();
        let metrics = facade.core.observability.get_metrics();
        assert_eq!(metrics.counts_by_type.get("a2a.send").copied(), Some(1));
    }

    #[test]
    fn failed_send_is_also_mirrored_into_observability() {
        let mut facade = Facade::new(CoreConfig::default(), "node-1");
        let a2a = facade.create_a2a_layer("coordinator");
        let envelope = nova_a2a::Envelope::new(
            EnvelopeKind::Notification,
            "coordinator",
            "ghost-agent",
            json!({}),
            0,
        );
        assert!(a2a.send(envelope, false, 0).is_err());
        let metrics = facade.core.observability.get_metrics();
        assert_eq!(metrics.counts_by_type.get("a2a.send_error").copied(), Some(1));
    }
}
