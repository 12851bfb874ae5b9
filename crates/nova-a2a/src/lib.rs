//! A2A layer: agent registry, typed envelopes, tiered routing, channels,
//! task negotiation, swarm coordination, an MCP tool bridge, and CRDT
//! sync-over-envelope for nova26.

pub mod agent_registry;
pub mod channel;
pub mod crdt_sync;
pub mod envelope;
pub mod error;
pub mod mcp_bridge;
pub mod negotiator;
pub mod router;
pub mod swarm;

pub use agent_registry::{AgentCard, AgentRegistry, CardOrigin, Tier};
pub use channel::{Channel, ChannelManager, ChannelState};
pub use crdt_sync::CRDTSyncChannel;
pub use envelope::{Envelope, EnvelopeKind};
pub use error::A2AError;
pub use mcp_bridge::{
    namespaced_tool_name, MCPBridge, PromptDescriptor, ResourceDescriptor, ToolDescriptor,
    ToolProvider, ToolResult,
};
pub use negotiator::{NegotiationRecord, NegotiationState, TaskNegotiator};
pub use router::{A2ARouter, RoutedMessage, RoutingResult};
pub use swarm::{SubTask, SubTaskState, SwarmCoordinator, SwarmSession, SwarmStatus};
