use thiserror::Error;

#[derive(Debug, Error)]
pub enum A2AError {
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("agent already registered: {0}")]
    AgentAlreadyRegistered(String),

    #[error("tier violation: {from_tier:?} agent may not address {to_tier:?} agent without escalation")]
    TierViolation { from_tier: String, to_tier: String },

    #[error("sandbox violation: agent {0} is not permitted to cross sandbox boundary")]
    SandboxViolation(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("channel is not open (state: {0})")]
    ChannelNotOpen(String),

    #[error("queue full for channel {0}")]
    QueueFull(String),

    #[error("negotiation thread not found: {0}")]
    NegotiationNotFound(String),

    #[error("negotiation deadline expired: {0}")]
    NegotiationExpired(String),

    #[error("swarm session not found: {0}")]
    SwarmNotFound(String),

    #[error("sub-task not found: {0}")]
    SubTaskNotFound(String),

    #[error("envelope validation failed: {0}")]
    InvalidEnvelope(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("prompt not found: {0}")]
    PromptNotFound(String),

    #[error("hypercore error: {0}")]
    Hypercore(#[from] nova_hypercore::HypercoreError),

    #[error("serialization error: {0}")]
    Serialization(String),
}
