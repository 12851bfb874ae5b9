//! A2ARouter (C12): tiered message routing with an asymmetric hop rule,
//! sandbox isolation, per-envelope TTL, and a handler-dispatch seam —
//! mirrors the tracing-heavy dispatch loop in `sven-p2p::node`.

use std::sync::Mutex;

use serde_json::Value;

use crate::agent_registry::{AgentRegistry, Tier};
use crate::envelope::{Envelope, EnvelopeKind};
use crate::error::A2AError;

fn tier_index(tier: Tier) -> usize {
    match tier {
        Tier::L0 => 0,
        Tier::L1 => 1,
        Tier::L2 => 2,
        Tier::L3 => 3,
    }
}

#[derive(Debug, Clone)]
pub struct RoutedMessage {
    pub envelope: Envelope,
    pub from_tier: Tier,
    pub to_tier: Tier,
    pub delivered: bool,
}

/// Outcome of a [`A2ARouter::send`] call. TTL expiry is a soft failure —
/// `delivered: false` with a `reason` rather than an `Err` — since an
/// expired envelope is routing noise, not a protocol violation.
#[derive(Debug, Clone)]
pub struct RoutingResult {
    pub delivered: bool,
    pub envelope: Envelope,
    pub handlers_invoked: usize,
    pub reason: Option<String>,
}

type EnvelopeHandler = Box<dyn Fn(&Envelope) + Send + Sync>;

pub struct A2ARouter {
    registry: std::sync::Arc<AgentRegistry>,
    log: Mutex<Vec<RoutedMessage>>,
    sandbox_enforcement: bool,
    tier_enforcement: bool,
    default_timeout_ms: u64,
    handlers: Mutex<Vec<EnvelopeHandler>>,
}

impl A2ARouter {
    pub fn new(
        registry: std::sync::Arc<AgentRegistry>,
        tier_enforcement: bool,
        sandbox_enforcement: bool,
        default_timeout_ms: u64,
    ) -> Self {
        Self {
            registry,
            log: Mutex::new(Vec::new()),
            sandbox_enforcement,
            tier_enforcement,
            default_timeout_ms,
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a handler invoked, in registration order, on every
    /// envelope successfully delivered by [`A2ARouter::send`].
    pub fn register_handler<F>(&self, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.handlers.lock().unwrap().push(Box::new(handler));
    }

    /// Routes one message: validates it, checks sandbox membership and the
    /// tier hop rule, then (absent TTL expiry) bumps its hop count, logs it,
    /// and invokes every registered handler.
    ///
    /// Tier rule: an agent may always reach a peer at the same tier or a
    /// less-privileged one (`tier_index(sender) <= tier_index(receiver)`)
    /// without escalation. Reaching toward a more-privileged tier
    /// (`tier_index(sender) > tier_index(receiver)`) requires `escalate`.
    /// `escalate` never bypasses the sandbox check.
    pub fn send(
        &self,
        mut envelope: Envelope,
        escalate: bool,
        now_ms: u64,
    ) -> Result<RoutingResult, A2AError> {
        envelope.validate()?;
        let sender = self.registry.get(&envelope.from)?;
        let receiver = self.registry.get(&envelope.to)?;

        if self.sandbox_enforcement && sender.sandbox != receiver.sandbox {
            return Err(A2AError::SandboxViolation(envelope.from.clone()));
        }

        if self.tier_enforcement
            && !escalate
            && tier_index(sender.tier) > tier_index(receiver.tier)
        {
            return Err(A2AError::TierViolation {
                from_tier: format!("{:?}", sender.tier),
                to_tier: format!("{:?}", receiver.tier),
            });
        }

        if envelope.is_expired(now_ms, self.default_timeout_ms) {
            tracing::debug!(from = %envelope.from, to = %envelope.to, "envelope expired before routing");
            return Ok(RoutingResult {
                delivered: false,
                envelope,
                handlers_invoked: 0,
                reason: Some("ttl expired".to_string()),
            });
        }

        envelope.bump_hop();
        self.log.lock().unwrap().push(RoutedMessage {
            envelope: envelope.clone(),
            from_tier: sender.tier,
            to_tier: receiver.tier,
            delivered: true,
        });
        tracing::debug!(
            from = %envelope.from,
            to = %envelope.to,
            kind = ?envelope.kind,
            hop_count = envelope.hop_count,
            "routed a2a envelope"
        );

        let handlers = self.handlers.lock().unwrap();
        for handler in handlers.iter() {
            handler(&envelope);
        }
        let handlers_invoked = handlers.len();

        Ok(RoutingResult {
            delivered: true,
            envelope,
            handlers_invoked,
            reason: None,
        })
    }

    /// Broadcasts a notification to every registered agent except the sender.
    pub fn broadcast(&self, from: &str, payload: Value, timestamp: u64) -> Vec<Envelope> {
        self.registry
            .list()
            .into_iter()
            .filter(|card| card.agent_id != from)
            .filter_map(|card| {
                let envelope = Envelope::new(
                    EnvelopeKind::Notification,
                    from,
                    &card.agent_id,
                    payload.clone(),
                    timestamp,
                );
                self.send(envelope, true, timestamp).ok()
            })
            .filter(|result| result.delivered)
            .map(|result| result.envelope)
            .collect()
    }

    pub fn route_by_capability(
        &self,
        from: &str,
        capability: &str,
        payload: Value,
        timestamp: u64,
    ) -> Result<Vec<Envelope>, A2AError> {
        let targets: Vec<_> = self
            .registry
            .list()
            .into_iter()
            .filter(|c| c.agent_id != from && c.capabilities.iter().any(|cap| cap == capability))
            .collect();
        let mut routed = Vec::new();
        for target in targets {
            let envelope = Envelope::new(
                EnvelopeKind::Request,
                from,
                &target.agent_id,
                payload.clone(),
                timestamp,
            );
            let result = self.send(envelope, false, timestamp)?;
            if result.delivered {
                routed.push(result.envelope);
            }
        }
        Ok(routed)
    }

    pub fn routing_log(&self) -> Vec<RoutedMessage> {
        self.log.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_registry::AgentCard;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn registry_with(cards: Vec<AgentCard>) -> Arc<AgentRegistry> {
        let registry = Arc::new(AgentRegistry::new());
        for card in cards {
            registry.register(card).unwrap();
        }
        registry
    }

    #[test]
    fn adjacent_tiers_route_without_escalation() {
        let registry = registry_with(vec![
            AgentCard::new("a", Tier::L0, "s"),
            AgentCard::new("b", Tier::L1, "s"),
        ]);
        let router = A2ARouter::new(registry, true, true, 30_000);
        let envelope = Envelope::new(EnvelopeKind::Request, "a", "b", json!({}), 0);
        assert!(router.send(envelope, false, 0).unwrap().delivered);
    }

    #[test]
    fn reaching_a_less_privileged_tier_never_needs_escalation() {
        let registry = registry_with(vec![
            AgentCard::new("a", Tier::L0, "s"),
            AgentCard::new("b", Tier::L3, "s"),
        ]);
        let router = A2ARouter::new(registry, true, true, 30_000);
        let envelope = Envelope::new(EnvelopeKind::Request, "a", "b", json!({}), 0);
        assert!(router.send(envelope, false, 0).unwrap().delivered);
    }

    #[test]
    fn reaching_toward_a_more_privileged_tier_requires_escalation() {
        let registry = registry_with(vec![
            AgentCard::new("a", Tier::L3, "s"),
            AgentCard::new("b", Tier::L0, "s"),
        ]);
        let router = A2ARouter::new(registry, true, true, 30_000);
        let envelope = Envelope::new(EnvelopeKind::Request, "a", "b", json!({}), 0);
        let err = router.send(envelope, false, 0);
        assert!(matches!(err, Err(A2AError::TierViolation { .. })));
    }

    #[test]
    fn escalation_bypasses_the_more_privileged_tier_rule() {
        let registry = registry_with(vec![
            AgentCard::new("a", Tier::L3, "s"),
            AgentCard::new("b", Tier::L0, "s"),
        ]);
        let router = A2ARouter::new(registry, true, true, 30_000);
        let envelope = Envelope::new(EnvelopeKind::Request, "a", "b", json!({}), 0);
        assert!(router.send(envelope, true, 0).unwrap().delivered);
    }

    #[test]
    fn sandbox_mismatch_always_rejected_even_when_escalated() {
        let registry = registry_with(vec![
            AgentCard::new("a", Tier::L0, "sandbox-1"),
            AgentCard::new("b", Tier::L0, "sandbox-2"),
        ]);
        let router = A2ARouter::new(registry, true, true, 30_000);
        let envelope = Envelope::new(EnvelopeKind::Request, "a", "b", json!({}), 0);
        let err = router.send(envelope, true, 0);
        assert!(matches!(err, Err(A2AError::SandboxViolation(_))));
    }

    #[test]
    fn expired_envelope_is_a_soft_failure_not_an_error() {
        let registry = registry_with(vec![
            AgentCard::new("a", Tier::L0, "s"),
            AgentCard::new("b", Tier::L0, "s"),
        ]);
        let router = A2ARouter::new(registry, true, true, 1_000);
        let envelope = Envelope::new(EnvelopeKind::Request, "a", "b", json!({}), 0).with_ttl_ms(100);
        let result = router.send(envelope, false, 500).unwrap();
        assert!(!result.delivered);
        assert!(result.reason.is_some());
        assert!(router.routing_log().is_empty());
    }

    #[test]
    fn registered_handlers_fire_on_delivery() {
        let registry = registry_with(vec![
            AgentCard::new("a", Tier::L0, "s"),
            AgentCard::new("b", Tier::L0, "s"),
        ]);
        let router = A2ARouter::new(registry, true, true, 30_000);
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        router.register_handler(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        let envelope = Envelope::new(EnvelopeKind::Request, "a", "b", json!({}), 0);
        let result = router.send(envelope, false, 0).unwrap();
        assert_eq!(result.handlers_invoked, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn broadcast_reaches_every_other_agent() {
        let registry = registry_with(vec![
            AgentCard::new("a", Tier::L0, "s"),
            AgentCard::new("b", Tier::L0, "s"),
            AgentCard::new("c", Tier::L0, "s"),
        ]);
        let router = A2ARouter::new(registry, true, true, 30_000);
        let sent = router.broadcast("a", json!({"hi": true}), 0);
        assert_eq!(sent.len(), 2);
    }

    #[test]
    fn route_by_capability_targets_matching_agents_only() {
        let registry = registry_with(vec![
            AgentCard::new("a", Tier::L0, "s"),
            AgentCard::new("b", Tier::L0, "s").with_capabilities(vec!["search".into()]),
            AgentCard::new("c", Tier::L0, "s").with_capabilities(vec!["translate".into()]),
        ]);
        let router = A2ARouter::new(registry, true, true, 30_000);
        let routed = router.route_by_capability("a", "search", json!({}), 0).unwrap();
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].to, "b");
    }
}
