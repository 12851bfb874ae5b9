use std::sync::Arc;

use nova_a2a::{
    AgentCard, AgentRegistry, Envelope, EnvelopeKind, SwarmCoordinator, TaskNegotiator, Tier,
};
use nova_a2a::{A2ARouter, ChannelManager};
use serde_json::json;

#[test]
fn full_request_response_round_trip() {
    let registry = Arc::new(AgentRegistry::new());
    registry.register(AgentCard::new("planner", Tier::L1, "core")).unwrap();
    registry.register(AgentCard::new("worker", Tier::L1, "core")).unwrap();
    let router = A2ARouter::new(registry, true, true, 30_000);

    let request = Envelope::new(EnvelopeKind::Request, "planner", "worker", json!({"task": "x"}), 0);
    let routed = router.send(request.clone(), false, 0).unwrap();
    assert!(routed.delivered);

    let response = routed.envelope.reply(EnvelopeKind::Response, json!({"result": "done"}), 1);
    let routed_response = router.send(response, false, 1).unwrap();
    assert_eq!(routed_response.envelope.correlation_id, Some(request.id));
}

#[test]
fn negotiate_then_swarm_assign_and_complete() {
    let negotiator = Arc::new(TaskNegotiator::new());
    let thread = negotiator.propose("lead", "worker-1", json!({"job": "index"}), 10_000, 0);
    negotiator.accept(&thread, 0).unwrap();

    let registry = Arc::new(AgentRegistry::new());
    registry.register(AgentCard::new("lead", Tier::L1, "core")).unwrap();
    registry.register(AgentCard::new("worker-1", Tier::L1, "core")).unwrap();

    let coordinator = SwarmCoordinator::new(registry, negotiator);
    let session = coordinator.create_swarm("lead", json!({"job": "index batch"}), &[], Vec::new(), 2, 10_000, 0);
    coordinator.join_swarm(&session.id, "worker-1").unwrap();
    let sub_task = coordinator.add_sub_task(&session.id, json!({"job": "index"})).unwrap();
    coordinator.assign_sub_task(&session.id, &sub_task, "worker-1").unwrap();
    coordinator.complete_sub_task(&session.id, &sub_task).unwrap();

    assert_eq!(session.status(), nova_a2a::SwarmStatus::Completed);
}

#[test]
fn channel_queue_drains_in_order_once_open() {
    let manager = ChannelManager::new(10, 5);
    let channel = manager.open("peer-a");
    channel.mark_open();

    for i in 0..3 {
        let env = Envelope::new(EnvelopeKind::Heartbeat, "me", "peer-a", json!(i), 0);
        manager.send("peer-a", env).unwrap();
    }
    let mut seen = Vec::new();
    while let Some(env) = channel.dequeue() {
        seen.push(env.payload);
    }
    assert_eq!(seen, vec![json!(0), json!(1), json!(2)]);
}
