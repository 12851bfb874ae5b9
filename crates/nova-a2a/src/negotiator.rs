//! TaskNegotiator (C14): correlation-id threaded task proposal/accept/reject
//! with deadline expiry. Each thread is an append-only sequence of records
//! rather than a single mutated one, so a thread's full negotiation history
//! stays inspectable.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use uuid::Uuid;

use crate::error::A2AError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Proposed,
    Accepted,
    Rejected,
    Expired,
}

#[derive(Debug, Clone)]
pub struct NegotiationRecord {
    pub thread_id: String,
    pub proposer: String,
    pub counterparty: String,
    pub proposal: Value,
    pub state: NegotiationState,
    pub deadline_ms: u64,
    pub created_at: u64,
}

#[derive(Default)]
pub struct TaskNegotiator {
    threads: Mutex<HashMap<String, Vec<NegotiationRecord>>>,
}

impl TaskNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn propose(
        &self,
        proposer: &str,
        counterparty: &str,
        proposal: Value,
        deadline_ms: u64,
        now_ms: u64,
    ) -> String {
        let thread_id = Uuid::new_v4().to_string();
        self.threads.lock().unwrap().insert(
            thread_id.clone(),
            vec![NegotiationRecord {
                thread_id: thread_id.clone(),
                proposer: proposer.to_string(),
                counterparty: counterparty.to_string(),
                proposal,
                state: NegotiationState::Proposed,
                deadline_ms,
                created_at: now_ms,
            }],
        );
        thread_id
    }

    /// Processes an incoming proposal for an existing (or fresh) thread_id —
    /// a thread_id generated locally goes through `propose` instead.
    pub fn handle_incoming_proposal(
        &self,
        thread_id: &str,
        proposer: &str,
        counterparty: &str,
        proposal: Value,
        deadline_ms: u64,
        now_ms: u64,
    ) {
        self.threads
            .lock()
            .unwrap()
            .entry(thread_id.to_string())
            .or_default()
            .push(NegotiationRecord {
                thread_id: thread_id.to_string(),
                proposer: proposer.to_string(),
                counterparty: counterparty.to_string(),
                proposal,
                state: NegotiationState::Proposed,
                deadline_ms,
                created_at: now_ms,
            });
    }

    pub fn accept(&self, thread_id: &str, now_ms: u64) -> Result<(), A2AError> {
        self.transition(thread_id, now_ms, NegotiationState::Accepted)
    }

    pub fn reject(&self, thread_id: &str, now_ms: u64) -> Result<(), A2AError> {
        self.transition(thread_id, now_ms, NegotiationState::Rejected)
    }

    fn transition(&self, thread_id: &str, now_ms: u64, to: NegotiationState) -> Result<(), A2AError> {
        let mut threads = self.threads.lock().unwrap();
        let records = threads
            .get_mut(thread_id)
            .ok_or_else(|| A2AError::NegotiationNotFound(thread_id.to_string()))?;
        let latest = records
            .last()
            .ok_or_else(|| A2AError::NegotiationNotFound(thread_id.to_string()))?
            .clone();
        if latest.state != NegotiationState::Proposed {
            return Err(A2AError::NegotiationExpired(thread_id.to_string()));
        }
        if now_ms >= latest.deadline_ms {
            records.push(NegotiationRecord {
                state: NegotiationState::Expired,
                created_at: now_ms,
                ..latest
            });
            return Err(A2AError::NegotiationExpired(thread_id.to_string()));
        }
        records.push(NegotiationRecord {
            state: to,
            created_at: now_ms,
            ..latest
        });
        Ok(())
    }

    /// Full append-only history of `thread_id`, in proposal order.
    pub fn get_thread(&self, thread_id: &str) -> Result<Vec<NegotiationRecord>, A2AError> {
        self.threads
            .lock()
            .unwrap()
            .get(thread_id)
            .cloned()
            .ok_or_else(|| A2AError::NegotiationNotFound(thread_id.to_string()))
    }

    /// Appends an `Expired` record for every thread whose latest state is
    /// still `Proposed` past its deadline; returns the thread ids that
    /// transitioned.
    pub fn sweep_expired(&self, now_ms: u64) -> Vec<String> {
        let mut expired = Vec::new();
        let mut threads = self.threads.lock().unwrap();
        for records in threads.values_mut() {
            let Some(latest) = records.last().cloned() else {
                continue;
            };
            if latest.state == NegotiationState::Proposed && now_ms >= latest.deadline_ms {
                expired.push(latest.thread_id.clone());
                records.push(NegotiationRecord {
                    state: NegotiationState::Expired,
                    created_at: now_ms,
                    ..latest
                });
            }
        }
        expired
    }
}
