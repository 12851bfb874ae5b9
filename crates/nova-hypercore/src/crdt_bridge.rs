//! CRDTBridge (C5): vector-clock CRDT updates broadcast to and polled by
//! peers, riding a [`LogStore`] so every update is itself a replicated,
//! hash-chained entry rather than bridge-private state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HypercoreError;
use crate::log_store::LogStore;

pub type VectorClock = HashMap<String, u64>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CRDTOperation {
    Insert,
    Delete,
    Update,
    Move,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CRDTUpdate {
    pub id: u64,
    pub origin: String,
    pub target_node_id: String,
    pub operation: CRDTOperation,
    pub clock: VectorClock,
    pub payload: Value,
    pub timestamp: u64,
}

/// `max` of each component; components absent on one side count as 0.
pub fn merge_clocks(a: &VectorClock, b: &VectorClock) -> VectorClock {
    let mut out = a.clone();
    for (k, v) in b {
        let entry = out.entry(k.clone()).or_insert(0);
        if *v > *entry {
            *entry = *v;
        }
    }
    out
}

pub fn clock_le(a: &VectorClock, b: &VectorClock) -> bool {
    a.iter().all(|(k, v)| b.get(k).copied().unwrap_or(0) >= *v)
}

type UpdateListener = Box<dyn Fn(&CRDTUpdate) + Send + Sync>;

pub struct CRDTBridge {
    node_id: String,
    store: Arc<Mutex<LogStore>>,
    next_id: AtomicU64,
    clock: Mutex<VectorClock>,
    log: Mutex<Vec<CRDTUpdate>>,
    listeners: Mutex<HashMap<u64, UpdateListener>>,
    next_listener_id: AtomicU64,
}

/// Handle returned by [`CRDTBridge::on_update`]; drop or call
/// [`Unsubscribe::unsubscribe`] to detach the listener.
pub struct Unsubscribe<'a> {
    bridge: &'a CRDTBridge,
    id: u64,
}

impl<'a> Unsubscribe<'a> {
    pub fn unsubscribe(self) {
        self.bridge.listeners.lock().unwrap().remove(&self.id);
    }
}

impl CRDTBridge {
    pub fn new(node_id: impl Into<String>, store: Arc<Mutex<LogStore>>) -> Self {
        Self {
            node_id: node_id.into(),
            store,
            next_id: AtomicU64::new(0),
            clock: Mutex::new(VectorClock::new()),
            log: Mutex::new(Vec::new()),
            listeners: Mutex::new(HashMap::new()),
            next_listener_id: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> VectorClock {
        self.clock.lock().unwrap().clone()
    }

    /// Bumps this node's own clock component, appends the update to the
    /// backing log (so it replicates), and records/notifies it locally.
    pub fn broadcast(
        &self,
        target_node_id: &str,
        operation: CRDTOperation,
        payload: Value,
        timestamp: u64,
    ) -> Result<CRDTUpdate, HypercoreError> {
        let mut clock = self.clock.lock().unwrap();
        let counter = clock.entry(self.node_id.clone()).or_insert(0);
        *counter += 1;
        let update = CRDTUpdate {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            origin: self.node_id.clone(),
            target_node_id: target_node_id.to_string(),
            operation,
            clock: clock.clone(),
            payload,
            timestamp,
        };
        drop(clock);
        self.persist_and_record(update)
    }

    /// Merges a remote update's clock, appends it to the backing log, and
    /// records/notifies it, skipping one already dominated by the current
    /// clock (idempotent under replay).
    pub fn apply_remote(&self, update: CRDTUpdate) -> Result<bool, HypercoreError> {
        let mut clock = self.clock.lock().unwrap();
        if clock_le(&update.clock, &clock)
            && self
                .log
                .lock()
                .unwrap()
                .iter()
                .any(|u| u.id == update.id && u.origin == update.origin)
        {
            return Ok(false);
        }
        *clock = merge_clocks(&clock, &update.clock);
        drop(clock);
        self.persist_and_record(update).map(|_| true)
    }

    fn persist_and_record(&self, update: CRDTUpdate) -> Result<CRDTUpdate, HypercoreError> {
        let serialized =
            serde_json::to_value(&update).map_err(|e| HypercoreError::Serialization(e.to_string()))?;
        self.store.lock().unwrap().append(serialized, update.timestamp)?;
        self.log.lock().unwrap().push(update.clone());
        self.notify(&update);
        Ok(update)
    }

    pub fn poll(&self, since_index: usize) -> Vec<CRDTUpdate> {
        let log = self.log.lock().unwrap();
        if since_index >= log.len() {
            Vec::new()
        } else {
            log[since_index..].to_vec()
        }
    }

    pub fn on_update<F>(&self, listener: F) -> Unsubscribe<'_>
    where
        F: Fn(&CRDTUpdate) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap().insert(id, Box::new(listener));
        Unsubscribe { bridge: self, id }
    }

    fn notify(&self, update: &CRDTUpdate) {
        for l in self.listeners.lock().unwrap().values() {
            l(update);
        }
    }
}
