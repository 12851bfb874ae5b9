//! OfflineQueue (C7): write-through wrapper over a [`LogStore`] — appends
//! land directly in the store while online, and queue in FIFO order while
//! offline, to be replayed into the same store on [`OfflineQueue::drain`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::entry::LogEntry;
use crate::error::HypercoreError;
use crate::log_store::{AppendResult, LogStore};

#[derive(Debug, Clone)]
pub struct QueuedWrite {
    pub seq: u64,
    pub data: Value,
    pub queued_at: u64,
}

type EdgeListener = Box<dyn Fn() + Send + Sync>;

pub struct OfflineQueue {
    store: Arc<Mutex<LogStore>>,
    queue: Mutex<Vec<QueuedWrite>>,
    next_seq: AtomicU64,
    online: AtomicBool,
    last_synced_seq: Mutex<HashMap<String, u64>>,
    on_online: Mutex<Vec<EdgeListener>>,
    on_offline: Mutex<Vec<EdgeListener>>,
}

impl OfflineQueue {
    pub fn new(store: Arc<Mutex<LogStore>>) -> Self {
        Self {
            store,
            queue: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            online: AtomicBool::new(true),
            last_synced_seq: Mutex::new(HashMap::new()),
            on_online: Mutex::new(Vec::new()),
            on_offline: Mutex::new(Vec::new()),
        }
    }

    /// Write-through while online: appends straight to the wrapped store and
    /// returns its [`AppendResult`]. While offline, queues `data` instead and
    /// returns `None` — the write only reaches the store on [`Self::drain`].
    pub fn append(&self, data: Value, now_ms: u64) -> Result<Option<AppendResult>, HypercoreError> {
        if self.is_online() {
            let result = self.store.lock().unwrap().append(data, now_ms)?;
            return Ok(Some(result));
        }
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().unwrap().push(QueuedWrite {
            seq,
            data,
            queued_at: now_ms,
        });
        Ok(None)
    }

    /// Reads an already-committed entry from the wrapped store by seq. A
    /// write still sitting in the offline queue is not yet visible here.
    pub fn get(&self, seq: u64) -> Result<LogEntry, HypercoreError> {
        self.store.lock().unwrap().get(seq).map(|e| e.clone())
    }

    pub fn length(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Fires `on_online`/`on_offline` listeners only on an actual transition
    /// (edge-triggered, not level-triggered).
    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was == online {
            return;
        }
        let listeners = if online {
            self.on_online.lock().unwrap()
        } else {
            self.on_offline.lock().unwrap()
        };
        for l in listeners.iter() {
            l();
        }
    }

    pub fn on_online<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_online.lock().unwrap().push(Box::new(listener));
    }

    pub fn on_offline<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_offline.lock().unwrap().push(Box::new(listener));
    }

    /// Replays the queue into the wrapped store in FIFO order; a write that
    /// fails to append (e.g. payload too large) halts the drain and stays at
    /// the front of the queue along with everything after it.
    pub fn drain(&self) -> Result<usize, HypercoreError> {
        let mut drained = 0;
        loop {
            let next = {
                let q = self.queue.lock().unwrap();
                q.first().cloned()
            };
            let Some(write) = next else { break };
            self.store.lock().unwrap().append(write.data, write.queued_at)?;
            self.queue.lock().unwrap().remove(0);
            drained += 1;
        }
        Ok(drained)
    }

    pub fn record_sync_state(&self, peer_id: &str, seq: u64) {
        self.last_synced_seq
            .lock()
            .unwrap()
            .insert(peer_id.to_string(), seq);
    }

    pub fn get_last_synced_seq(&self, peer_id: &str) -> Option<u64> {
        self.last_synced_seq.lock().unwrap().get(peer_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as O};

    fn queue_with_store() -> (OfflineQueue, Arc<Mutex<LogStore>>) {
        let store = Arc::new(Mutex::new(LogStore::new("L", 1_048_576)));
        (OfflineQueue::new(store.clone()), store)
    }

    #[test]
    fn online_append_is_write_through() {
        let (q, store) = queue_with_store();
        let result = q.append(json!(1), 0).unwrap();
        assert!(result.is_some());
        assert_eq!(store.lock().unwrap().length(), 1);
        assert_eq!(q.length(), 0);
    }

    #[test]
    fn offline_append_queues_instead_of_writing() {
        let (q, store) = queue_with_store();
        q.set_online(false);
        let result = q.append(json!(1), 0).unwrap();
        assert!(result.is_none());
        assert_eq!(store.lock().unwrap().length(), 0);
        assert_eq!(q.length(), 1);
    }

    #[test]
    fn drain_replays_queued_writes_into_the_store_in_order() {
        let (q, store) = queue_with_store();
        q.set_online(false);
        q.append(json!(1), 0).unwrap();
        q.append(json!(2), 0).unwrap();
        q.append(json!(3), 0).unwrap();

        let drained = q.drain().unwrap();
        assert_eq!(drained, 3);
        assert_eq!(q.length(), 0);
        let s = store.lock().unwrap();
        assert_eq!(s.length(), 3);
        assert_eq!(s.get(0).unwrap().data, json!(1));
        assert_eq!(s.get(2).unwrap().data, json!(3));
    }

    #[test]
    fn drain_stops_at_first_failure_and_leaves_remainder_queued() {
        let store = Arc::new(Mutex::new(LogStore::new("L", 4)));
        let q = OfflineQueue::new(store.clone());
        q.set_online(false);
        q.append(json!(1), 0).unwrap();
        q.append(json!({"too": "big for four bytes"}), 0).unwrap();
        q.append(json!(3), 0).unwrap();

        let result = q.drain();
        assert!(result.is_err());
        assert_eq!(q.length(), 2); // the oversized write and everything after it remain queued
        assert_eq!(store.lock().unwrap().length(), 1);
    }

    #[test]
    fn set_online_is_edge_triggered() {
        let (q, _store) = queue_with_store();
        let online_fires = Arc::new(AtomicUsize::new(0));
        let offline_fires = Arc::new(AtomicUsize::new(0));
        let of = online_fires.clone();
        let ff = offline_fires.clone();
        q.on_online(move || {
            of.fetch_add(1, O::SeqCst);
        });
        q.on_offline(move || {
            ff.fetch_add(1, O::SeqCst);
        });

        q.set_online(true); // already online: no transition
        assert_eq!(online_fires.load(O::SeqCst), 0);

        q.set_online(false);
        q.set_online(false); // repeat: no second fire
        assert_eq!(offline_fires.load(O::SeqCst), 1);

        q.set_online(true);
        assert_eq!(online_fires.load(O::SeqCst), 1);
    }

    #[test]
    fn sync_state_tracked_per_peer() {
        let (q, _store) = queue_with_store();
        q.record_sync_state("peer-a", 5);
        q.record_sync_state("peer-b", 2);
        assert_eq!(q.get_last_synced_seq("peer-a"), Some(5));
        assert_eq!(q.get_last_synced_seq("peer-b"), Some(2));
        assert_eq!(q.get_last_synced_seq("peer-c"), None);
    }
}
