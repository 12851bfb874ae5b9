//! Channel & ChannelManager (C13): per-peer connection state machine with
//! bounded message queues, exponential-backoff reconnect, and a handler
//! registry for delivered envelopes, grounded in `sven-p2p::node`'s
//! `NodeState` transitions.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::envelope::Envelope;
use crate::error::A2AError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

type EnvelopeHandler = Box<dyn Fn(&Envelope) + Send + Sync>;

pub struct Channel {
    pub peer_id: String,
    state: Mutex<ChannelState>,
    queue: Mutex<VecDeque<Envelope>>,
    max_queue_size: usize,
    retry_attempt: Mutex<u32>,
    max_retries: u32,
    base_backoff_ms: u64,
    max_backoff_ms: u64,
    handlers: Mutex<Vec<EnvelopeHandler>>,
}

impl Channel {
    pub fn new(peer_id: impl Into<String>, max_queue_size: usize, max_retries: u32) -> Self {
        Self {
            peer_id: peer_id.into(),
            state: Mutex::new(ChannelState::Connecting),
            queue: Mutex::new(VecDeque::new()),
            max_queue_size,
            retry_attempt: Mutex::new(0),
            max_retries,
            base_backoff_ms: 200,
            max_backoff_ms: 30_000,
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock().unwrap()
    }

    pub fn mark_open(&self) {
        *self.state.lock().unwrap() = ChannelState::Open;
        *self.retry_attempt.lock().unwrap() = 0;
    }

    pub fn mark_reconnecting(&self) {
        let mut state = self.state.lock().unwrap();
        if *state != ChannelState::Closed {
            *state = ChannelState::Reconnecting;
        }
    }

    pub fn mark_closed(&self) {
        *self.state.lock().unwrap() = ChannelState::Closed;
    }

    /// `base_backoff_ms * 2^attempt`, capped at `max_backoff_ms`, and bumps
    /// the internal attempt counter for next time.
    pub fn next_backoff_ms(&self) -> u64 {
        let mut attempt = self.retry_attempt.lock().unwrap();
        let backoff = self.base_backoff_ms.saturating_mul(1u64 << (*attempt).min(20));
        *attempt += 1;
        backoff.min(self.max_backoff_ms)
    }

    /// Records one failed connect/reconnect attempt. Transitions to
    /// `Reconnecting` while attempts remain, or `Closed` once `max_retries`
    /// has been exhausted.
    pub fn record_connect_failure(&self) -> ChannelState {
        let attempt = {
            let mut attempt = self.retry_attempt.lock().unwrap();
            *attempt += 1;
            *attempt
        };
        let mut state = self.state.lock().unwrap();
        *state = if attempt > self.max_retries {
            ChannelState::Closed
        } else {
            ChannelState::Reconnecting
        };
        *state
    }

    pub fn enqueue(&self, envelope: Envelope) -> Result<(), A2AError> {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() >= self.max_queue_size {
            return Err(A2AError::QueueFull(self.peer_id.clone()));
        }
        queue.push_back(envelope);
        Ok(())
    }

    pub fn dequeue(&self) -> Option<Envelope> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Registers a handler invoked, in registration order, on every
    /// envelope delivered via [`Channel::deliver_next`].
    pub fn register_handler<F>(&self, handler: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.handlers.lock().unwrap().push(Box::new(handler));
    }

    /// Pops the oldest queued envelope and invokes every registered handler
    /// on it; returns the envelope, or `None` if the queue is empty.
    pub fn deliver_next(&self) -> Option<Envelope> {
        let envelope = self.dequeue()?;
        for handler in self.handlers.lock().unwrap().iter() {
            handler(&envelope);
        }
        Some(envelope)
    }
}

pub struct ChannelManager {
    channels: Mutex<HashMap<String, std::sync::Arc<Channel>>>,
    default_max_queue_size: usize,
    default_max_retries: u32,
}

impl ChannelManager {
    pub fn new(default_max_queue_size: usize, default_max_retries: u32) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            default_max_queue_size,
            default_max_retries,
        }
    }

    pub fn open(&self, peer_id: &str) -> std::sync::Arc<Channel> {
        self.channels
            .lock()
            .unwrap()
            .entry(peer_id.to_string())
            .or_insert_with(|| {
                std::sync::Arc::new(Channel::new(
                    peer_id,
                    self.default_max_queue_size,
                    self.default_max_retries,
                ))
            })
            .clone()
    }

    pub fn get(&self, peer_id: &str) -> Result<std::sync::Arc<Channel>, A2AError> {
        self.channels
            .lock()
            .unwrap()
            .get(peer_id)
            .cloned()
            .ok_or_else(|| A2AError::ChannelNotFound(peer_id.to_string()))
    }

    pub fn close(&self, peer_id: &str) {
        if let Some(channel) = self.channels.lock().unwrap().get(peer_id) {
            channel.mark_closed();
        }
    }

    pub fn send(&self, peer_id: &str, envelope: Envelope) -> Result<(), A2AError> {
        let channel = self.get(peer_id)?;
        if channel.state() != ChannelState::Open {
            return Err(A2AError::ChannelNotOpen(peer_id.to_string()));
        }
        channel.enqueue(envelope)
    }

    pub fn list_peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.channels.lock().unwrap().keys().cloned().collect();
        peers.sort();
        peers
    }
}
