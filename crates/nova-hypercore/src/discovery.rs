//! DiscoveryManager (C4): announce/lookup peers for a topic behind an
//! abstract [`Transport`] port, matching `sven-p2p`'s discovery provider
//! split between a trait and an in-memory test impl.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::HypercoreError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerInfo {
    pub peer_id: String,
    pub address: String,
}

#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    PeerAdded(PeerInfo),
    PeerRemoved(String),
    LookupComplete { topic: String, peers: Vec<PeerInfo> },
}

/// Abstract announce/lookup port. Production transports (DHT, mDNS, relay)
/// implement this; tests use [`InMemoryTransport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn announce(&self, topic: &str, me: &PeerInfo) -> Result<(), HypercoreError>;
    async fn lookup(&self, topic: &str) -> Result<Vec<PeerInfo>, HypercoreError>;
    async fn leave(&self, topic: &str, peer_id: &str) -> Result<(), HypercoreError>;
}

type Listener = Box<dyn Fn(&DiscoveryEvent) + Send + Sync>;

pub struct DiscoveryManager {
    transport: Arc<dyn Transport>,
    me: PeerInfo,
    topics: Mutex<HashMap<String, HashSet<String>>>,
    known_peers: Mutex<HashMap<String, PeerInfo>>,
    listeners: Mutex<Vec<Listener>>,
}

impl DiscoveryManager {
    pub fn new(transport: Arc<dyn Transport>, me: PeerInfo) -> Self {
        Self {
            transport,
            me,
            topics: Mutex::new(HashMap::new()),
            known_peers: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn on<F>(&self, listener: F)
    where
        F: Fn(&DiscoveryEvent) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    fn emit(&self, event: DiscoveryEvent) {
        for l in self.listeners.lock().unwrap().iter() {
            l(&event);
        }
    }

    pub async fn announce(&self, topic: &str) -> Result<(), HypercoreError> {
        self.transport.announce(topic, &self.me).await?;
        self.topics
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_default()
            .insert(self.me.peer_id.clone());
        Ok(())
    }

    pub async fn lookup(&self, topic: &str) -> Result<Vec<PeerInfo>, HypercoreError> {
        let peers = self.transport.lookup(topic).await?;
        {
            let mut known = self.known_peers.lock().unwrap();
            for peer in &peers {
                if known.insert(peer.peer_id.clone(), peer.clone()).is_none() {
                    self.emit(DiscoveryEvent::PeerAdded(peer.clone()));
                }
            }
        }
        self.emit(DiscoveryEvent::LookupComplete {
            topic: topic.to_string(),
            peers: peers.clone(),
        });
        Ok(peers)
    }

    pub async fn leave(&self, topic: &str) -> Result<(), HypercoreError> {
        self.transport.leave(topic, &self.me.peer_id).await?;
        if let Some(set) = self.topics.lock().unwrap().get_mut(topic) {
            set.remove(&self.me.peer_id);
        }
        Ok(())
    }

    pub fn get_peers(&self) -> Vec<PeerInfo> {
        self.known_peers.lock().unwrap().values().cloned().collect()
    }

    pub fn get_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.lock().unwrap().keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn forget_peer(&self, peer_id: &str) {
        if self.known_peers.lock().unwrap().remove(peer_id).is_some() {
            self.emit(DiscoveryEvent::PeerRemoved(peer_id.to_string()));
        }
    }

    /// Drops all topics and known peers; listeners remain registered but fire no more events.
    pub fn destroy(&self) {
        self.topics.lock().unwrap().clear();
        self.known_peers.lock().unwrap().clear();
    }
}

/// In-process transport for tests and single-host demos: announcements and
/// lookups go through a shared, process-wide table rather than a real DHT.
#[derive(Default)]
pub struct InMemoryTransport {
    registrations: Mutex<HashMap<String, HashMap<String, PeerInfo>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn announce(&self, topic: &str, me: &PeerInfo) -> Result<(), HypercoreError> {
        self.registrations
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_default()
            .insert(me.peer_id.clone(), me.clone());
        Ok(())
    }

    async fn lookup(&self, topic: &str) -> Result<Vec<PeerInfo>, HypercoreError> {
        Ok(self
            .registrations
            .lock()
            .unwrap()
            .get(topic)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn leave(&self, topic: &str, peer_id: &str) -> Result<(), HypercoreError> {
        if let Some(m) = self.registrations.lock().unwrap().get_mut(topic) {
            m.remove(peer_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn peer(id: &str) -> PeerInfo {
        PeerInfo {
            peer_id: id.to_string(),
            address: format!("mem://{id}"),
        }
    }

    #[tokio::test]
    async fn announce_then_lookup_from_another_peer() {
        let transport = Arc::new(InMemoryTransport::new());
        let a = DiscoveryManager::new(transport.clone(), peer("a"));
        let b = DiscoveryManager::new(transport, peer("b"));

        a.announce("room").await.unwrap();
        let found = b.lookup("room").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].peer_id, "a");
    }

    #[tokio::test]
    async fn lookup_emits_peer_added_once_per_peer() {
        let transport = Arc::new(InMemoryTransport::new());
        let a = DiscoveryManager::new(transport.clone(), peer("a"));
        let b = DiscoveryManager::new(transport, peer("b"));
        a.announce("room").await.unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        b.on(move |ev| {
            if matches!(ev, DiscoveryEvent::PeerAdded(_)) {
                seen2.fetch_add(1, Ordering::SeqCst);
            }
        });

        b.lookup("room").await.unwrap();
        b.lookup("room").await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn leave_removes_peer_from_topic() {
        let transport = Arc::new(InMemoryTransport::new());
        let a = DiscoveryManager::new(transport.clone(), peer("a"));
        let b = DiscoveryManager::new(transport, peer("b"));
        a.announce("room").await.unwrap();
        a.leave("room").await.unwrap();

        let found = b.lookup("room").await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn get_topics_lists_announced_topics_sorted() {
        let transport = Arc::new(InMemoryTransport::new());
        let a = DiscoveryManager::new(transport, peer("a"));
        a.announce("zeta").await.unwrap();
        a.announce("alpha").await.unwrap();
        assert_eq!(a.get_topics(), vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[tokio::test]
    async fn destroy_clears_known_peers() {
        let transport = Arc::new(InMemoryTransport::new());
        let a = DiscoveryManager::new(transport.clone(), peer("a"));
        let b = DiscoveryManager::new(transport, peer("b"));
        a.announce("room").await.unwrap();
        b.lookup("room").await.unwrap();
        assert_eq!(b.get_peers().len(), 1);
        b.destroy();
        assert!(b.get_peers().is_empty());
    }
}
