//! AgentRegistry (C10): agent cards, tiers, and sandbox membership, with
//! last-writer-wins merge of remote cards by revision.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::A2AError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    L0,
    L1,
    L2,
    L3,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CardOrigin {
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentCard {
    pub agent_id: String,
    pub tier: Tier,
    pub sandbox: String,
    pub capabilities: Vec<String>,
    pub revision: u64,
    #[serde(skip)]
    pub origin: CardOrigin,
}

impl AgentCard {
    pub fn new(agent_id: impl Into<String>, tier: Tier, sandbox: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            tier,
            sandbox: sandbox.into(),
            capabilities: Vec::new(),
            revision: 0,
            origin: CardOrigin::Local,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl Default for CardOrigin {
    fn default() -> Self {
        CardOrigin::Local
    }
}

#[derive(Default)]
pub struct AgentRegistry {
    cards: Mutex<HashMap<String, AgentCard>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, card: AgentCard) -> Result<(), A2AError> {
        let mut cards = self.cards.lock().unwrap();
        if cards.contains_key(&card.agent_id) {
            return Err(A2AError::AgentAlreadyRegistered(card.agent_id));
        }
        cards.insert(card.agent_id.clone(), card);
        Ok(())
    }

    pub fn deregister(&self, agent_id: &str) -> Result<(), A2AError> {
        self.cards
            .lock()
            .unwrap()
            .remove(agent_id)
            .map(|_| ())
            .ok_or_else(|| A2AError::AgentNotFound(agent_id.to_string()))
    }

    pub fn get(&self, agent_id: &str) -> Result<AgentCard, A2AError> {
        self.cards
            .lock()
            .unwrap()
            .get(agent_id)
            .cloned()
            .ok_or_else(|| A2AError::AgentNotFound(agent_id.to_string()))
    }

    pub fn list(&self) -> Vec<AgentCard> {
        let mut cards: Vec<AgentCard> = self.cards.lock().unwrap().values().cloned().collect();
        cards.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        cards
    }

    pub fn list_by_tier(&self, tier: Tier) -> Vec<AgentCard> {
        self.list().into_iter().filter(|c| c.tier == tier).collect()
    }

    pub fn bump_local_card(&self, agent_id: &str, update: impl FnOnce(&mut AgentCard)) -> Result<(), A2AError> {
        let mut cards = self.cards.lock().unwrap();
        let card = cards
            .get_mut(agent_id)
            .ok_or_else(|| A2AError::AgentNotFound(agent_id.to_string()))?;
        update(card);
        card.revision += 1;
        Ok(())
    }

    /// Merges a card received from a remote peer: highest revision wins; on
    /// a win the card's origin flips to `Remote`. A remote card for an
    /// unknown agent is simply inserted. A losing merge still bumps the
    /// existing card's revision, so a stale replay doesn't get re-offered
    /// as if it were still current.
    pub fn merge_remote_card(&self, mut incoming: AgentCard) -> bool {
        incoming.origin = CardOrigin::Remote;
        let mut cards = self.cards.lock().unwrap();
        match cards.get_mut(&incoming.agent_id) {
            Some(existing) if existing.revision >= incoming.revision => {
                existing.revision += 1;
                false
            }
            _ => {
                cards.insert(incoming.agent_id.clone(), incoming);
                true
            }
        }
    }
}
