//! IndexedMemoryAdapter (C6): secondary in-memory indices (by id, by agent,
//! by time, by tag) over a set of memory nodes, kept consistent with a log.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::HypercoreError;

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryNode {
    pub id: String,
    pub agent_id: String,
    pub timestamp: u64,
    pub tags: Vec<String>,
    pub content: Value,
}

#[derive(Default)]
struct Indices {
    by_id: HashMap<String, MemoryNode>,
    by_agent: HashMap<String, Vec<String>>,
    by_time: Vec<(u64, String)>,
    by_tag: HashMap<String, Vec<String>>,
}

pub struct IndexedMemoryAdapter {
    indices: Mutex<Indices>,
    max_payload_bytes: u32,
}

impl IndexedMemoryAdapter {
    pub fn new(max_payload_bytes: u32) -> Self {
        Self {
            indices: Mutex::new(Indices::default()),
            max_payload_bytes,
        }
    }

    /// Inserts or overwrites a node and updates every secondary index.
    /// Overwriting a node first removes its stale index entries, so
    /// `rebuild_index` over the same nodes always produces identical state.
    /// Rejects `node.content` over `max_payload_bytes` before touching any
    /// index.
    pub fn insert(&self, node: MemoryNode) -> Result<(), HypercoreError> {
        let size = crate::canonical::canonical_bytes(&node.content).len();
        if size > self.max_payload_bytes as usize {
            return Err(HypercoreError::PayloadTooLarge {
                size,
                max: self.max_payload_bytes,
            });
        }

        let mut idx = self.indices.lock().unwrap();
        if idx.by_id.contains_key(&node.id) {
            remove_from_secondary(&mut idx, &node.id);
        }
        idx.by_agent
            .entry(node.agent_id.clone())
            .or_default()
            .push(node.id.clone());
        idx.by_time.push((node.timestamp, node.id.clone()));
        idx.by_time.sort_by_key(|(t, _)| *t);
        for tag in &node.tags {
            idx.by_tag.entry(tag.clone()).or_default().push(node.id.clone());
        }
        idx.by_id.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<MemoryNode> {
        self.indices.lock().unwrap().by_id.get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut idx = self.indices.lock().unwrap();
        if idx.by_id.remove(id).is_none() {
            return false;
        }
        remove_from_secondary(&mut idx, id);
        true
    }

    pub fn query_by_agent(&self, agent_id: &str) -> Vec<MemoryNode> {
        let idx = self.indices.lock().unwrap();
        idx.by_agent
            .get(agent_id)
            .map(|ids| ids.iter().filter_map(|id| idx.by_id.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn query_by_time_range(&self, start: u64, end: u64) -> Vec<MemoryNode> {
        let idx = self.indices.lock().unwrap();
        idx.by_time
            .iter()
            .filter(|(t, _)| *t >= start && *t < end)
            .filter_map(|(_, id)| idx.by_id.get(id).cloned())
            .collect()
    }

    pub fn query_by_tag(&self, tag: &str) -> Vec<MemoryNode> {
        let idx = self.indices.lock().unwrap();
        idx.by_tag
            .get(tag)
            .map(|ids| ids.iter().filter_map(|id| idx.by_id.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.indices.lock().unwrap().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every secondary index and rebuilds it from the current set of
    /// primary entries. Used to restore the index-consistency invariant
    /// after bulk replays.
    pub fn rebuild_index(&self) {
        let mut idx = self.indices.lock().unwrap();
        let nodes: Vec<MemoryNode> = idx.by_id.values().cloned().collect();
        idx.by_agent.clear();
        idx.by_time.clear();
        idx.by_tag.clear();
        for node in nodes {
            idx.by_agent
                .entry(node.agent_id.clone())
                .or_default()
                .push(node.id.clone());
            idx.by_time.push((node.timestamp, node.id.clone()));
            for tag in &node.tags {
                idx.by_tag.entry(tag.clone()).or_default().push(node.id.clone());
            }
        }
        idx.by_time.sort_by_key(|(t, _)| *t);
    }
}

fn remove_from_secondary(idx: &mut Indices, id: &str) {
    for ids in idx.by_agent.values_mut() {
        ids.retain(|x| x != id);
    }
    idx.by_time.retain(|(_, x)| x != id);
    for ids in idx.by_tag.values_mut() {
        ids.retain(|x| x != id);
    }
}
