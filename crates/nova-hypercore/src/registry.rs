//! LogRegistry (C2): namespaced collection of [`LogStore`]s by name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::HypercoreError;
use crate::log_store::LogStore;

pub type SharedLogStore = Arc<Mutex<LogStore>>;

#[derive(Default)]
pub struct LogRegistry {
    stores: Mutex<HashMap<String, SharedLogStore>>,
    max_payload_bytes: u32,
}

impl LogRegistry {
    pub fn new(max_payload_bytes: u32) -> Self {
        Self {
            stores: Mutex::new(HashMap::new()),
            max_payload_bytes,
        }
    }

    /// Returns the existing store or creates one.
    pub fn get(&self, name: &str) -> SharedLogStore {
        let mut g = self.stores.lock().unwrap();
        g.entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(LogStore::new(name, self.max_payload_bytes))))
            .clone()
    }

    /// Looks up a store without creating one; errors if `name` was never
    /// registered via [`LogRegistry::get`].
    pub fn get_existing(&self, name: &str) -> Result<SharedLogStore, HypercoreError> {
        self.stores
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| HypercoreError::LogNotFound(name.to_string()))
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Releases all stores. Subsequent `get` calls create fresh, empty ones.
    pub fn close(&self) {
        self.stores.lock().unwrap().clear();
    }
}
