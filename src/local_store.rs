//! Local Store: the last known session kept on this device.
//!
//! Never fails toward its caller. Read, write and clear faults are logged
//! and the caller proceeds as if nothing was stored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::PersistenceError;
use crate::logging;
use crate::models::SessionDocument;

/// Namespaced string key-value storage scoped to this device
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Volatile key-value store for hosts without a disk
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let entries = self.entries.lock().map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

#[derive(Clone)]
pub struct LocalStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
}

impl LocalStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last saved session, or None when absent or unreadable
    pub fn load(&self) -> Option<SessionDocument> {
        match self.try_load() {
            Ok(doc) => doc,
            Err(e) => {
                logging::log_error(None, &format!("Local session load failed: {}", e));
                None
            }
        }
    }

    fn try_load(&self) -> Result<Option<SessionDocument>, PersistenceError> {
        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Returns false when the write failed (already logged)
    pub fn save(&self, doc: &SessionDocument) -> bool {
        let result = serde_json::to_string(doc)
            .map_err(PersistenceError::from)
            .and_then(|raw| self.storage.set(&self.key, &raw));

        match result {
            Ok(()) => true,
            Err(e) => {
                logging::log_error(None, &format!("Local session save failed: {}", e));
                false
            }
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(&self.key) {
            logging::log_error(None, &format!("Local session clear failed: {}", e));
        }
    }
}
