//! Session persistence.

mod sqlite;

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::domain::SessionRecord;

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("stored session is corrupt: {0}")]
    Corrupt(String),
}

/// Durable home for session records.
pub trait SessionStore: Send + Sync {
    /// Loads a session, or None if it has never been saved.
    fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError>;

    fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        Ok(records.get(session_id).cloned())
    }

    fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        let mut ids: Vec<String> = records.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load("u1").unwrap().is_none());

        let record = SessionRecord::new("u1");
        store.save(&record).unwrap();

        let loaded = store.load("u1").unwrap().unwrap();
        assert_eq!(loaded.id, "u1");
        assert_eq!(store.list().unwrap(), vec!["u1".to_string()]);
    }
}
