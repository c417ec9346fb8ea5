//! SQLite-backed session store.
//!
//! Records are stored whole as JSON rows. The schema is a single table
//! keyed by session id, created on open.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::domain::SessionRecord;

use super::{SessionStore, StoreError};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("create {}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("open {}: {}", path.display(), e)))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY,
                record      TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );",
        )
        .map_err(|e| StoreError::Unavailable(format!("migrate: {}", e)))?;
        debug!(path = %path.display(), "session store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(format!("open in-memory: {}", e)))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY,
                record      TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );",
        )
        .map_err(|e| StoreError::Unavailable(format!("migrate: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

impl SessionStore for SqliteStore {
    fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let conn = self.lock()?;
        let row: Option<String> = conn
            .query_row(
                "SELECT record FROM sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Unavailable(format!("load {}: {}", session_id, e)))?;

        match row {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StoreError::Corrupt(format!("session {}: {}", session_id, e))),
            None => Ok(None),
        }
    }

    fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)
            .map_err(|e| StoreError::Corrupt(format!("serialize {}: {}", record.id, e)))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sessions (id, record, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET record = ?2, updated_at = ?3",
            params![record.id, json, Utc::now().to_rfc3339()],
        )
        .map_err(|e| StoreError::Unavailable(format!("save {}: {}", record.id, e)))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id FROM sessions ORDER BY id")
            .map_err(|e| StoreError::Unavailable(format!("list: {}", e)))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::Unavailable(format!("list: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Unavailable(format!("list: {}", e)))?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeOp, ChangeSet, Goal};

    #[test]
    fn test_round_trip_preserves_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut record = SessionRecord::new("u1");
        record.profile.age = Some(34);
        record
            .apply(&ChangeSet::single(ChangeOp::AddGoal(Goal::new(
                "weight_loss",
                "lose 4 kg over 8 weeks",
                4.0,
                8,
            ))))
            .unwrap();
        store.save(&record).unwrap();

        let loaded = store.load("u1").unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_save_upserts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut record = SessionRecord::new("u1");
        store.save(&record).unwrap();
        record.profile.age = Some(40);
        store.save(&record).unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.load("u1").unwrap().unwrap().profile.age, Some(40));
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save(&SessionRecord::new("u1")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.load("u1").unwrap().is_some());
    }
}
