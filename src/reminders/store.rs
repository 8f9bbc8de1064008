//! History store implementations.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rusqlite::Connection;
use uuid::Uuid;

use super::error::ReminderError;
use super::traits::HistoryStore;
use crate::db::repository;
use crate::models::{HistoryKind, HistoryRecord};

/// SQLite-backed history store. Owns its own connection.
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn load_all(&self) -> Result<Vec<HistoryRecord>, ReminderError> {
        let conn = self.conn.lock().map_err(|_| ReminderError::LockPoisoned)?;
        Ok(repository::fetch_all_history(&conn)?)
    }

    fn persist(&self, records: &[HistoryRecord]) -> Result<(), ReminderError> {
        let conn = self.conn.lock().map_err(|_| ReminderError::LockPoisoned)?;
        repository::replace_history(&conn, records)
            .map_err(|e| ReminderError::Persistence(e.to_string()))
    }

    fn remove(&self, medicine_id: &Uuid) -> Result<(), ReminderError> {
        let conn = self.conn.lock().map_err(|_| ReminderError::LockPoisoned)?;
        let removed = repository::delete_history(&conn, medicine_id)
            .map_err(|e| ReminderError::Persistence(e.to_string()))?;
        tracing::debug!(medicine_id = %medicine_id, removed, "Removed stored history");
        Ok(())
    }
}

/// In-process history store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryHistoryStore {
    records: Mutex<BTreeMap<(Uuid, HistoryKind), Vec<u32>>>,
}

impl HistoryStore for MemoryHistoryStore {
    fn load_all(&self) -> Result<Vec<HistoryRecord>, ReminderError> {
        let records = self.records.lock().map_err(|_| ReminderError::LockPoisoned)?;
        Ok(records
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|((medicine_id, kind), values)| HistoryRecord {
                medicine_id: *medicine_id,
                kind: *kind,
                values: values.clone(),
            })
            .collect())
    }

    fn persist(&self, records: &[HistoryRecord]) -> Result<(), ReminderError> {
        let mut stored = self.records.lock().map_err(|_| ReminderError::LockPoisoned)?;
        for record in records {
            stored.insert((record.medicine_id, record.kind), record.values.clone());
        }
        Ok(())
    }

    fn remove(&self, medicine_id: &Uuid) -> Result<(), ReminderError> {
        let mut stored = self.records.lock().map_err(|_| ReminderError::LockPoisoned)?;
        stored.retain(|(id, _), _| id != medicine_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn record(id: Uuid, kind: HistoryKind, values: &[u32]) -> HistoryRecord {
        HistoryRecord {
            medicine_id: id,
            kind,
            values: values.to_vec(),
        }
    }

    #[test]
    fn sqlite_store_round_trips_buffers() {
        let store = SqliteHistoryStore::new(open_memory_database().unwrap());
        let id = Uuid::new_v4();
        store.persist(&[record(id, HistoryKind::Snooze, &[10, 10, 20])]).unwrap();
        store.persist(&[record(id, HistoryKind::Delay, &[35])]).unwrap();

        let mut all = store.load_all().unwrap();
        all.sort_by_key(|r| r.kind);
        assert_eq!(
            all,
            vec![
                record(id, HistoryKind::Snooze, &[10, 10, 20]),
                record(id, HistoryKind::Delay, &[35]),
            ]
        );
    }

    #[test]
    fn sqlite_store_rejects_invalid_samples() {
        let store = SqliteHistoryStore::new(open_memory_database().unwrap());
        let result = store.persist(&[record(Uuid::new_v4(), HistoryKind::Delay, &[0])]);
        assert!(matches!(result, Err(ReminderError::Persistence(_))));
    }

    #[test]
    fn sqlite_store_remove() {
        let store = SqliteHistoryStore::new(open_memory_database().unwrap());
        let id = Uuid::new_v4();
        store.persist(&[record(id, HistoryKind::Snooze, &[5])]).unwrap();
        store.remove(&id).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn memory_store_replaces_per_kind() {
        let store = MemoryHistoryStore::default();
        let id = Uuid::new_v4();
        store.persist(&[record(id, HistoryKind::Snooze, &[5])]).unwrap();
        store.persist(&[record(id, HistoryKind::Snooze, &[5, 15])]).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![record(id, HistoryKind::Snooze, &[5, 15])]);
    }
}
