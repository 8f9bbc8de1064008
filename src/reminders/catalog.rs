//! Catalog source implementations.

use std::sync::{Mutex, RwLock};

use rusqlite::Connection;
use uuid::Uuid;

use super::error::ReminderError;
use super::traits::CatalogSource;
use crate::db::repository;
use crate::models::MedicineSchedule;

/// Schedules held in memory, editable in place.
#[derive(Default)]
pub struct StaticCatalog {
    schedules: RwLock<Vec<MedicineSchedule>>,
}

impl StaticCatalog {
    pub fn new(schedules: Vec<MedicineSchedule>) -> Self {
        Self {
            schedules: RwLock::new(schedules),
        }
    }

    /// Insert or replace by id.
    pub fn upsert(&self, schedule: MedicineSchedule) -> Result<(), ReminderError> {
        let mut schedules = self.schedules.write().map_err(|_| ReminderError::LockPoisoned)?;
        match schedules.iter_mut().find(|s| s.id == schedule.id) {
            Some(existing) => *existing = schedule,
            None => schedules.push(schedule),
        }
        Ok(())
    }

    pub fn remove(&self, medicine_id: &Uuid) -> Result<bool, ReminderError> {
        let mut schedules = self.schedules.write().map_err(|_| ReminderError::LockPoisoned)?;
        let before = schedules.len();
        schedules.retain(|s| &s.id != medicine_id);
        Ok(schedules.len() != before)
    }
}

impl CatalogSource for StaticCatalog {
    fn list_schedules(&self) -> Result<Vec<MedicineSchedule>, ReminderError> {
        Ok(self
            .schedules
            .read()
            .map_err(|_| ReminderError::LockPoisoned)?
            .clone())
    }
}

/// Schedules read from the `reminder_schedules` tables.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn save_schedule(&self, schedule: &MedicineSchedule) -> Result<(), ReminderError> {
        let conn = self.conn.lock().map_err(|_| ReminderError::LockPoisoned)?;
        repository::save_schedule(&conn, schedule)?;
        Ok(())
    }

    pub fn delete_schedule(&self, medicine_id: &Uuid) -> Result<(), ReminderError> {
        let conn = self.conn.lock().map_err(|_| ReminderError::LockPoisoned)?;
        repository::delete_schedule(&conn, medicine_id)?;
        Ok(())
    }

    pub fn set_enabled(&self, medicine_id: &Uuid, enabled: bool) -> Result<(), ReminderError> {
        let conn = self.conn.lock().map_err(|_| ReminderError::LockPoisoned)?;
        repository::set_schedule_enabled(&conn, medicine_id, enabled)?;
        Ok(())
    }
}

impl CatalogSource for SqliteCatalog {
    fn list_schedules(&self) -> Result<Vec<MedicineSchedule>, ReminderError> {
        let conn = self.conn.lock().map_err(|_| ReminderError::LockPoisoned)?;
        Ok(repository::fetch_schedules(&conn)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::DatabaseError;
    use crate::models::{RecurrenceKind, TimeOfDay};
    use chrono::NaiveDate;

    fn schedule(name: &str) -> MedicineSchedule {
        MedicineSchedule::new(
            Uuid::new_v4(),
            name,
            RecurrenceKind::Daily,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
        .with_times([TimeOfDay::new(8, 0).unwrap()])
    }

    #[test]
    fn static_catalog_upsert_replaces() {
        let catalog = StaticCatalog::default();
        let mut s = schedule("Aspirin");
        catalog.upsert(s.clone()).unwrap();
        s.name = "Aspirin 100mg".into();
        catalog.upsert(s.clone()).unwrap();

        let all = catalog.list_schedules().unwrap();
        assert_eq!(all, vec![s]);
    }

    #[test]
    fn static_catalog_remove() {
        let s = schedule("Aspirin");
        let catalog = StaticCatalog::new(vec![s.clone()]);
        assert!(catalog.remove(&s.id).unwrap());
        assert!(!catalog.remove(&s.id).unwrap());
        assert!(catalog.list_schedules().unwrap().is_empty());
    }

    #[test]
    fn sqlite_catalog_lists_saved_schedules() {
        let catalog = SqliteCatalog::new(open_memory_database().unwrap());
        let a = schedule("Atorvastatin");
        let b = schedule("Bisoprolol");
        catalog.save_schedule(&b).unwrap();
        catalog.save_schedule(&a).unwrap();

        let all = catalog.list_schedules().unwrap();
        assert_eq!(all, vec![a, b]);
    }

    #[test]
    fn sqlite_catalog_disable_and_delete() {
        let catalog = SqliteCatalog::new(open_memory_database().unwrap());
        let s = schedule("Levothyroxine");
        catalog.save_schedule(&s).unwrap();

        catalog.set_enabled(&s.id, false).unwrap();
        assert!(!catalog.list_schedules().unwrap()[0].enabled);

        catalog.delete_schedule(&s.id).unwrap();
        assert!(matches!(
            catalog.delete_schedule(&s.id),
            Err(ReminderError::Database(DatabaseError::NotFound { .. }))
        ));
    }
}
