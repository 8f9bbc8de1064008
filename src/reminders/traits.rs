//! Trait definitions for the reminder engine's external collaborators.
//!
//! Six traits define the boundaries:
//! - CatalogSource: read-only medicine schedules
//! - TimerFacility: keyed one-shot timers (replace-not-duplicate)
//! - NotificationSink: one delivery per transition into a pending level
//! - OutcomeSink: one event per terminal transition
//! - HistoryStore: durable copy of the learner's buffers
//! - Clock: local wall-clock time, injectable for tests

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::error::{ReminderError, TimerError};
use super::types::*;
use crate::models::{HistoryRecord, MedicineSchedule};

/// Read-only source of medicine schedules.
pub trait CatalogSource: Send + Sync {
    /// Every known schedule, enabled or not.
    fn list_schedules(&self) -> Result<Vec<MedicineSchedule>, ReminderError>;
}

/// Keyed one-shot timers. Registering under a live key replaces it.
pub trait TimerFacility: Send + Sync {
    /// Arrange for `payload` to come back at `at`.
    fn register(
        &self,
        key: &TimerKey,
        at: NaiveDateTime,
        payload: TimerPayload,
    ) -> Result<(), TimerError>;

    /// Drop the registration under `key`. Unknown keys are ignored.
    fn cancel(&self, key: &TimerKey);
}

pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &ReminderNotification);
}

pub trait OutcomeSink: Send + Sync {
    fn emit(&self, event: &OutcomeEvent);
}

/// Durable copy of the learner's per-medicine buffers.
pub trait HistoryStore: Send + Sync {
    /// Read once at startup.
    fn load_all(&self) -> Result<Vec<HistoryRecord>, ReminderError>;

    /// Replace the stored buffer for each record's (medicine, kind).
    fn persist(&self, records: &[HistoryRecord]) -> Result<(), ReminderError>;

    /// Forget everything stored for a medicine.
    fn remove(&self, medicine_id: &Uuid) -> Result<(), ReminderError>;
}

/// Local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify traits are object-safe (can be used as `dyn Trait`)
    #[test]
    fn traits_are_object_safe() {
        fn _assert_catalog(_: &dyn CatalogSource) {}
        fn _assert_timers(_: &dyn TimerFacility) {}
        fn _assert_notifications(_: &dyn NotificationSink) {}
        fn _assert_outcomes(_: &dyn OutcomeSink) {}
        fn _assert_history(_: &dyn HistoryStore) {}
        fn _assert_clock(_: &dyn Clock) {}
    }
}
