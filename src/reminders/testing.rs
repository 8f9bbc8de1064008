//! Recording fakes and small constructors shared by the engine tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use super::error::TimerError;
use super::traits::{Clock, NotificationSink, OutcomeSink, TimerFacility};
use super::types::*;
use crate::models::TimeOfDay;

pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn tod(hour: u8, minute: u8) -> TimeOfDay {
    TimeOfDay::new(hour, minute).unwrap()
}

/// Wall clock that follows tokio's (pausable) clock from a fixed start.
pub struct PausedClock {
    base: NaiveDateTime,
    start: tokio::time::Instant,
}

impl PausedClock {
    pub fn starting_at(base: NaiveDateTime) -> Self {
        Self {
            base,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for PausedClock {
    fn now(&self) -> NaiveDateTime {
        self.base + chrono::Duration::from_std(self.start.elapsed()).unwrap()
    }
}

/// Timer facility that only remembers what is live.
#[derive(Default)]
pub struct RecordingTimers {
    live: Mutex<BTreeMap<TimerKey, (NaiveDateTime, TimerPayload)>>,
    denied: Mutex<HashSet<Uuid>>,
    registrations: Mutex<usize>,
}

impl RecordingTimers {
    pub fn live(&self) -> BTreeMap<TimerKey, NaiveDateTime> {
        self.live
            .lock()
            .unwrap()
            .iter()
            .map(|(k, (at, _))| (*k, *at))
            .collect()
    }

    pub fn payload(&self, key: &TimerKey) -> Option<TimerPayload> {
        self.live.lock().unwrap().get(key).map(|(_, p)| *p)
    }

    /// Remove the earliest timer due at or before `until`, as if it fired.
    pub fn pop_due(&self, until: NaiveDateTime) -> Option<(NaiveDateTime, TimerPayload)> {
        let mut live = self.live.lock().unwrap();
        let (key, at) = live
            .iter()
            .filter(|(_, (at, _))| *at <= until)
            .min_by_key(|(k, (at, _))| (*at, **k))
            .map(|(k, (at, _))| (*k, *at))?;
        live.remove(&key).map(|(_, payload)| (at, payload))
    }

    /// Refuse every registration for `medicine_id`.
    pub fn deny(&self, medicine_id: Uuid) {
        self.denied.lock().unwrap().insert(medicine_id);
    }

    pub fn allow(&self, medicine_id: Uuid) {
        self.denied.lock().unwrap().remove(&medicine_id);
    }

    pub fn registration_count(&self) -> usize {
        *self.registrations.lock().unwrap()
    }
}

impl TimerFacility for RecordingTimers {
    fn register(
        &self,
        key: &TimerKey,
        at: NaiveDateTime,
        payload: TimerPayload,
    ) -> Result<(), TimerError> {
        if self.denied.lock().unwrap().contains(&key.medicine_id) {
            return Err(TimerError::Unavailable("exact alarms not permitted".into()));
        }
        *self.registrations.lock().unwrap() += 1;
        self.live.lock().unwrap().insert(*key, (at, payload));
        Ok(())
    }

    fn cancel(&self, key: &TimerKey) {
        self.live.lock().unwrap().remove(key);
    }
}

#[derive(Default)]
pub struct RecordingNotifications {
    delivered: Mutex<Vec<ReminderNotification>>,
}

impl RecordingNotifications {
    pub fn all(&self) -> Vec<ReminderNotification> {
        self.delivered.lock().unwrap().clone()
    }

    /// (trigger instant, level) of every delivery, in order.
    pub fn levels(&self) -> Vec<(NaiveDateTime, u8)> {
        self.all().iter().map(|n| (n.occurrence, n.level)).collect()
    }
}

impl NotificationSink for RecordingNotifications {
    fn deliver(&self, notification: &ReminderNotification) {
        self.delivered.lock().unwrap().push(notification.clone());
    }
}

#[derive(Default)]
pub struct RecordingOutcomes {
    events: Mutex<Vec<OutcomeEvent>>,
}

impl RecordingOutcomes {
    pub fn all(&self) -> Vec<OutcomeEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl OutcomeSink for RecordingOutcomes {
    fn emit(&self, event: &OutcomeEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
