//! Active-timer registry and per-slot locks.
//!
//! The registry is the engine's own record of what it asked the timer
//! facility for. Each registration carries a generation number; a fired
//! payload whose generation no longer matches was replaced or cancelled and
//! is dropped, so a queued callback from a dead registration never delivers.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::error::ReminderError;
use super::traits::TimerFacility;
use super::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Registration {
    at: NaiveDateTime,
    generation: u64,
}

pub struct TimerRegistry {
    timers: Arc<dyn TimerFacility>,
    entries: Mutex<HashMap<TimerKey, Registration>>,
    next_generation: AtomicU64,
}

impl TimerRegistry {
    pub fn new(timers: Arc<dyn TimerFacility>) -> Self {
        Self {
            timers,
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Replace whatever is registered under `key` with a timer at `at`.
    ///
    /// The prior registration is always cancelled first. If the facility
    /// refuses, the key is left without a registration. Callers hold the
    /// key's slot lock; the facility is called without the entries lock held.
    pub fn register(
        &self,
        key: TimerKey,
        at: NaiveDateTime,
        occurrence: NaiveDateTime,
    ) -> Result<(), ReminderError> {
        self.forget(&key)?;
        self.timers.cancel(&key);

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let payload = TimerPayload {
            key,
            occurrence,
            generation,
        };
        self.timers.register(&key, at, payload)?;
        self.entries
            .lock()
            .map_err(|_| ReminderError::LockPoisoned)?
            .insert(key, Registration { at, generation });
        tracing::debug!(key = %key, at = %at, generation, "Timer registered");
        Ok(())
    }

    /// Cancel `key`. Returns whether the registry knew about it.
    pub fn cancel(&self, key: &TimerKey) -> Result<bool, ReminderError> {
        let known = self.forget(key)?;
        self.timers.cancel(key);
        Ok(known)
    }

    fn forget(&self, key: &TimerKey) -> Result<bool, ReminderError> {
        let mut entries = self.entries.lock().map_err(|_| ReminderError::LockPoisoned)?;
        Ok(entries.remove(key).is_some())
    }

    /// Claim a fired payload and return the instant it was registered for.
    /// `None` means the registration it came from is gone or was replaced,
    /// and the event must be dropped.
    pub fn consume(&self, payload: &TimerPayload) -> Result<Option<NaiveDateTime>, ReminderError> {
        let mut entries = self.entries.lock().map_err(|_| ReminderError::LockPoisoned)?;
        match entries.get(&payload.key) {
            Some(live) if live.generation == payload.generation => {
                Ok(entries.remove(&payload.key).map(|r| r.at))
            }
            _ => Ok(None),
        }
    }

    pub fn instant_of(&self, key: &TimerKey) -> Result<Option<NaiveDateTime>, ReminderError> {
        let entries = self.entries.lock().map_err(|_| ReminderError::LockPoisoned)?;
        Ok(entries.get(key).map(|r| r.at))
    }

    /// Every live key of one medicine, sorted.
    pub fn keys_for(&self, medicine_id: &Uuid) -> Result<Vec<TimerKey>, ReminderError> {
        let entries = self.entries.lock().map_err(|_| ReminderError::LockPoisoned)?;
        let mut keys: Vec<TimerKey> = entries
            .keys()
            .filter(|k| &k.medicine_id == medicine_id)
            .copied()
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Medicines that currently own at least one timer.
    pub fn medicines(&self) -> Result<Vec<Uuid>, ReminderError> {
        let entries = self.entries.lock().map_err(|_| ReminderError::LockPoisoned)?;
        let mut ids: Vec<Uuid> = entries.keys().map(|k| k.medicine_id).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Key → instant for every live registration.
    pub fn snapshot(&self) -> Result<BTreeMap<TimerKey, NaiveDateTime>, ReminderError> {
        let entries = self.entries.lock().map_err(|_| ReminderError::LockPoisoned)?;
        Ok(entries.iter().map(|(k, r)| (*k, r.at)).collect())
    }
}

/// Per-slot mutual exclusion, so cancel-then-register is atomic for a key.
///
/// Not reentrant: code running inside `with_slot` must not lock the same slot.
#[derive(Default)]
pub struct SlotLocks {
    locks: Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>,
}

impl SlotLocks {
    pub fn with_slot<R>(
        &self,
        slot: SlotKey,
        f: impl FnOnce() -> Result<R, ReminderError>,
    ) -> Result<R, ReminderError> {
        let lock = {
            let mut locks = self.locks.lock().map_err(|_| ReminderError::LockPoisoned)?;
            Arc::clone(locks.entry(slot).or_default())
        };
        let _guard = lock.lock().map_err(|_| ReminderError::LockPoisoned)?;
        f()
    }

    /// Drop lock entries for a medicine's slots once nothing uses them.
    pub fn release_medicine(&self, medicine_id: &Uuid) -> Result<(), ReminderError> {
        let mut locks = self.locks.lock().map_err(|_| ReminderError::LockPoisoned)?;
        locks.retain(|slot, lock| &slot.medicine_id != medicine_id || Arc::strong_count(lock) > 1);
        Ok(())
    }

    /// Drop the lock entry of one slot if nothing holds it.
    pub fn release_slot(&self, slot: &SlotKey) -> Result<(), ReminderError> {
        let mut locks = self.locks.lock().map_err(|_| ReminderError::LockPoisoned)?;
        if locks.get(slot).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(slot);
        }
        Ok(())
    }

    /// Number of slots with a lock entry.
    pub fn tracked_slots(&self) -> Result<usize, ReminderError> {
        Ok(self.locks.lock().map_err(|_| ReminderError::LockPoisoned)?.len())
    }
}
