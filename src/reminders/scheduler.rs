//! Reminder scheduler: the root of the engine.
//!
//! Owns the timer registry, the escalation machine and the per-slot locks,
//! and routes everything that happens to a slot through that slot's lock:
//! rebuilds, timer callbacks, user actions and cancellation. Effects returned
//! by the escalation machine are applied here, in order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::error::{ReminderError, ScheduleError};
use super::escalation::{ActiveOccurrence, Effect, EscalationMachine};
use super::learner::{PatternLearner, Suggestions};
use super::recurrence;
use super::registry::{SlotLocks, TimerRegistry};
use super::traits::*;
use super::types::*;
use crate::models::{MedicineSchedule, TimeOfDay};

/// Per-medicine summary of a rebuild. A bad schedule never aborts the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Slots with a registered regular timer.
    pub scheduled: usize,
    /// Slots with no remaining occurrence (expired or out of dates).
    pub finished: usize,
    pub disabled: usize,
    /// Medicines no longer in the catalog whose timers were cancelled.
    pub removed: usize,
    pub config_errors: Vec<(Uuid, ScheduleError)>,
    /// Slots the timer facility refused; retried on the next rebuild.
    pub unavailable: Vec<TimerKey>,
}

pub struct ReminderScheduler {
    registry: TimerRegistry,
    slot_locks: SlotLocks,
    machine: EscalationMachine,
    learner: Arc<PatternLearner>,
    notifications: Arc<dyn NotificationSink>,
    outcomes: Arc<dyn OutcomeSink>,
    catalog: RwLock<HashMap<Uuid, MedicineSchedule>>,
}

impl ReminderScheduler {
    pub fn new(
        config: ReminderConfig,
        timers: Arc<dyn TimerFacility>,
        learner: Arc<PatternLearner>,
        notifications: Arc<dyn NotificationSink>,
        outcomes: Arc<dyn OutcomeSink>,
    ) -> Result<Self, ReminderError> {
        config.validate()?;
        Ok(Self {
            registry: TimerRegistry::new(timers),
            slot_locks: SlotLocks::default(),
            machine: EscalationMachine::new(config),
            learner,
            notifications,
            outcomes,
            catalog: RwLock::new(HashMap::new()),
        })
    }

    // ═══════════════════════════════════════════
    // Rebuild
    // ═══════════════════════════════════════════

    /// Re-derive every regular timer from the catalog and the current time.
    ///
    /// Idempotent: the same catalog and clock always leave the same set of
    /// keys and instants. Pending occurrences keep their escalation timers.
    pub fn rebuild_all(
        &self,
        catalog: &dyn CatalogSource,
        now: NaiveDateTime,
    ) -> Result<RebuildReport, ReminderError> {
        let schedules = catalog.list_schedules()?;
        let mut report = RebuildReport::default();

        let incoming: HashMap<Uuid, MedicineSchedule> =
            schedules.into_iter().map(|s| (s.id, s)).collect();

        // Swap the catalog before clearing so a concurrent fire for a
        // removed medicine finds nothing to schedule.
        let previous = std::mem::replace(
            &mut *self.catalog.write().map_err(|_| ReminderError::LockPoisoned)?,
            incoming.clone(),
        );
        let mut known: BTreeSet<Uuid> = self.registry.medicines()?.into_iter().collect();
        known.extend(previous.keys().copied());
        for medicine_id in known.iter().filter(|id| !incoming.contains_key(*id)) {
            self.clear_medicine(medicine_id, previous.get(medicine_id))?;
            self.slot_locks.release_medicine(medicine_id)?;
            report.removed += 1;
            tracing::info!(medicine_id = %medicine_id, "Medicine left the catalog, timers cancelled");
        }

        let mut ordered: Vec<&MedicineSchedule> = incoming.values().collect();
        ordered.sort_by_key(|s| s.id);

        for schedule in ordered {
            if !schedule.enabled {
                self.clear_medicine(&schedule.id, Some(schedule))?;
                self.slot_locks.release_medicine(&schedule.id)?;
                report.disabled += 1;
                continue;
            }
            if let Err(e) = recurrence::validate_schedule(schedule) {
                tracing::warn!(
                    medicine_id = %schedule.id,
                    name = %schedule.name,
                    error = %e,
                    "Invalid reminder schedule, no timers registered"
                );
                self.clear_medicine(&schedule.id, Some(schedule))?;
                self.slot_locks.release_medicine(&schedule.id)?;
                report.config_errors.push((schedule.id, e));
                continue;
            }

            self.drop_removed_slots(schedule)?;

            for time_of_day in &schedule.times_of_day {
                let slot = SlotKey::new(schedule.id, *time_of_day);
                let result = self
                    .slot_locks
                    .with_slot(slot, || self.schedule_regular(schedule, slot, now, true));
                match result {
                    Ok(Some(_)) => report.scheduled += 1,
                    Ok(None) => report.finished += 1,
                    Err(ReminderError::Timer(e)) => {
                        tracing::warn!(slot = %slot, error = %e, "Timer facility refused registration");
                        report.unavailable.push(slot.timer(TimerPurpose::Regular));
                    }
                    Err(ReminderError::Schedule(e)) => {
                        report.config_errors.push((schedule.id, e));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        tracing::info!(
            scheduled = report.scheduled,
            finished = report.finished,
            disabled = report.disabled,
            removed = report.removed,
            config_errors = report.config_errors.len(),
            unavailable = report.unavailable.len(),
            "Reminder schedules rebuilt"
        );
        Ok(report)
    }

    // ═══════════════════════════════════════════
    // Timer callbacks
    // ═══════════════════════════════════════════

    /// Route a fired timer payload. Payloads from replaced or cancelled
    /// registrations are dropped.
    pub fn handle_timer(&self, payload: TimerPayload, now: NaiveDateTime) -> Result<(), ReminderError> {
        let slot = payload.key.slot();
        self.slot_locks.with_slot(slot, || {
            let Some(registered_at) = self.registry.consume(&payload)? else {
                tracing::debug!(key = %payload.key, "Dropped stale timer event");
                return Ok(());
            };

            let occurrence = OccurrenceKey::new(slot, payload.occurrence);
            match payload.key.purpose {
                TimerPurpose::Regular => self.fire_regular(slot, payload.occurrence, now),
                // A snooze payload carries the scheduled instant; the new
                // occurrence is keyed by the snooze instant itself.
                TimerPurpose::Snooze => {
                    self.fire_snooze(OccurrenceKey::new(slot, registered_at), payload.occurrence, now)
                }
                TimerPurpose::Expiry => {
                    let effects = self.machine.expire(occurrence)?;
                    self.apply(effects, now)
                }
                purpose => match purpose.escalation_level() {
                    Some(level) => {
                        let next_regular = self.registry.instant_of(&slot.timer(TimerPurpose::Regular))?;
                        let effects = self.machine.escalate(occurrence, level, next_regular, now)?;
                        self.apply(effects, now)
                    }
                    None => Ok(()),
                },
            }
        })
    }

    /// A regular trigger fired: enter PENDING(0), then register the
    /// following occurrence.
    pub fn on_timer_fired(
        &self,
        medicine_id: Uuid,
        time_of_day: TimeOfDay,
        trigger_instant: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<(), ReminderError> {
        let slot = SlotKey::new(medicine_id, time_of_day);
        self.slot_locks
            .with_slot(slot, || self.fire_regular(slot, trigger_instant, now))
    }

    /// Forward a user action to the slot's pending occurrence. `occurrence`
    /// pins the action to one trigger instant; `None` targets whatever is
    /// pending.
    pub fn on_user_action(
        &self,
        medicine_id: Uuid,
        time_of_day: TimeOfDay,
        occurrence: Option<NaiveDateTime>,
        action: UserAction,
        now: NaiveDateTime,
    ) -> Result<(), ReminderError> {
        let slot = SlotKey::new(medicine_id, time_of_day);
        self.slot_locks.with_slot(slot, || {
            let effects = self.machine.act(slot, occurrence, action, now)?;
            self.apply(effects, now)
        })
    }

    // ═══════════════════════════════════════════
    // Cancellation
    // ═══════════════════════════════════════════

    /// Cancel every timer of a medicine and stop tracking it until the next
    /// rebuild. Returns how many live timers were cancelled.
    ///
    /// The medicine leaves the catalog before any slot is cleared, so a
    /// trigger racing the cancellation is ignored instead of re-arming.
    /// Pending occurrences are dropped without an outcome event.
    pub fn cancel_all(&self, medicine_id: &Uuid) -> Result<usize, ReminderError> {
        let removed = self
            .catalog
            .write()
            .map_err(|_| ReminderError::LockPoisoned)?
            .remove(medicine_id);
        let cancelled = self.clear_medicine(medicine_id, removed.as_ref())?;
        self.slot_locks.release_medicine(medicine_id)?;
        tracing::info!(medicine_id = %medicine_id, cancelled, "All reminders cancelled");
        Ok(cancelled)
    }

    /// `cancel_all` plus dropping the learned history.
    pub fn forget_medicine(&self, medicine_id: &Uuid) -> Result<usize, ReminderError> {
        let cancelled = self.cancel_all(medicine_id)?;
        self.learner.forget(medicine_id)?;
        Ok(cancelled)
    }

    // ═══════════════════════════════════════════
    // Introspection
    // ═══════════════════════════════════════════

    pub fn active_timers(&self) -> Result<BTreeMap<TimerKey, NaiveDateTime>, ReminderError> {
        self.registry.snapshot()
    }

    pub fn pending_occurrence(&self, slot: &SlotKey) -> Result<Option<ActiveOccurrence>, ReminderError> {
        self.machine.pending(slot)
    }

    pub fn suggestions(&self, medicine_id: &Uuid, time_of_day: TimeOfDay) -> Result<Suggestions, ReminderError> {
        self.learner.suggestions(medicine_id, time_of_day)
    }

    pub fn learner(&self) -> &Arc<PatternLearner> {
        &self.learner
    }

    // ═══════════════════════════════════════════
    // Internals (caller holds the slot lock)
    // ═══════════════════════════════════════════

    fn fire_regular(
        &self,
        slot: SlotKey,
        trigger_instant: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<(), ReminderError> {
        let Some(schedule) = self.active_schedule(&slot)? else {
            tracing::debug!(slot = %slot, "Regular trigger for unscheduled slot ignored");
            return Ok(());
        };

        if self.registry.cancel(&slot.timer(TimerPurpose::Snooze))? {
            tracing::debug!(slot = %slot, "Regular occurrence replaces pending snooze");
        }

        let occurrence = OccurrenceKey::new(slot, trigger_instant);
        let fired = self
            .machine
            .fire(occurrence, trigger_instant, &schedule.name, schedule.criticality, now)
            .and_then(|effects| self.apply(effects, now));
        let following = self.schedule_following(&schedule, slot, trigger_instant, now);

        fired.and(following.map(|_| ()))
    }

    fn fire_snooze(
        &self,
        occurrence: OccurrenceKey,
        scheduled_at: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<(), ReminderError> {
        let Some(schedule) = self.active_schedule(&occurrence.slot())? else {
            tracing::debug!(slot = %occurrence.slot(), "Snooze for unscheduled slot ignored");
            return Ok(());
        };
        let effects = self
            .machine
            .fire(occurrence, scheduled_at, &schedule.name, schedule.criticality, now)?;
        self.apply(effects, now)
    }

    /// Register the occurrence after `trigger_instant`. If that is already in
    /// the past (late callback, clock jump), re-derive from `now`.
    fn schedule_following(
        &self,
        schedule: &MedicineSchedule,
        slot: SlotKey,
        trigger_instant: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Option<NaiveDateTime>, ReminderError> {
        let next = recurrence::next_trigger(schedule, slot.time_of_day, trigger_instant, false)?;
        match next {
            Some(at) if at <= now => self.schedule_regular(schedule, slot, now, true),
            _ => self.register_regular(slot, next),
        }
    }

    fn schedule_regular(
        &self,
        schedule: &MedicineSchedule,
        slot: SlotKey,
        after: NaiveDateTime,
        is_first_computation: bool,
    ) -> Result<Option<NaiveDateTime>, ReminderError> {
        let next = recurrence::next_trigger(schedule, slot.time_of_day, after, is_first_computation)?;
        self.register_regular(slot, next)
    }

    fn register_regular(
        &self,
        slot: SlotKey,
        next: Option<NaiveDateTime>,
    ) -> Result<Option<NaiveDateTime>, ReminderError> {
        let key = slot.timer(TimerPurpose::Regular);
        match next {
            Some(at) => {
                self.registry.register(key, at, at)?;
                Ok(Some(at))
            }
            None => {
                if self.registry.cancel(&key)? {
                    tracing::info!(slot = %slot, "No further occurrences, schedule finished");
                }
                Ok(None)
            }
        }
    }

    /// After a terminal transition the slot must still have its regular timer.
    fn ensure_regular(&self, slot: SlotKey, now: NaiveDateTime) -> Result<(), ReminderError> {
        if self.registry.instant_of(&slot.timer(TimerPurpose::Regular))?.is_some() {
            return Ok(());
        }
        let Some(schedule) = self.active_schedule(&slot)? else {
            return Ok(());
        };
        self.schedule_regular(&schedule, slot, now, true).map(|_| ())
    }

    fn apply(&self, effects: Vec<Effect>, now: NaiveDateTime) -> Result<(), ReminderError> {
        let mut first_error = None;

        for effect in effects {
            let result = match effect {
                Effect::Deliver(notification) => {
                    tracing::info!(
                        medicine_id = %notification.medicine_id,
                        time_of_day = %notification.time_of_day,
                        level = notification.level,
                        criticality = %notification.criticality,
                        "Delivering reminder"
                    );
                    self.notifications.deliver(&notification);
                    Ok(())
                }
                Effect::Register { key, at, occurrence } => self.registry.register(key, at, occurrence),
                Effect::Cancel(key) => self.registry.cancel(&key).map(|_| ()),
                Effect::Outcome(event) => {
                    tracing::info!(
                        medicine_id = %event.occurrence().medicine_id,
                        trigger = %event.occurrence().trigger_instant,
                        outcome = ?event,
                        "Occurrence resolved"
                    );
                    self.outcomes.emit(&event);
                    Ok(())
                }
                Effect::RecordSnooze { medicine_id, minutes } => {
                    self.learner.record_snooze(medicine_id, minutes).map(|_| ())
                }
                Effect::RecordDelay { medicine_id, minutes } => {
                    self.learner.record_delay(medicine_id, minutes).map(|_| ())
                }
                Effect::Resolved(slot) => self.ensure_regular(slot, now),
            };

            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to apply reminder effect");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// The schedule a slot belongs to, if it is enabled, valid and still
    /// lists that time of day.
    fn active_schedule(&self, slot: &SlotKey) -> Result<Option<MedicineSchedule>, ReminderError> {
        let catalog = self.catalog.read().map_err(|_| ReminderError::LockPoisoned)?;
        Ok(catalog
            .get(&slot.medicine_id)
            .filter(|s| s.enabled && s.times_of_day.contains(&slot.time_of_day))
            .filter(|s| recurrence::validate_schedule(s).is_ok())
            .cloned())
    }

    /// Cancel every timer and pending occurrence of a medicine, slot by slot.
    /// `schedule` is the medicine's last known schedule, if any. Pending
    /// occurrences are dropped silently.
    fn clear_medicine(
        &self,
        medicine_id: &Uuid,
        schedule: Option<&MedicineSchedule>,
    ) -> Result<usize, ReminderError> {
        let mut slots: BTreeSet<SlotKey> = self
            .registry
            .keys_for(medicine_id)?
            .into_iter()
            .map(|k| k.slot())
            .collect();
        slots.extend(self.machine.pending_slots(medicine_id)?);
        if let Some(schedule) = schedule {
            slots.extend(schedule.times_of_day.iter().map(|t| SlotKey::new(*medicine_id, *t)));
        }

        let mut cancelled = 0;
        for slot in slots {
            let (count, dropped) = self.slot_locks.with_slot(slot, || self.clear_slot(slot))?;
            if let Some(dropped) = dropped {
                tracing::debug!(slot = %slot, trigger = %dropped.trigger_instant, "Pending occurrence discarded");
            }
            cancelled += count;
        }
        Ok(cancelled)
    }

    /// Cancel every timer of a slot and forget its pending occurrence.
    /// Returns the cancelled count and the discarded occurrence.
    fn clear_slot(&self, slot: SlotKey) -> Result<(usize, Option<OccurrenceKey>), ReminderError> {
        let mut cancelled = 0;
        for purpose in TimerPurpose::ALL {
            if self.registry.cancel(&slot.timer(purpose))? {
                cancelled += 1;
            }
        }
        Ok((cancelled, self.machine.discard_slot(&slot)?))
    }

    /// Cancel timers of slots whose time of day left the schedule. A pending
    /// occurrence on such a slot can never be acknowledged and is reported
    /// as expired.
    fn drop_removed_slots(&self, schedule: &MedicineSchedule) -> Result<(), ReminderError> {
        let mut stale: BTreeSet<SlotKey> = self
            .registry
            .keys_for(&schedule.id)?
            .into_iter()
            .map(|k| k.slot())
            .collect();
        stale.extend(self.machine.pending_slots(&schedule.id)?);
        stale.retain(|slot| !schedule.times_of_day.contains(&slot.time_of_day));

        for slot in stale {
            let (_, dropped) = self.slot_locks.with_slot(slot, || self.clear_slot(slot))?;
            self.slot_locks.release_slot(&slot)?;
            tracing::info!(slot = %slot, "Time of day removed from schedule, timers cancelled");

            if let Some(dropped) = dropped {
                let event = OutcomeEvent::Expired {
                    medicine_id: dropped.medicine_id,
                    time_of_day: dropped.time_of_day,
                    trigger_instant: dropped.trigger_instant,
                };
                tracing::info!(
                    slot = %slot,
                    trigger = %dropped.trigger_instant,
                    "Pending occurrence of a removed time of day expired"
                );
                self.outcomes.emit(&event);
            }
        }
        Ok(())
    }
}
