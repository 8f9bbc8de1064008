//! Escalation state machine for fired occurrences.
//!
//! ```text
//! fire ─▶ PENDING(0) ─esc-1─▶ PENDING(1) ─esc-2─▶ PENDING(2) ─esc-3─▶ PENDING(3) ─expiry─▶ EXPIRED
//!              │                   │                   │                   │
//!              └──── taken / skipped / snooze ─────────┴───────────────────┴──▶ ACKNOWLEDGED
//! ```
//!
//! The machine only tracks pending occurrences, one per slot. It never talks
//! to collaborators directly: every transition returns the effects the
//! scheduler must apply (deliveries, timer registrations and cancellations,
//! outcome events, learner records).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

use super::error::ReminderError;
use super::types::*;
use crate::models::{AckOutcome, Criticality};

/// One pending occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveOccurrence {
    pub key: OccurrenceKey,
    pub medicine_name: String,
    pub criticality: Criticality,
    pub level: u8,
    /// When level 0 was delivered. Escalation offsets count from here.
    pub fired_at: NaiveDateTime,
    /// The regular trigger this occurrence descends from. Equal to the key's
    /// trigger instant unless the occurrence was re-entered by a snooze.
    pub scheduled_at: NaiveDateTime,
}

/// Side effect of a transition, applied by the scheduler in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Deliver(ReminderNotification),
    /// `occurrence` goes into the payload: the pending trigger instant for
    /// escalation and expiry timers, the scheduled instant for a snooze.
    Register {
        key: TimerKey,
        at: NaiveDateTime,
        occurrence: NaiveDateTime,
    },
    Cancel(TimerKey),
    Outcome(OutcomeEvent),
    RecordSnooze { medicine_id: Uuid, minutes: i64 },
    RecordDelay { medicine_id: Uuid, minutes: i64 },
    /// The slot has no pending occurrence any more; its regular timer must exist.
    Resolved(SlotKey),
}

pub struct EscalationMachine {
    config: ReminderConfig,
    active: Mutex<HashMap<SlotKey, ActiveOccurrence>>,
}

impl EscalationMachine {
    pub fn new(config: ReminderConfig) -> Self {
        Self {
            config,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Enter PENDING(0) for `occurrence`, which descends from the regular
    /// trigger `scheduled_at`.
    ///
    /// The same occurrence firing twice is a no-op. A different occurrence
    /// still pending on the slot is superseded and reported as expired.
    pub fn fire(
        &self,
        occurrence: OccurrenceKey,
        scheduled_at: NaiveDateTime,
        medicine_name: &str,
        criticality: Criticality,
        now: NaiveDateTime,
    ) -> Result<Vec<Effect>, ReminderError> {
        let slot = occurrence.slot();
        let mut active = self.active.lock().map_err(|_| ReminderError::LockPoisoned)?;
        let mut effects = Vec::new();

        if let Some(previous) = active.get(&slot) {
            if previous.key == occurrence {
                tracing::debug!(slot = %slot, "Duplicate fire for pending occurrence ignored");
                return Ok(effects);
            }
            tracing::info!(
                slot = %slot,
                superseded = %previous.key.trigger_instant,
                "Pending occurrence superseded by a newer one"
            );
            cancel_occurrence_timers(slot, &mut effects);
            effects.push(Effect::Outcome(expired_event(&previous.key)));
        }

        let pending = ActiveOccurrence {
            key: occurrence,
            medicine_name: medicine_name.to_string(),
            criticality,
            level: 0,
            fired_at: now,
            scheduled_at,
        };
        effects.push(Effect::Deliver(notification(&pending)));

        for level in 1..=MAX_ESCALATION_LEVEL {
            if let (Some(purpose), Some(offset)) =
                (TimerPurpose::for_level(level), self.config.escalation_offset(level))
            {
                effects.push(Effect::Register {
                    key: slot.timer(purpose),
                    at: now + Duration::minutes(i64::from(offset)),
                    occurrence: occurrence.trigger_instant,
                });
            }
        }

        active.insert(slot, pending);
        Ok(effects)
    }

    /// Raise a pending occurrence to `target`.
    ///
    /// Reaching the top level arms the expiry timer at the earlier of the
    /// grace window and the slot's next regular trigger; if that moment has
    /// already passed the occurrence expires immediately.
    pub fn escalate(
        &self,
        occurrence: OccurrenceKey,
        target: u8,
        next_regular: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Result<Vec<Effect>, ReminderError> {
        let slot = occurrence.slot();
        let mut active = self.active.lock().map_err(|_| ReminderError::LockPoisoned)?;
        let mut effects = Vec::new();

        let Some(pending) = active.get_mut(&slot).filter(|p| p.key == occurrence) else {
            tracing::debug!(slot = %slot, level = target, "Escalation for stale occurrence ignored");
            return Ok(effects);
        };
        if target <= pending.level || target > MAX_ESCALATION_LEVEL {
            return Ok(effects);
        }

        pending.level = target;
        effects.push(Effect::Deliver(notification(pending)));

        if target == MAX_ESCALATION_LEVEL {
            let grace_end = now + Duration::minutes(i64::from(self.config.expiry_grace_minutes));
            let expires_at = match next_regular {
                Some(next) if next < grace_end => next,
                _ => grace_end,
            };
            if expires_at <= now {
                let expired = active.remove(&slot);
                if let Some(expired) = expired {
                    effects.extend(expiry_effects(&expired));
                }
            } else {
                effects.push(Effect::Register {
                    key: slot.timer(TimerPurpose::Expiry),
                    at: expires_at,
                    occurrence: occurrence.trigger_instant,
                });
            }
        }

        Ok(effects)
    }

    /// PENDING(n) → EXPIRED.
    pub fn expire(&self, occurrence: OccurrenceKey) -> Result<Vec<Effect>, ReminderError> {
        let slot = occurrence.slot();
        let mut active = self.active.lock().map_err(|_| ReminderError::LockPoisoned)?;
        match active.get(&slot) {
            Some(pending) if pending.key == occurrence => {}
            _ => {
                tracing::debug!(slot = %slot, "Expiry for stale occurrence ignored");
                return Ok(Vec::new());
            }
        }
        Ok(active
            .remove(&slot)
            .map(|expired| expiry_effects(&expired))
            .unwrap_or_default())
    }

    /// Apply a user action to the slot's pending occurrence.
    ///
    /// `occurrence` pins the action to one trigger instant; an action aimed
    /// at anything other than the pending occurrence is a no-op.
    pub fn act(
        &self,
        slot: SlotKey,
        occurrence: Option<NaiveDateTime>,
        action: UserAction,
        now: NaiveDateTime,
    ) -> Result<Vec<Effect>, ReminderError> {
        if let UserAction::Snooze { minutes } = action {
            if minutes == 0 || minutes > self.config.max_snooze_minutes {
                return Err(ReminderError::InvalidSnooze {
                    minutes,
                    max: self.config.max_snooze_minutes,
                });
            }
        }

        let mut active = self.active.lock().map_err(|_| ReminderError::LockPoisoned)?;
        let matches = active
            .get(&slot)
            .is_some_and(|p| occurrence.map_or(true, |at| p.key.trigger_instant == at));
        if !matches {
            tracing::debug!(slot = %slot, ?action, "Action on stale or unknown occurrence ignored");
            return Ok(Vec::new());
        }
        let Some(pending) = active.remove(&slot) else {
            return Ok(Vec::new());
        };

        let mut effects = Vec::new();
        cancel_occurrence_timers(slot, &mut effects);

        let outcome = match action {
            UserAction::Taken => {
                effects.push(Effect::RecordDelay {
                    medicine_id: slot.medicine_id,
                    minutes: (now - pending.scheduled_at).num_minutes(),
                });
                AckOutcome::Taken
            }
            UserAction::Skipped => AckOutcome::Skipped,
            UserAction::Snooze { minutes } => {
                let follow_up = now + Duration::minutes(i64::from(minutes));
                effects.push(Effect::RecordSnooze {
                    medicine_id: slot.medicine_id,
                    minutes: i64::from(minutes),
                });
                // The snooze payload carries the scheduled instant; the
                // follow-up occurrence is keyed by the instant it fires at.
                effects.push(Effect::Register {
                    key: slot.timer(TimerPurpose::Snooze),
                    at: follow_up,
                    occurrence: pending.scheduled_at,
                });
                AckOutcome::Snoozed
            }
        };

        effects.push(Effect::Outcome(OutcomeEvent::Acknowledged {
            medicine_id: slot.medicine_id,
            time_of_day: slot.time_of_day,
            trigger_instant: pending.key.trigger_instant,
            outcome,
            acted_at: now,
        }));
        effects.push(Effect::Resolved(slot));
        Ok(effects)
    }

    /// Forget the pending occurrence of one slot without emitting an outcome.
    pub fn discard_slot(&self, slot: &SlotKey) -> Result<Option<OccurrenceKey>, ReminderError> {
        let mut active = self.active.lock().map_err(|_| ReminderError::LockPoisoned)?;
        Ok(active.remove(slot).map(|p| p.key))
    }

    pub fn pending(&self, slot: &SlotKey) -> Result<Option<ActiveOccurrence>, ReminderError> {
        let active = self.active.lock().map_err(|_| ReminderError::LockPoisoned)?;
        Ok(active.get(slot).cloned())
    }

    pub fn pending_slots(&self, medicine_id: &Uuid) -> Result<Vec<SlotKey>, ReminderError> {
        let active = self.active.lock().map_err(|_| ReminderError::LockPoisoned)?;
        Ok(active
            .keys()
            .filter(|slot| &slot.medicine_id == medicine_id)
            .copied()
            .collect())
    }

    pub fn pending_count(&self) -> Result<usize, ReminderError> {
        Ok(self.active.lock().map_err(|_| ReminderError::LockPoisoned)?.len())
    }
}

/// Notification intensity for a criticality at an escalation level.
///
/// Colour tracks the level for everyone. Routine reminders never leave the
/// standard channel or bypass do-not-disturb; critical ones always bypass it.
pub fn urgency_for(criticality: Criticality, level: u8) -> Urgency {
    let color = match level {
        0 => AccentColor::Neutral,
        1 => AccentColor::Amber,
        2 => AccentColor::Orange,
        _ => AccentColor::Red,
    };

    let (channel, vibration, bypass_dnd) = match criticality {
        Criticality::Routine => (NotificationChannel::Standard, VibrationPattern::Short, false),
        Criticality::Important => match level {
            0 => (NotificationChannel::Standard, VibrationPattern::Short, false),
            1 | 2 => (NotificationChannel::Elevated, VibrationPattern::Double, false),
            _ => (NotificationChannel::Alarm, VibrationPattern::Long, true),
        },
        Criticality::Critical => match level {
            0 => (NotificationChannel::Elevated, VibrationPattern::Double, true),
            1 | 2 => (NotificationChannel::Alarm, VibrationPattern::Long, true),
            _ => (NotificationChannel::Alarm, VibrationPattern::Continuous, true),
        },
    };

    Urgency {
        channel,
        color,
        vibration,
        bypass_dnd,
    }
}

fn notification(pending: &ActiveOccurrence) -> ReminderNotification {
    ReminderNotification {
        medicine_id: pending.key.medicine_id,
        medicine_name: pending.medicine_name.clone(),
        time_of_day: pending.key.time_of_day,
        occurrence: pending.key.trigger_instant,
        level: pending.level,
        criticality: pending.criticality,
        urgency: urgency_for(pending.criticality, pending.level),
    }
}

fn cancel_occurrence_timers(slot: SlotKey, effects: &mut Vec<Effect>) {
    for purpose in TimerPurpose::OCCURRENCE_BOUND {
        effects.push(Effect::Cancel(slot.timer(purpose)));
    }
}

fn expired_event(key: &OccurrenceKey) -> OutcomeEvent {
    OutcomeEvent::Expired {
        medicine_id: key.medicine_id,
        time_of_day: key.time_of_day,
        trigger_instant: key.trigger_instant,
    }
}

fn expiry_effects(expired: &ActiveOccurrence) -> Vec<Effect> {
    let slot = expired.key.slot();
    let mut effects = Vec::new();
    cancel_occurrence_timers(slot, &mut effects);
    effects.push(Effect::Outcome(expired_event(&expired.key)));
    effects.push(Effect::Resolved(slot));
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::testing::{dt, tod};

    fn machine() -> EscalationMachine {
        EscalationMachine::new(ReminderConfig::default())
    }

    fn occurrence(id: Uuid, at: &str) -> OccurrenceKey {
        OccurrenceKey::new(SlotKey::new(id, tod(8, 0)), dt(at))
    }

    fn registers(effects: &[Effect]) -> Vec<(TimerPurpose, NaiveDateTime)> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Register { key, at, .. } => Some((key.purpose, *at)),
                _ => None,
            })
            .collect()
    }

    fn deliveries(effects: &[Effect]) -> Vec<u8> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Deliver(n) => Some(n.level),
                _ => None,
            })
            .collect()
    }

    fn outcomes(effects: &[Effect]) -> Vec<OutcomeEvent> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Outcome(o) => Some(o.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn fire_delivers_and_arms_escalations() {
        let m = machine();
        let occ = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        let effects = m.fire(occ, occ.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();

        assert_eq!(deliveries(&effects), vec![0]);
        assert_eq!(
            registers(&effects),
            vec![
                (TimerPurpose::Escalation1, dt("2026-01-10 08:10")),
                (TimerPurpose::Escalation2, dt("2026-01-10 08:30")),
                (TimerPurpose::Escalation3, dt("2026-01-10 09:00")),
            ]
        );
        assert_eq!(m.pending(&occ.slot()).unwrap().unwrap().level, 0);
    }

    #[test]
    fn duplicate_fire_is_noop() {
        let m = machine();
        let occ = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        m.fire(occ, occ.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();
        let again = m.fire(occ, occ.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-10 08:01")).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn newer_occurrence_supersedes_pending_one() {
        let m = machine();
        let id = Uuid::new_v4();
        let old = occurrence(id, "2026-01-10 08:00");
        let new = occurrence(id, "2026-01-11 08:00");
        m.fire(old, old.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();

        let effects = m.fire(new, new.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-11 08:00")).unwrap();
        assert_eq!(
            outcomes(&effects),
            vec![OutcomeEvent::Expired {
                medicine_id: id,
                time_of_day: tod(8, 0),
                trigger_instant: dt("2026-01-10 08:00"),
            }]
        );
        assert_eq!(deliveries(&effects), vec![0]);
        assert_eq!(m.pending(&new.slot()).unwrap().unwrap().key, new);
    }

    #[test]
    fn escalate_raises_level_once() {
        let m = machine();
        let occ = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        m.fire(occ, occ.trigger_instant, "Metformin", Criticality::Important, dt("2026-01-10 08:00")).unwrap();

        let effects = m.escalate(occ, 1, None, dt("2026-01-10 08:10")).unwrap();
        assert_eq!(deliveries(&effects), vec![1]);
        assert!(m.escalate(occ, 1, None, dt("2026-01-10 08:11")).unwrap().is_empty());
    }

    #[test]
    fn stale_escalation_ignored() {
        let m = machine();
        let occ = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        assert!(m.escalate(occ, 1, None, dt("2026-01-10 08:10")).unwrap().is_empty());
    }

    #[test]
    fn top_level_arms_expiry_at_grace_end() {
        let m = machine();
        let occ = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        m.fire(occ, occ.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();
        m.escalate(occ, 1, None, dt("2026-01-10 08:10")).unwrap();
        m.escalate(occ, 2, None, dt("2026-01-10 08:30")).unwrap();

        let next_regular = Some(dt("2026-01-11 08:00"));
        let effects = m.escalate(occ, 3, next_regular, dt("2026-01-10 09:00")).unwrap();
        assert_eq!(deliveries(&effects), vec![3]);
        assert_eq!(registers(&effects), vec![(TimerPurpose::Expiry, dt("2026-01-10 10:00"))]);
    }

    #[test]
    fn expiry_capped_by_next_regular_trigger() {
        let m = machine();
        let occ = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        m.fire(occ, occ.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();

        let next_regular = Some(dt("2026-01-10 09:20"));
        let effects = m.escalate(occ, 3, next_regular, dt("2026-01-10 09:00")).unwrap();
        assert_eq!(registers(&effects), vec![(TimerPurpose::Expiry, dt("2026-01-10 09:20"))]);
    }

    #[test]
    fn expiry_already_due_expires_immediately() {
        let m = machine();
        let occ = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        m.fire(occ, occ.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();

        let effects = m
            .escalate(occ, 3, Some(dt("2026-01-10 08:45")), dt("2026-01-10 09:00"))
            .unwrap();
        assert_eq!(outcomes(&effects).len(), 1);
        assert!(effects.contains(&Effect::Resolved(occ.slot())));
        assert!(m.pending(&occ.slot()).unwrap().is_none());
    }

    #[test]
    fn expire_emits_missed_and_resolves() {
        let m = machine();
        let occ = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        m.fire(occ, occ.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();

        let effects = m.expire(occ).unwrap();
        assert!(matches!(outcomes(&effects)[..], [OutcomeEvent::Expired { .. }]));
        assert!(effects.contains(&Effect::Resolved(occ.slot())));
        assert!(m.expire(occ).unwrap().is_empty());
    }

    #[test]
    fn taken_cancels_escalations_and_records_delay() {
        let m = machine();
        let occ = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        m.fire(occ, occ.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();
        m.escalate(occ, 1, None, dt("2026-01-10 08:10")).unwrap();

        let effects = m
            .act(occ.slot(), None, UserAction::Taken, dt("2026-01-10 08:12"))
            .unwrap();

        for purpose in TimerPurpose::OCCURRENCE_BOUND {
            assert!(effects.contains(&Effect::Cancel(occ.slot().timer(purpose))));
        }
        assert!(effects.contains(&Effect::RecordDelay {
            medicine_id: occ.medicine_id,
            minutes: 12,
        }));
        assert!(matches!(
            outcomes(&effects)[..],
            [OutcomeEvent::Acknowledged { outcome: AckOutcome::Taken, .. }]
        ));
        assert!(deliveries(&effects).is_empty());
    }

    #[test]
    fn snooze_registers_single_follow_up() {
        let m = machine();
        let occ = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        m.fire(occ, occ.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();

        let effects = m
            .act(occ.slot(), None, UserAction::Snooze { minutes: 15 }, dt("2026-01-10 08:02"))
            .unwrap();
        assert_eq!(registers(&effects), vec![(TimerPurpose::Snooze, dt("2026-01-10 08:17"))]);
        assert!(effects.contains(&Effect::RecordSnooze {
            medicine_id: occ.medicine_id,
            minutes: 15,
        }));
    }

    #[test]
    fn delay_after_snooze_counts_from_scheduled_trigger() {
        let m = machine();
        let occ = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        m.fire(occ, occ.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();

        let effects = m
            .act(occ.slot(), None, UserAction::Snooze { minutes: 40 }, dt("2026-01-10 08:00"))
            .unwrap();
        assert!(effects.contains(&Effect::Register {
            key: occ.slot().timer(TimerPurpose::Snooze),
            at: dt("2026-01-10 08:40"),
            occurrence: dt("2026-01-10 08:00"),
        }));

        let follow_up = OccurrenceKey::new(occ.slot(), dt("2026-01-10 08:40"));
        m.fire(follow_up, dt("2026-01-10 08:00"), "Metformin", Criticality::Routine, dt("2026-01-10 08:40"))
            .unwrap();
        let effects = m
            .act(occ.slot(), None, UserAction::Taken, dt("2026-01-10 08:41"))
            .unwrap();
        assert!(effects.contains(&Effect::RecordDelay {
            medicine_id: occ.medicine_id,
            minutes: 41,
        }));
    }

    #[test]
    fn invalid_snooze_rejected() {
        let m = machine();
        let slot = SlotKey::new(Uuid::new_v4(), tod(8, 0));
        assert!(matches!(
            m.act(slot, None, UserAction::Snooze { minutes: 0 }, dt("2026-01-10 08:00")),
            Err(ReminderError::InvalidSnooze { .. })
        ));
        assert!(m
            .act(slot, None, UserAction::Snooze { minutes: 721 }, dt("2026-01-10 08:00"))
            .is_err());
    }

    #[test]
    fn action_on_wrong_occurrence_is_noop() {
        let m = machine();
        let occ = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        m.fire(occ, occ.trigger_instant, "Metformin", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();

        let effects = m
            .act(occ.slot(), Some(dt("2026-01-09 08:00")), UserAction::Taken, dt("2026-01-10 08:05"))
            .unwrap();
        assert!(effects.is_empty());
        assert!(m.pending(&occ.slot()).unwrap().is_some());

        let unknown = SlotKey::new(Uuid::new_v4(), tod(9, 0));
        assert!(m.act(unknown, None, UserAction::Skipped, dt("2026-01-10 08:05")).unwrap().is_empty());
    }

    #[test]
    fn discard_slot_drops_silently() {
        let m = machine();
        let a = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        let b = occurrence(Uuid::new_v4(), "2026-01-10 08:00");
        m.fire(a, a.trigger_instant, "A", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();
        m.fire(b, b.trigger_instant, "B", Criticality::Routine, dt("2026-01-10 08:00")).unwrap();

        assert_eq!(m.pending_slots(&a.medicine_id).unwrap(), vec![a.slot()]);
        assert_eq!(m.discard_slot(&a.slot()).unwrap(), Some(a));
        assert_eq!(m.discard_slot(&a.slot()).unwrap(), None);
        assert_eq!(m.pending_count().unwrap(), 1);
    }

    #[test]
    fn urgency_matrix() {
        for level in 0..=3 {
            let routine = urgency_for(Criticality::Routine, level);
            assert!(!routine.bypass_dnd);
            assert_eq!(routine.channel, NotificationChannel::Standard);

            assert!(urgency_for(Criticality::Critical, level).bypass_dnd);
        }
        assert_eq!(urgency_for(Criticality::Routine, 3).color, AccentColor::Red);
        assert!(!urgency_for(Criticality::Important, 2).bypass_dnd);
        assert!(urgency_for(Criticality::Important, 3).bypass_dnd);
        assert_eq!(
            urgency_for(Criticality::Important, 3).channel,
            NotificationChannel::Alarm
        );
    }
}
