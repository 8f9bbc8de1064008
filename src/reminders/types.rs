//! Core types for the reminder engine.
//!
//! These types model the occurrence lifecycle:
//! Schedule → Timer registration → Fired occurrence → Escalation → Outcome.
//! All instants are local wall-clock `NaiveDateTime` values.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ReminderError;
use crate::models::{AckOutcome, Criticality, TimeOfDay};

/// Highest escalation level an occurrence can reach.
pub const MAX_ESCALATION_LEVEL: u8 = 3;

// ═══════════════════════════════════════════
// Keys
// ═══════════════════════════════════════════

/// One (medicine, time-of-day) schedule track. At most one occurrence is
/// pending per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub medicine_id: Uuid,
    pub time_of_day: TimeOfDay,
}

impl SlotKey {
    pub fn new(medicine_id: Uuid, time_of_day: TimeOfDay) -> Self {
        Self {
            medicine_id,
            time_of_day,
        }
    }

    pub fn timer(&self, purpose: TimerPurpose) -> TimerKey {
        TimerKey {
            medicine_id: self.medicine_id,
            time_of_day: self.time_of_day,
            purpose,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.medicine_id, self.time_of_day)
    }
}

/// Identity of one concrete occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OccurrenceKey {
    pub medicine_id: Uuid,
    pub time_of_day: TimeOfDay,
    pub trigger_instant: NaiveDateTime,
}

impl OccurrenceKey {
    pub fn new(slot: SlotKey, trigger_instant: NaiveDateTime) -> Self {
        Self {
            medicine_id: slot.medicine_id,
            time_of_day: slot.time_of_day,
            trigger_instant,
        }
    }

    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.medicine_id, self.time_of_day)
    }
}

/// Why a timer exists. Part of the registration identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimerPurpose {
    Regular,
    #[serde(rename = "escalation-1")]
    Escalation1,
    #[serde(rename = "escalation-2")]
    Escalation2,
    #[serde(rename = "escalation-3")]
    Escalation3,
    Snooze,
    Expiry,
}

impl TimerPurpose {
    pub const ALL: [TimerPurpose; 6] = [
        Self::Regular,
        Self::Escalation1,
        Self::Escalation2,
        Self::Escalation3,
        Self::Snooze,
        Self::Expiry,
    ];

    /// Timers that belong to a pending occurrence and die with it.
    pub const OCCURRENCE_BOUND: [TimerPurpose; 4] = [
        Self::Escalation1,
        Self::Escalation2,
        Self::Escalation3,
        Self::Expiry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Escalation1 => "escalation-1",
            Self::Escalation2 => "escalation-2",
            Self::Escalation3 => "escalation-3",
            Self::Snooze => "snooze",
            Self::Expiry => "expiry",
        }
    }

    pub fn for_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Escalation1),
            2 => Some(Self::Escalation2),
            3 => Some(Self::Escalation3),
            _ => None,
        }
    }

    pub fn escalation_level(&self) -> Option<u8> {
        match self {
            Self::Escalation1 => Some(1),
            Self::Escalation2 => Some(2),
            Self::Escalation3 => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for TimerPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable registration identity: registering under an existing key replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerKey {
    pub medicine_id: Uuid,
    pub time_of_day: TimeOfDay,
    pub purpose: TimerPurpose,
}

impl TimerKey {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.medicine_id, self.time_of_day)
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.medicine_id, self.time_of_day, self.purpose)
    }
}

/// What the timer facility hands back when a registration fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerPayload {
    pub key: TimerKey,
    /// Trigger instant of the occurrence this timer belongs to. For a snooze,
    /// the scheduled instant the snoozed occurrence descends from.
    pub occurrence: NaiveDateTime,
    /// Registration generation; a mismatch means the timer was replaced.
    pub generation: u64,
}

// ═══════════════════════════════════════════
// User actions & outcomes
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserAction {
    Taken,
    Skipped,
    Snooze { minutes: u32 },
}

/// One event per terminal transition, for streak/logging consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutcomeEvent {
    Acknowledged {
        medicine_id: Uuid,
        time_of_day: TimeOfDay,
        trigger_instant: NaiveDateTime,
        outcome: AckOutcome,
        acted_at: NaiveDateTime,
    },
    /// Missed dose.
    Expired {
        medicine_id: Uuid,
        time_of_day: TimeOfDay,
        trigger_instant: NaiveDateTime,
    },
}

impl OutcomeEvent {
    pub fn occurrence(&self) -> OccurrenceKey {
        match self {
            Self::Acknowledged {
                medicine_id,
                time_of_day,
                trigger_instant,
                ..
            }
            | Self::Expired {
                medicine_id,
                time_of_day,
                trigger_instant,
            } => OccurrenceKey {
                medicine_id: *medicine_id,
                time_of_day: *time_of_day,
                trigger_instant: *trigger_instant,
            },
        }
    }
}

// ═══════════════════════════════════════════
// Notification payload
// ═══════════════════════════════════════════

/// Delivery channel, from quiet to intrusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Standard,
    Elevated,
    Alarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccentColor {
    Neutral,
    Amber,
    Orange,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VibrationPattern {
    Short,
    Double,
    Long,
    Continuous,
}

/// How intrusive a delivery should be. Rendering is up to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Urgency {
    pub channel: NotificationChannel,
    pub color: AccentColor,
    pub vibration: VibrationPattern,
    /// Deliver even when the device is in do-not-disturb.
    pub bypass_dnd: bool,
}

/// One delivery request: sent on every transition into a pending level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderNotification {
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub time_of_day: TimeOfDay,
    pub occurrence: NaiveDateTime,
    pub level: u8,
    pub criticality: Criticality,
    pub urgency: Urgency,
}

// ═══════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════

/// Tunable engine constants. Defaults match the long-standing fixed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Minutes after the initial fire at which levels 1, 2 and 3 are delivered.
    pub escalation_offsets_minutes: [u32; 3],
    /// Mean acknowledgment delay at which a schedule shift is suggested.
    pub shift_threshold_minutes: u32,
    /// Samples kept per medicine per history kind.
    pub history_capacity: usize,
    /// Upper bound on the wait between level 3 and expiry.
    pub expiry_grace_minutes: u32,
    /// Longest snooze accepted from the user.
    pub max_snooze_minutes: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            escalation_offsets_minutes: [10, 30, 60],
            shift_threshold_minutes: 30,
            history_capacity: 5,
            expiry_grace_minutes: 60,
            max_snooze_minutes: 12 * 60,
        }
    }
}

impl ReminderConfig {
    pub fn validate(&self) -> Result<(), ReminderError> {
        let [first, second, third] = self.escalation_offsets_minutes;
        if first == 0 || first >= second || second >= third {
            return Err(ReminderError::Config(format!(
                "escalation offsets must be positive and strictly increasing, got {:?}",
                self.escalation_offsets_minutes
            )));
        }
        if self.history_capacity == 0 {
            return Err(ReminderError::Config("history_capacity must be at least 1".into()));
        }
        if self.expiry_grace_minutes == 0 {
            return Err(ReminderError::Config("expiry_grace_minutes must be at least 1".into()));
        }
        if self.max_snooze_minutes == 0 {
            return Err(ReminderError::Config("max_snooze_minutes must be at least 1".into()));
        }
        Ok(())
    }

    /// Offset for an escalation level (1..=3).
    pub fn escalation_offset(&self, level: u8) -> Option<u32> {
        match level {
            1..=MAX_ESCALATION_LEVEL => Some(self.escalation_offsets_minutes[usize::from(level) - 1]),
            _ => None,
        }
    }
}
