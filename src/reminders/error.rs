//! Error types for the reminder engine.
//!
//! Split by concern so callers can tell a bad schedule (fail closed for that
//! medicine) from an unavailable timer capability (skip and retry on the next
//! rebuild) from an engine-level failure.

use chrono::NaiveDate;
use thiserror::Error;

use crate::db::DatabaseError;

/// Configuration problems in a single medicine schedule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid time of day {hour:02}:{minute:02}")]
    InvalidTimeOfDay { hour: u8, minute: u8 },

    #[error("Malformed time of day: {0}")]
    MalformedTimeOfDay(String),

    #[error("Every-N-days schedule needs interval_days > 0, got {0}")]
    InvalidInterval(i32),

    #[error("Enabled schedule has no times of day")]
    NoTimesOfDay,

    #[error("Expiry date {expiry} is before anchor date {anchor}")]
    ExpiryBeforeAnchor { anchor: NaiveDate, expiry: NaiveDate },
}

/// The external timer facility refused or could not take a registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("Timer facility unavailable: {0}")]
    Unavailable(String),

    #[error("Timer facility has shut down")]
    Closed,
}

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Snooze must be between 1 and {max} minutes, got {minutes}")]
    InvalidSnooze { minutes: u32, max: u32 },

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine channel closed")]
    ChannelClosed,

    #[error("Internal lock error")]
    LockPoisoned,
}
