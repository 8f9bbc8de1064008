use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Criticality, RecurrenceKind};
use crate::reminders::ScheduleError;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Wall-clock time of day, minute precision. Serialised as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::InvalidTimeOfDay { hour, minute });
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn minutes_since_midnight(&self) -> i64 {
        i64::from(self.hour) * 60 + i64::from(self.minute)
    }

    /// Build from a minute count, wrapping across midnight in both directions.
    pub fn from_minutes_wrapping(total: i64) -> Self {
        let wrapped = total.rem_euclid(MINUTES_PER_DAY);
        Self {
            hour: (wrapped / 60) as u8,
            minute: (wrapped % 60) as u8,
        }
    }

    /// Shift by a signed number of minutes, modulo 24 hours.
    pub fn shifted_by(&self, minutes: i64) -> Self {
        Self::from_minutes_wrapping(self.minutes_since_midnight() + minutes)
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::MIN + Duration::minutes(self.minutes_since_midnight())
    }

    /// The instant at this time of day on `date`.
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.to_naive_time())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ScheduleError::MalformedTimeOfDay(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(malformed)?;
        let hour: u8 = h.parse().map_err(|_| malformed())?;
        let minute: u8 = m.parse().map_err(|_| malformed())?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Immutable snapshot of one medicine's reminder configuration.
///
/// `interval_days` only matters for `EveryNDays`, `explicit_dates` only for
/// `SpecificDates`. Validation lives in `reminders::recurrence::validate_schedule`
/// so a malformed row can still be loaded and reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineSchedule {
    pub id: Uuid,
    pub name: String,
    pub times_of_day: BTreeSet<TimeOfDay>,
    pub recurrence: RecurrenceKind,
    pub interval_days: i32,
    pub explicit_dates: BTreeSet<NaiveDate>,
    pub anchor_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub enabled: bool,
    pub criticality: Criticality,
}

impl MedicineSchedule {
    /// Enabled, routine schedule with no times yet.
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        recurrence: RecurrenceKind,
        anchor_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            times_of_day: BTreeSet::new(),
            recurrence,
            interval_days: 1,
            explicit_dates: BTreeSet::new(),
            anchor_date,
            expiry_date: None,
            enabled: true,
            criticality: Criticality::Routine,
        }
    }

    pub fn with_times(mut self, times: impl IntoIterator<Item = TimeOfDay>) -> Self {
        self.times_of_day.extend(times);
        self
    }

    pub fn with_interval_days(mut self, days: i32) -> Self {
        self.interval_days = days;
        self
    }

    pub fn with_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.explicit_dates.extend(dates);
        self
    }

    pub fn with_expiry(mut self, expiry: NaiveDate) -> Self {
        self.expiry_date = Some(expiry);
        self
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
