//! Recurrence calculator: schedule + "now" → next trigger instant.
//!
//! Pure and deterministic. Every periodic kind is "every N days counted from
//! the anchor date" (daily = 1, every other day = 2, weekly = 7); specific
//! dates walk the explicit date set. Dates before the anchor never qualify.

use chrono::{Days, NaiveDate, NaiveDateTime};

use super::error::ScheduleError;
use crate::models::{MedicineSchedule, RecurrenceKind, TimeOfDay};

/// Check the configuration rules a schedule must meet before any timer exists.
pub fn validate_schedule(schedule: &MedicineSchedule) -> Result<(), ScheduleError> {
    if schedule.recurrence == RecurrenceKind::EveryNDays && schedule.interval_days <= 0 {
        return Err(ScheduleError::InvalidInterval(schedule.interval_days));
    }
    if schedule.enabled && schedule.times_of_day.is_empty() {
        return Err(ScheduleError::NoTimesOfDay);
    }
    if let Some(expiry) = schedule.expiry_date {
        if expiry < schedule.anchor_date {
            return Err(ScheduleError::ExpiryBeforeAnchor {
                anchor: schedule.anchor_date,
                expiry,
            });
        }
    }
    Ok(())
}

/// Next trigger instant for one time-of-day slot.
///
/// The search starts at `after`'s date on a first computation and at the
/// following date otherwise. On a first computation a candidate at or before
/// `after` is skipped, so a past trigger is never returned. `None` once the
/// next qualifying date is past the expiry date, or when no explicit date
/// remains.
pub fn next_trigger(
    schedule: &MedicineSchedule,
    time_of_day: TimeOfDay,
    after: NaiveDateTime,
    is_first_computation: bool,
) -> Result<Option<NaiveDateTime>, ScheduleError> {
    let period = period_days(schedule)?;

    let threshold = if is_first_computation {
        Some(after.date())
    } else {
        after.date().succ_opt()
    };
    let Some(threshold) = threshold else {
        return Ok(None);
    };

    let Some(date) = qualifying_date_from(schedule, period, threshold) else {
        return Ok(None);
    };
    let mut candidate = time_of_day.on(date);

    if is_first_computation && candidate <= after {
        let next = date
            .succ_opt()
            .and_then(|d| qualifying_date_from(schedule, period, d));
        match next {
            Some(next) => candidate = time_of_day.on(next),
            None => return Ok(None),
        }
    }

    Ok(Some(candidate))
}

/// The next `count` triggers for a slot, starting after `after`.
pub fn upcoming_triggers(
    schedule: &MedicineSchedule,
    time_of_day: TimeOfDay,
    after: NaiveDateTime,
    count: usize,
) -> Result<Vec<NaiveDateTime>, ScheduleError> {
    let mut triggers = Vec::with_capacity(count);
    let mut cursor = after;
    let mut first = true;
    while triggers.len() < count {
        match next_trigger(schedule, time_of_day, cursor, first)? {
            Some(at) => {
                triggers.push(at);
                cursor = at;
                first = false;
            }
            None => break,
        }
    }
    Ok(triggers)
}

/// Day period for periodic kinds, `None` for explicit dates.
fn period_days(schedule: &MedicineSchedule) -> Result<Option<u64>, ScheduleError> {
    let period = match schedule.recurrence {
        RecurrenceKind::Daily => 1,
        RecurrenceKind::EveryOtherDay => 2,
        RecurrenceKind::Weekly => 7,
        RecurrenceKind::EveryNDays => {
            if schedule.interval_days <= 0 {
                return Err(ScheduleError::InvalidInterval(schedule.interval_days));
            }
            schedule.interval_days as u64
        }
        RecurrenceKind::SpecificDates => return Ok(None),
    };
    Ok(Some(period))
}

/// Earliest qualifying date ≥ `from`, bounded by the expiry date.
fn qualifying_date_from(
    schedule: &MedicineSchedule,
    period: Option<u64>,
    from: NaiveDate,
) -> Option<NaiveDate> {
    let from = from.max(schedule.anchor_date);

    let date = match period {
        Some(period) => {
            let offset = (from - schedule.anchor_date).num_days() as u64;
            let remainder = offset % period;
            if remainder == 0 {
                from
            } else {
                from.checked_add_days(Days::new(period - remainder))?
            }
        }
        None => *schedule.explicit_dates.range(from..).next()?,
    };

    match schedule.expiry_date {
        Some(expiry) if date > expiry => None,
        _ => Some(date),
    }
}
