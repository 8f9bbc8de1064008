use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

/// Insert or replace a schedule together with its times and explicit dates.
pub fn save_schedule(conn: &Connection, schedule: &MedicineSchedule) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let id = schedule.id.to_string();

    tx.execute(
        "INSERT INTO reminder_schedules (id, name, recurrence, interval_days, anchor_date,
         expiry_date, enabled, criticality, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
         ON CONFLICT(id) DO UPDATE SET
            name = ?2, recurrence = ?3, interval_days = ?4, anchor_date = ?5,
            expiry_date = ?6, enabled = ?7, criticality = ?8, updated_at = datetime('now')",
        params![
            id,
            schedule.name,
            schedule.recurrence.as_str(),
            schedule.interval_days,
            schedule.anchor_date.to_string(),
            schedule.expiry_date.map(|d| d.to_string()),
            schedule.enabled as i32,
            schedule.criticality.as_str(),
        ],
    )?;

    tx.execute("DELETE FROM reminder_times WHERE schedule_id = ?1", params![id])?;
    for time in &schedule.times_of_day {
        tx.execute(
            "INSERT INTO reminder_times (schedule_id, time_of_day) VALUES (?1, ?2)",
            params![id, time.to_string()],
        )?;
    }

    tx.execute("DELETE FROM reminder_dates WHERE schedule_id = ?1", params![id])?;
    for date in &schedule.explicit_dates {
        tx.execute(
            "INSERT INTO reminder_dates (schedule_id, date) VALUES (?1, ?2)",
            params![id, date.to_string()],
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// Load every schedule, enabled or not, ordered by name.
pub fn fetch_schedules(conn: &Connection) -> Result<Vec<MedicineSchedule>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, recurrence, interval_days, anchor_date, expiry_date, enabled, criticality
         FROM reminder_schedules
         ORDER BY name ASC, id ASC",
    )?;
    let rows = stmt
        .query_map([], schedule_row_from_rusqlite)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|row| schedule_from_row(conn, row))
        .collect()
}

pub fn get_schedule(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<MedicineSchedule>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, recurrence, interval_days, anchor_date, expiry_date, enabled, criticality
         FROM reminder_schedules WHERE id = ?1",
        params![id.to_string()],
        schedule_row_from_rusqlite,
    );

    match result {
        Ok(row) => Ok(Some(schedule_from_row(conn, row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e)),
    }
}

pub fn set_schedule_enabled(
    conn: &Connection,
    id: &Uuid,
    enabled: bool,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE reminder_schedules SET enabled = ?2, updated_at = datetime('now') WHERE id = ?1",
        params![id.to_string(), enabled as i32],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ReminderSchedule".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Delete a schedule; times and dates cascade.
pub fn delete_schedule(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM reminder_schedules WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ReminderSchedule".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

struct ScheduleRow {
    id: String,
    name: String,
    recurrence: String,
    interval_days: i32,
    anchor_date: String,
    expiry_date: Option<String>,
    enabled: i32,
    criticality: String,
}

fn schedule_row_from_rusqlite(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleRow> {
    Ok(ScheduleRow {
        id: row.get(0)?,
        name: row.get(1)?,
        recurrence: row.get(2)?,
        interval_days: row.get(3)?,
        anchor_date: row.get(4)?,
        expiry_date: row.get(5)?,
        enabled: row.get(6)?,
        criticality: row.get(7)?,
    })
}

fn schedule_from_row(conn: &Connection, row: ScheduleRow) -> Result<MedicineSchedule, DatabaseError> {
    let id = Uuid::parse_str(&row.id)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    Ok(MedicineSchedule {
        id,
        name: row.name,
        times_of_day: load_times(conn, &row.id)?,
        recurrence: RecurrenceKind::from_str(&row.recurrence)?,
        interval_days: row.interval_days,
        explicit_dates: load_dates(conn, &row.id)?,
        anchor_date: parse_date(&row.anchor_date)?,
        expiry_date: row.expiry_date.as_deref().map(parse_date).transpose()?,
        enabled: row.enabled != 0,
        criticality: Criticality::from_str(&row.criticality)?,
    })
}

fn load_times(conn: &Connection, schedule_id: &str) -> Result<BTreeSet<TimeOfDay>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT time_of_day FROM reminder_times WHERE schedule_id = ?1 ORDER BY time_of_day",
    )?;
    let raw = stmt
        .query_map(params![schedule_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    raw.iter()
        .map(|s| {
            TimeOfDay::from_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
        })
        .collect()
}

fn load_dates(conn: &Connection, schedule_id: &str) -> Result<BTreeSet<NaiveDate>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT date FROM reminder_dates WHERE schedule_id = ?1 ORDER BY date")?;
    let raw = stmt
        .query_map(params![schedule_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    raw.iter().map(|s| parse_date(s)).collect()
}

fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad date '{s}': {e}")))
}
