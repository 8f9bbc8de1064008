use std::collections::BTreeMap;
use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{HistoryKind, HistoryRecord};

/// Replace the stored buffer for each record's (medicine, kind) pair.
///
/// All records are written in one transaction; an empty `values` list
/// clears the stored buffer.
pub fn replace_history(conn: &Connection, records: &[HistoryRecord]) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    for record in records {
        let id = record.medicine_id.to_string();
        tx.execute(
            "DELETE FROM history_samples WHERE medicine_id = ?1 AND kind = ?2",
            params![id, record.kind.as_str()],
        )?;
        for (position, minutes) in record.values.iter().enumerate() {
            tx.execute(
                "INSERT INTO history_samples (medicine_id, kind, position, minutes)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, record.kind.as_str(), position as i64, minutes],
            )?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Load every stored buffer, grouped per (medicine, kind), oldest sample first.
pub fn fetch_all_history(conn: &Connection) -> Result<Vec<HistoryRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT medicine_id, kind, minutes FROM history_samples
         ORDER BY medicine_id ASC, kind ASC, position ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut grouped: BTreeMap<(Uuid, HistoryKind), Vec<u32>> = BTreeMap::new();
    for (medicine_id, kind, minutes) in rows {
        let medicine_id = Uuid::parse_str(&medicine_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
        let kind = HistoryKind::from_str(&kind)?;
        grouped.entry((medicine_id, kind)).or_default().push(minutes);
    }

    Ok(grouped
        .into_iter()
        .map(|((medicine_id, kind), values)| HistoryRecord {
            medicine_id,
            kind,
            values,
        })
        .collect())
}

/// Drop all stored samples for a medicine.
pub fn delete_history(conn: &Connection, medicine_id: &Uuid) -> Result<usize, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM history_samples WHERE medicine_id = ?1",
        params![medicine_id.to_string()],
    )?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn record(id: Uuid, kind: HistoryKind, values: &[u32]) -> HistoryRecord {
        HistoryRecord {
            medicine_id: id,
            kind,
            values: values.to_vec(),
        }
    }

    #[test]
    fn replace_then_fetch_preserves_order() {
        let conn = open_memory_database().unwrap();
        let id = Uuid::new_v4();
        replace_history(&conn, &[record(id, HistoryKind::Snooze, &[10, 20, 10])]).unwrap();

        let all = fetch_all_history(&conn).unwrap();
        assert_eq!(all, vec![record(id, HistoryKind::Snooze, &[10, 20, 10])]);
    }

    #[test]
    fn replace_overwrites_previous_buffer() {
        let conn = open_memory_database().unwrap();
        let id = Uuid::new_v4();
        replace_history(&conn, &[record(id, HistoryKind::Delay, &[40, 50])]).unwrap();
        replace_history(&conn, &[record(id, HistoryKind::Delay, &[50, 60, 35])]).unwrap();

        let all = fetch_all_history(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].values, vec![50, 60, 35]);
    }

    #[test]
    fn kinds_are_stored_separately() {
        let conn = open_memory_database().unwrap();
        let id = Uuid::new_v4();
        replace_history(
            &conn,
            &[
                record(id, HistoryKind::Snooze, &[5]),
                record(id, HistoryKind::Delay, &[45]),
            ],
        )
        .unwrap();

        let all = fetch_all_history(&conn).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn delete_only_touches_one_medicine() {
        let conn = open_memory_database().unwrap();
        let keep = Uuid::new_v4();
        let gone = Uuid::new_v4();
        replace_history(
            &conn,
            &[
                record(keep, HistoryKind::Snooze, &[10]),
                record(gone, HistoryKind::Snooze, &[15, 15]),
            ],
        )
        .unwrap();

        assert_eq!(delete_history(&conn, &gone).unwrap(), 2);
        let all = fetch_all_history(&conn).unwrap();
        assert_eq!(all, vec![record(keep, HistoryKind::Snooze, &[10])]);
    }

    #[test]
    fn non_positive_minutes_rejected_by_schema() {
        let conn = open_memory_database().unwrap();
        let result = replace_history(&conn, &[record(Uuid::new_v4(), HistoryKind::Delay, &[0])]);
        assert!(result.is_err());
    }
}
