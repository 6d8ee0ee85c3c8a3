//! Dose log model
//!
//! One row per confirm / snooze / missed event. Rows are never edited; undo
//! deletes the most recently inserted row for a (medication, date) pair.
//! Nothing stops duplicate rows for the same pair.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::TimeOfDay;
use crate::db::{DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
    #[default]
    Pending,
    Taken,
    Missed,
    Snoozed,
}

impl DoseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseStatus::Pending => "pending",
            DoseStatus::Taken => "taken",
            DoseStatus::Missed => "missed",
            DoseStatus::Snoozed => "snoozed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(DoseStatus::Pending),
            "taken" => Some(DoseStatus::Taken),
            "missed" => Some(DoseStatus::Missed),
            "snoozed" => Some(DoseStatus::Snoozed),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DoseStatus::Pending => "Pending",
            DoseStatus::Taken => "Taken",
            DoseStatus::Missed => "Missed",
            DoseStatus::Snoozed => "Snoozed",
        }
    }
}

/// A dose log entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoseLog {
    pub id: i64,
    pub medication_id: i64,
    /// Name at the time of logging
    pub medication_name: String,
    pub scheduled_time: TimeOfDay,
    pub taken_time: Option<NaiveDateTime>,
    pub status: DoseStatus,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

/// Data for a new dose log entry
#[derive(Debug, Clone)]
pub struct DoseLogCreate {
    pub medication_id: i64,
    pub medication_name: String,
    pub scheduled_time: TimeOfDay,
    pub status: DoseStatus,
    pub notes: Option<String>,
}

/// Taken / missed counts over a period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdherenceStats {
    pub taken: i64,
    pub missed: i64,
    pub snoozed: i64,
    pub total: i64,
    /// Percentage of logged events that are `taken`; 100 when nothing is logged
    pub compliance: i64,
}

impl AdherenceStats {
    fn from_counts(taken: i64, missed: i64, snoozed: i64, total: i64) -> Self {
        let compliance = if total > 0 {
            ((taken as f64 / total as f64) * 100.0).round() as i64
        } else {
            100
        };
        Self {
            taken,
            missed,
            snoozed,
            total,
            compliance,
        }
    }
}

impl DoseLog {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status: String = row.get("status")?;
        Ok(Self {
            id: row.get("id")?,
            medication_id: row.get("medication_id")?,
            medication_name: row.get("medication_name")?,
            scheduled_time: row.get("scheduled_time")?,
            taken_time: row.get("taken_time")?,
            status: DoseStatus::from_str(&status).unwrap_or_default(),
            date: row.get("date")?,
            notes: row.get("notes")?,
        })
    }

    /// Record an event at `at`; the row belongs to `at`'s calendar date and
    /// `taken_time` is only set for taken doses
    pub fn record(conn: &Connection, data: &DoseLogCreate, at: NaiveDateTime) -> DbResult<Self> {
        let taken_time = (data.status == DoseStatus::Taken).then_some(at);

        conn.execute(
            r#"
            INSERT INTO dose_logs (medication_id, medication_name, scheduled_time, taken_time, status, date, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                data.medication_id,
                data.medication_name,
                data.scheduled_time,
                taken_time,
                data.status.as_str(),
                at.date(),
                data.notes,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound {
            entity: "Dose log",
            id,
        })
    }

    /// Insert a record exactly as exported, keeping its id
    pub fn restore(conn: &Connection, log: &DoseLog) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT INTO dose_logs (id, medication_id, medication_name, scheduled_time, taken_time, status, date, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                log.id,
                log.medication_id,
                log.medication_name,
                log.scheduled_time,
                log.taken_time,
                log.status.as_str(),
                log.date,
                log.notes,
            ],
        )?;
        Ok(())
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let log = conn
            .query_row("SELECT * FROM dose_logs WHERE id = ?1", [id], Self::from_row)
            .optional()?;
        Ok(log)
    }

    /// All entries for one date, in insertion order
    pub fn list_for_date(conn: &Connection, date: NaiveDate) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM dose_logs WHERE date = ?1 ORDER BY id")?;
        let logs = stmt
            .query_map([date], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// Entries on or after `since`, newest first
    pub fn list_since(conn: &Connection, since: NaiveDate) -> DbResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM dose_logs WHERE date >= ?1 ORDER BY date DESC, id DESC")?;
        let logs = stmt
            .query_map([since], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// Every entry, in insertion order
    pub fn list_all(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM dose_logs ORDER BY id")?;
        let logs = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// Ids of medications with at least one `taken` entry on `date`
    pub fn taken_medication_ids(conn: &Connection, date: NaiveDate) -> DbResult<HashSet<i64>> {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT medication_id FROM dose_logs WHERE date = ?1 AND status = 'taken'",
        )?;
        let ids = stmt
            .query_map([date], |row| row.get(0))?
            .collect::<Result<HashSet<i64>, _>>()?;
        Ok(ids)
    }

    pub fn is_taken(conn: &Connection, medication_id: i64, date: NaiveDate) -> DbResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM dose_logs WHERE medication_id = ?1 AND date = ?2 AND status = 'taken'",
            params![medication_id, date],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Delete the most recently inserted entry for (medication, date).
    /// Returns the removed row, or `None` when there was nothing to undo.
    pub fn undo_latest(
        conn: &Connection,
        medication_id: i64,
        date: NaiveDate,
    ) -> DbResult<Option<Self>> {
        let latest = conn
            .query_row(
                "SELECT * FROM dose_logs WHERE medication_id = ?1 AND date = ?2 ORDER BY id DESC LIMIT 1",
                params![medication_id, date],
                Self::from_row,
            )
            .optional()?;

        if let Some(ref log) = latest {
            conn.execute("DELETE FROM dose_logs WHERE id = ?1", [log.id])?;
        }

        Ok(latest)
    }

    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM dose_logs WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    /// Adherence over entries dated on or after `since`
    pub fn stats_since(conn: &Connection, since: NaiveDate) -> DbResult<AdherenceStats> {
        let (taken, missed, snoozed, total) = conn.query_row(
            r#"
            SELECT
                COALESCE(SUM(status = 'taken'), 0),
                COALESCE(SUM(status = 'missed'), 0),
                COALESCE(SUM(status = 'snoozed'), 0),
                COUNT(*)
            FROM dose_logs WHERE date >= ?1
            "#,
            [since],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;
        Ok(AdherenceStats::from_counts(taken, missed, snoozed, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn entry(medication_id: i64, status: DoseStatus) -> DoseLogCreate {
        DoseLogCreate {
            medication_id,
            medication_name: format!("Med {}", medication_id),
            scheduled_time: TimeOfDay::new(8, 0).unwrap(),
            status,
            notes: None,
        }
    }

    #[test]
    fn test_record_sets_taken_time_only_for_taken() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();

        let taken = DoseLog::record(&conn, &entry(1, DoseStatus::Taken), at(2, 8, 5)).unwrap();
        assert_eq!(taken.taken_time, Some(at(2, 8, 5)));
        assert_eq!(taken.date, at(2, 8, 5).date());

        let snoozed = DoseLog::record(&conn, &entry(1, DoseStatus::Snoozed), at(2, 8, 6)).unwrap();
        assert_eq!(snoozed.taken_time, None);
        assert_eq!(snoozed.status, DoseStatus::Snoozed);
    }

    #[test]
    fn test_undo_removes_only_latest_duplicate() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();
        let date = at(2, 0, 0).date();

        let first = DoseLog::record(&conn, &entry(7, DoseStatus::Taken), at(2, 8, 1)).unwrap();
        let second = DoseLog::record(&conn, &entry(7, DoseStatus::Taken), at(2, 8, 2)).unwrap();

        let removed = DoseLog::undo_latest(&conn, 7, date).unwrap().unwrap();
        assert_eq!(removed.id, second.id);
        assert!(DoseLog::is_taken(&conn, 7, date).unwrap());

        let removed = DoseLog::undo_latest(&conn, 7, date).unwrap().unwrap();
        assert_eq!(removed.id, first.id);
        assert!(!DoseLog::is_taken(&conn, 7, date).unwrap());

        assert!(DoseLog::undo_latest(&conn, 7, date).unwrap().is_none());
    }

    #[test]
    fn test_taken_ids_are_per_date() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();

        DoseLog::record(&conn, &entry(1, DoseStatus::Taken), at(2, 8, 0)).unwrap();
        DoseLog::record(&conn, &entry(2, DoseStatus::Missed), at(2, 9, 0)).unwrap();
        DoseLog::record(&conn, &entry(3, DoseStatus::Taken), at(3, 8, 0)).unwrap();

        let ids = DoseLog::taken_medication_ids(&conn, at(2, 0, 0).date()).unwrap();
        assert_eq!(ids, HashSet::from([1]));
    }

    #[test]
    fn test_stats_since() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();

        let empty = DoseLog::stats_since(&conn, at(1, 0, 0).date()).unwrap();
        assert_eq!(empty.compliance, 100);
        assert_eq!(empty.total, 0);

        DoseLog::record(&conn, &entry(1, DoseStatus::Taken), at(2, 8, 0)).unwrap();
        DoseLog::record(&conn, &entry(2, DoseStatus::Taken), at(2, 8, 0)).unwrap();
        DoseLog::record(&conn, &entry(3, DoseStatus::Missed), at(2, 9, 0)).unwrap();

        let stats = DoseLog::stats_since(&conn, at(1, 0, 0).date()).unwrap();
        assert_eq!(stats.taken, 2);
        assert_eq!(stats.missed, 1);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.compliance, 67);
    }
}
