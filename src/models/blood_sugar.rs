//! Blood sugar model
//!
//! Glucose readings in mmol/L with a four-band classification.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::TimeOfDay;
use crate::db::{DbError, DbResult};

/// Classification band of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseLevel {
    Low,
    Normal,
    SlightlyHigh,
    High,
}

impl GlucoseLevel {
    pub const ALL: [GlucoseLevel; 4] = [
        GlucoseLevel::Low,
        GlucoseLevel::Normal,
        GlucoseLevel::SlightlyHigh,
        GlucoseLevel::High,
    ];

    /// Band for a value in mmol/L
    pub fn classify(value: f64) -> Self {
        if value < 4.0 {
            GlucoseLevel::Low
        } else if value < 7.0 {
            GlucoseLevel::Normal
        } else if value < 10.0 {
            GlucoseLevel::SlightlyHigh
        } else {
            GlucoseLevel::High
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GlucoseLevel::Low => "Low",
            GlucoseLevel::Normal => "Normal",
            GlucoseLevel::SlightlyHigh => "Slightly high",
            GlucoseLevel::High => "High",
        }
    }
}

/// A blood sugar reading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloodSugarReading {
    pub id: i64,
    /// mmol/L
    pub value: f64,
    pub time: TimeOfDay,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

/// Data for recording a reading
#[derive(Debug, Clone)]
pub struct BloodSugarCreate {
    pub value: f64,
    pub time: TimeOfDay,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

impl BloodSugarReading {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            value: row.get("value")?,
            time: row.get("time")?,
            date: row.get("date")?,
            notes: row.get("notes")?,
        })
    }

    pub fn level(&self) -> GlucoseLevel {
        GlucoseLevel::classify(self.value)
    }

    pub fn create(conn: &Connection, data: &BloodSugarCreate) -> DbResult<Self> {
        if !(data.value > 0.0) {
            return Err(DbError::InvalidValue(format!(
                "blood sugar must be positive, got {}",
                data.value
            )));
        }

        conn.execute(
            "INSERT INTO blood_sugar (value, time, date, notes) VALUES (?1, ?2, ?3, ?4)",
            params![data.value, data.time, data.date, data.notes],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound {
            entity: "Blood sugar reading",
            id,
        })
    }

    /// Insert a record exactly as exported, keeping its id
    pub fn restore(conn: &Connection, reading: &BloodSugarReading) -> DbResult<()> {
        conn.execute(
            "INSERT INTO blood_sugar (id, value, time, date, notes) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                reading.id,
                reading.value,
                reading.time,
                reading.date,
                reading.notes
            ],
        )?;
        Ok(())
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let reading = conn
            .query_row("SELECT * FROM blood_sugar WHERE id = ?1", [id], Self::from_row)
            .optional()?;
        Ok(reading)
    }

    /// Readings newest first, optionally only those on or after `since`
    pub fn list(conn: &Connection, since: Option<NaiveDate>) -> DbResult<Vec<Self>> {
        let readings = match since {
            Some(since) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM blood_sugar WHERE date >= ?1 ORDER BY date DESC, time DESC, id DESC",
                )?;
                let rows = stmt
                    .query_map([since], Self::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn
                    .prepare("SELECT * FROM blood_sugar ORDER BY date DESC, time DESC, id DESC")?;
                let rows = stmt
                    .query_map([], Self::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(readings)
    }

    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM blood_sugar WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(GlucoseLevel::classify(3.9), GlucoseLevel::Low);
        assert_eq!(GlucoseLevel::classify(4.0), GlucoseLevel::Normal);
        assert_eq!(GlucoseLevel::classify(6.9), GlucoseLevel::Normal);
        assert_eq!(GlucoseLevel::classify(7.0), GlucoseLevel::SlightlyHigh);
        assert_eq!(GlucoseLevel::classify(9.9), GlucoseLevel::SlightlyHigh);
        assert_eq!(GlucoseLevel::classify(10.0), GlucoseLevel::High);
    }

    #[test]
    fn test_list_newest_first_and_reject_non_positive() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();
        let day = |d| NaiveDate::from_ymd_opt(2026, 5, d).unwrap();

        for (d, h, v) in [(1, 8, 5.2), (3, 7, 6.1), (3, 21, 8.4)] {
            BloodSugarReading::create(
                &conn,
                &BloodSugarCreate {
                    value: v,
                    time: TimeOfDay::new(h, 0).unwrap(),
                    date: day(d),
                    notes: None,
                },
            )
            .unwrap();
        }

        let all = BloodSugarReading::list(&conn, None).unwrap();
        let values: Vec<f64> = all.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![8.4, 6.1, 5.2]);

        let recent = BloodSugarReading::list(&conn, Some(day(2))).unwrap();
        assert_eq!(recent.len(), 2);

        let bad = BloodSugarCreate {
            value: 0.0,
            time: TimeOfDay::default(),
            date: day(4),
            notes: None,
        };
        assert!(BloodSugarReading::create(&conn, &bad).is_err());
    }
}
