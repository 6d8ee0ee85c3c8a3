//! Health diary model
//!
//! Daily mood, pain and energy notes kept for doctor visits.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Great,
    Good,
    #[default]
    Okay,
    Bad,
    Terrible,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Great => "great",
            Mood::Good => "good",
            Mood::Okay => "okay",
            Mood::Bad => "bad",
            Mood::Terrible => "terrible",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "great" => Some(Mood::Great),
            "good" => Some(Mood::Good),
            "okay" | "ok" => Some(Mood::Okay),
            "bad" => Some(Mood::Bad),
            "terrible" => Some(Mood::Terrible),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthDiaryEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub mood: Mood,
    /// 0-10
    pub pain_level: u8,
    pub symptoms: String,
    pub side_effects: String,
    /// 0-10
    pub energy_level: u8,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct HealthDiaryCreate {
    pub date: NaiveDate,
    pub mood: Mood,
    pub pain_level: u8,
    pub symptoms: String,
    pub side_effects: String,
    pub energy_level: u8,
    pub notes: String,
}

fn check_scale(field: &str, value: u8) -> DbResult<()> {
    if value <= 10 {
        Ok(())
    } else {
        Err(DbError::InvalidValue(format!(
            "{} must be between 0 and 10, got {}",
            field, value
        )))
    }
}

impl HealthDiaryEntry {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let mood: String = row.get("mood")?;
        Ok(Self {
            id: row.get("id")?,
            date: row.get("date")?,
            mood: Mood::from_str(&mood).unwrap_or_default(),
            pain_level: row.get("pain_level")?,
            symptoms: row.get("symptoms")?,
            side_effects: row.get("side_effects")?,
            energy_level: row.get("energy_level")?,
            notes: row.get("notes")?,
        })
    }

    pub fn create(conn: &Connection, data: &HealthDiaryCreate) -> DbResult<Self> {
        check_scale("pain level", data.pain_level)?;
        check_scale("energy level", data.energy_level)?;

        conn.execute(
            r#"
            INSERT INTO health_diary (date, mood, pain_level, symptoms, side_effects, energy_level, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                data.date,
                data.mood.as_str(),
                data.pain_level,
                data.symptoms,
                data.side_effects,
                data.energy_level,
                data.notes,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound {
            entity: "Diary entry",
            id,
        })
    }

    /// Insert a record exactly as exported, keeping its id
    pub fn restore(conn: &Connection, entry: &HealthDiaryEntry) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT INTO health_diary (id, date, mood, pain_level, symptoms, side_effects, energy_level, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                entry.id,
                entry.date,
                entry.mood.as_str(),
                entry.pain_level,
                entry.symptoms,
                entry.side_effects,
                entry.energy_level,
                entry.notes,
            ],
        )?;
        Ok(())
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let entry = conn
            .query_row("SELECT * FROM health_diary WHERE id = ?1", [id], Self::from_row)
            .optional()?;
        Ok(entry)
    }

    /// Latest entry written for a date
    pub fn for_date(conn: &Connection, date: NaiveDate) -> DbResult<Option<Self>> {
        let entry = conn
            .query_row(
                "SELECT * FROM health_diary WHERE date = ?1 ORDER BY id DESC LIMIT 1",
                [date],
                Self::from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Entries newest first
    pub fn list(conn: &Connection, limit: Option<u32>) -> DbResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM health_diary ORDER BY date DESC, id DESC LIMIT ?1")?;
        let limit = limit.map(i64::from).unwrap_or(-1);
        let entries = stmt
            .query_map([limit], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM health_diary WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    fn entry(d: u32, mood: Mood, pain: u8) -> HealthDiaryCreate {
        HealthDiaryCreate {
            date: NaiveDate::from_ymd_opt(2026, 8, d).unwrap(),
            mood,
            pain_level: pain,
            symptoms: String::new(),
            side_effects: String::new(),
            energy_level: 6,
            notes: String::new(),
        }
    }

    #[test]
    fn test_scale_is_validated() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();

        assert!(HealthDiaryEntry::create(&conn, &entry(1, Mood::Bad, 11)).is_err());
        let ok = HealthDiaryEntry::create(&conn, &entry(1, Mood::Bad, 10)).unwrap();
        assert_eq!(ok.mood, Mood::Bad);
    }

    #[test]
    fn test_list_newest_first_with_limit() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();

        for d in 1..=3 {
            HealthDiaryEntry::create(&conn, &entry(d, Mood::Good, 2)).unwrap();
        }

        let all = HealthDiaryEntry::list(&conn, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].date.to_string(), "2026-08-03");

        let two = HealthDiaryEntry::list(&conn, Some(2)).unwrap();
        assert_eq!(two.len(), 2);

        let day_two = NaiveDate::from_ymd_opt(2026, 8, 2).unwrap();
        assert!(HealthDiaryEntry::for_date(&conn, day_two).unwrap().is_some());
    }
}
