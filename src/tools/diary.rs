//! Health diary tools

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::Database;
use crate::models::{HealthDiaryCreate, HealthDiaryEntry, Mood};

/// Entries shown when no limit is given
pub const DEFAULT_DIARY_LIMIT: u32 = 30;

#[derive(Debug, Serialize)]
pub struct DiaryResponse {
    pub entries: Vec<HealthDiaryEntry>,
    pub total: usize,
    pub average_pain: Option<f64>,
    pub average_energy: Option<f64>,
}

pub fn parse_mood(value: Option<&str>) -> Result<Mood, String> {
    match value {
        Some(v) if !v.trim().is_empty() => Mood::from_str(v.trim()).ok_or_else(|| {
            format!(
                "Unknown mood '{}', expected great, good, okay, bad or terrible",
                v
            )
        }),
        _ => Ok(Mood::default()),
    }
}

pub fn add_entry(db: &Database, data: HealthDiaryCreate) -> Result<HealthDiaryEntry, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let entry = HealthDiaryEntry::create(&conn, &data)
        .map_err(|e| format!("Failed to save diary entry: {}", e))?;

    tracing::info!(id = entry.id, date = %entry.date, mood = entry.mood.as_str(), "Diary entry saved");
    Ok(entry)
}

/// Latest entry for a date
pub fn entry_for_date(db: &Database, date: NaiveDate) -> Result<Option<HealthDiaryEntry>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    HealthDiaryEntry::for_date(&conn, date).map_err(|e| format!("Failed to load diary: {}", e))
}

/// Recent entries newest first
pub fn list_entries(db: &Database, limit: Option<u32>) -> Result<DiaryResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let entries = HealthDiaryEntry::list(&conn, Some(limit.unwrap_or(DEFAULT_DIARY_LIMIT)))
        .map_err(|e| format!("Failed to load diary: {}", e))?;

    let total = entries.len();
    let average = |f: fn(&HealthDiaryEntry) -> u8| {
        (total > 0).then(|| entries.iter().map(|e| f64::from(f(e))).sum::<f64>() / total as f64)
    };
    let average_pain = average(|e| e.pain_level);
    let average_energy = average(|e| e.energy_level);

    Ok(DiaryResponse {
        entries,
        total,
        average_pain,
        average_energy,
    })
}

pub fn delete_entry(db: &Database, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    HealthDiaryEntry::delete(&conn, id).map_err(|e| format!("Failed to delete diary entry: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    fn entry(day: u32, pain: u8, energy: u8) -> HealthDiaryCreate {
        HealthDiaryCreate {
            date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            mood: Mood::Good,
            pain_level: pain,
            symptoms: String::new(),
            side_effects: "dizzy".to_string(),
            energy_level: energy,
            notes: String::new(),
        }
    }

    #[test]
    fn test_diary_averages_and_limits() {
        let (_dir, db) = temp_database();
        add_entry(&db, entry(1, 2, 6)).unwrap();
        add_entry(&db, entry(2, 4, 8)).unwrap();
        assert!(add_entry(&db, entry(3, 11, 5)).is_err());

        let diary = list_entries(&db, None).unwrap();
        assert_eq!(diary.total, 2);
        assert_eq!(diary.average_pain, Some(3.0));
        assert_eq!(diary.average_energy, Some(7.0));
        assert_eq!(diary.entries[0].date.to_string(), "2026-10-02");

        assert_eq!(list_entries(&db, Some(1)).unwrap().total, 1);
        let day = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        assert_eq!(entry_for_date(&db, day).unwrap().unwrap().pain_level, 2);
    }

    #[test]
    fn test_parse_mood() {
        assert_eq!(parse_mood(None).unwrap(), Mood::Okay);
        assert_eq!(parse_mood(Some("Great")).unwrap(), Mood::Great);
        assert!(parse_mood(Some("meh")).is_err());
    }
}
