//! Medication model
//!
//! A user-defined medication on a fixed time of day, either every day or once a
//! month. Medications are never hard-deleted: dose logs keep pointing at them,
//! so removal flips `is_active` instead.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{RowUpdate, TimeOfDay};
use crate::db::{DbError, DbResult};

fn first_of_month() -> u32 {
    1
}

/// How often a medication applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "lowercase")]
pub enum Schedule {
    #[default]
    Daily,
    /// Once a month on a fixed day (1-31). A day past the end of a short month
    /// does not fire in that month.
    Monthly {
        #[serde(default = "first_of_month")]
        day: u32,
    },
}

impl Schedule {
    pub fn monthly(day: u32) -> Option<Self> {
        (1..=31).contains(&day).then_some(Schedule::Monthly { day })
    }

    pub fn frequency_str(&self) -> &'static str {
        match self {
            Schedule::Daily => "daily",
            Schedule::Monthly { .. } => "monthly",
        }
    }

    fn monthly_day(&self) -> Option<u32> {
        match self {
            Schedule::Daily => None,
            Schedule::Monthly { day } => Some(*day),
        }
    }

    /// Build from the stored `frequency` / `monthly_day` columns
    pub fn from_columns(frequency: &str, monthly_day: Option<u32>) -> DbResult<Self> {
        match frequency.to_lowercase().as_str() {
            "daily" | "" => Ok(Schedule::Daily),
            "monthly" => Ok(Schedule::Monthly {
                day: monthly_day.unwrap_or_else(first_of_month),
            }),
            other => Err(DbError::InvalidValue(format!("unknown frequency '{}'", other))),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Schedule::Daily => "every day".to_string(),
            Schedule::Monthly { day } => format!("monthly on day {}", day),
        }
    }
}

/// A medication record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Medication {
    pub id: i64,
    pub name: String,
    pub dose: String,
    pub scheduled_time: TimeOfDay,
    pub timing: String,
    pub instructions: String,
    pub warning: Option<String>,
    pub color: String,
    pub icon: String,
    pub schedule: Schedule,
    pub start_date: Option<NaiveDate>,
    /// Post-dose wait in seconds (e.g. "stay upright for 60 minutes")
    pub special_timer_secs: Option<u32>,
    pub is_active: bool,
    pub created_at: String,
}

/// Data for creating a new medication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationCreate {
    pub name: String,
    pub dose: String,
    pub scheduled_time: TimeOfDay,
    pub timing: String,
    pub instructions: String,
    pub warning: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub schedule: Schedule,
    pub start_date: Option<NaiveDate>,
    pub special_timer_secs: Option<u32>,
}

/// Partial update of a medication
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedicationUpdate {
    pub name: Option<String>,
    pub dose: Option<String>,
    pub scheduled_time: Option<TimeOfDay>,
    pub timing: Option<String>,
    pub instructions: Option<String>,
    pub warning: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub schedule: Option<Schedule>,
    pub start_date: Option<NaiveDate>,
    pub special_timer_secs: Option<u32>,
}

impl Medication {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let frequency: String = row.get("frequency")?;
        let monthly_day: Option<u32> = row.get("monthly_day")?;
        let schedule = Schedule::from_columns(&frequency, monthly_day).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
            )
        })?;

        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            dose: row.get("dose")?,
            scheduled_time: row.get("scheduled_time")?,
            timing: row.get("timing")?,
            instructions: row.get("instructions")?,
            warning: row.get("warning")?,
            color: row.get("color")?,
            icon: row.get("icon")?,
            schedule,
            start_date: row.get("start_date")?,
            special_timer_secs: row.get("special_timer_secs")?,
            is_active: row.get::<_, i32>("is_active")? != 0,
            created_at: row.get("created_at")?,
        })
    }

    /// Create a new medication
    pub fn create(conn: &Connection, data: &MedicationCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO medications (
                name, dose, scheduled_time, timing, instructions, warning,
                color, icon, frequency, monthly_day, start_date, special_timer_secs
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, COALESCE(?7, '#2196F3'), COALESCE(?8, ''), ?9, ?10, ?11, ?12)
            "#,
            params![
                data.name,
                data.dose,
                data.scheduled_time,
                data.timing,
                data.instructions,
                data.warning,
                data.color,
                data.icon,
                data.schedule.frequency_str(),
                data.schedule.monthly_day(),
                data.start_date,
                data.special_timer_secs,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound {
            entity: "Medication",
            id,
        })
    }

    /// Insert a record exactly as exported, keeping its id
    pub fn restore(conn: &Connection, med: &Medication) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT INTO medications (
                id, name, dose, scheduled_time, timing, instructions, warning, color, icon,
                frequency, monthly_day, start_date, special_timer_secs, is_active, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                med.id,
                med.name,
                med.dose,
                med.scheduled_time,
                med.timing,
                med.instructions,
                med.warning,
                med.color,
                med.icon,
                med.schedule.frequency_str(),
                med.schedule.monthly_day(),
                med.start_date,
                med.special_timer_secs,
                med.is_active as i32,
                med.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a medication by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let med = conn
            .query_row("SELECT * FROM medications WHERE id = ?1", [id], Self::from_row)
            .optional()?;
        Ok(med)
    }

    /// List medications ordered by scheduled time
    pub fn list(conn: &Connection, active_only: bool) -> DbResult<Vec<Self>> {
        let sql = if active_only {
            "SELECT * FROM medications WHERE is_active = 1 ORDER BY scheduled_time, id"
        } else {
            "SELECT * FROM medications ORDER BY is_active DESC, scheduled_time, id"
        };

        let mut stmt = conn.prepare(sql)?;
        let meds = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(meds)
    }

    /// Active medications sharing one scheduled time
    pub fn list_at_time(conn: &Connection, time: TimeOfDay) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM medications WHERE is_active = 1 AND scheduled_time = ?1 ORDER BY id",
        )?;
        let meds = stmt
            .query_map([time], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meds)
    }

    /// Update a medication
    pub fn update(conn: &Connection, id: i64, data: &MedicationUpdate) -> DbResult<Option<Self>> {
        let mut update = RowUpdate::new();
        update.set("name", data.name.clone());
        update.set("dose", data.dose.clone());
        update.set("scheduled_time", data.scheduled_time);
        update.set("timing", data.timing.clone());
        update.set("instructions", data.instructions.clone());
        update.set("warning", data.warning.clone());
        update.set("color", data.color.clone());
        update.set("icon", data.icon.clone());
        if let Some(schedule) = data.schedule {
            update.set("frequency", Some(schedule.frequency_str()));
            update.set_nullable("monthly_day", schedule.monthly_day());
        }
        update.set("start_date", data.start_date);
        update.set("special_timer_secs", data.special_timer_secs);

        update.execute(conn, "medications", id)?;
        Self::get_by_id(conn, id)
    }

    /// Soft delete: mark as inactive
    pub fn deactivate(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        conn.execute("UPDATE medications SET is_active = 0 WHERE id = ?1", [id])?;
        Self::get_by_id(conn, id)
    }

    /// Reactivate a medication
    pub fn reactivate(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        conn.execute("UPDATE medications SET is_active = 1 WHERE id = ?1", [id])?;
        Self::get_by_id(conn, id)
    }

    /// Count medications
    pub fn count(conn: &Connection, active_only: bool) -> DbResult<i64> {
        let sql = if active_only {
            "SELECT COUNT(*) FROM medications WHERE is_active = 1"
        } else {
            "SELECT COUNT(*) FROM medications"
        };
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn daily(name: &str, hour: u32, minute: u32) -> MedicationCreate {
        MedicationCreate {
            name: name.to_string(),
            dose: "1 tablet".to_string(),
            scheduled_time: TimeOfDay::new(hour, minute).unwrap(),
            timing: "with breakfast".to_string(),
            instructions: "Swallow whole".to_string(),
            warning: None,
            color: None,
            icon: None,
            schedule: Schedule::Daily,
            start_date: None,
            special_timer_secs: None,
        }
    }
}
