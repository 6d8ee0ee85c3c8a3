//! Doctor appointment model
//!
//! Appointments start open and are closed with an optional summary of what was
//! discussed. "Upcoming" and "past" are split against a caller-supplied date.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{RowUpdate, TimeOfDay};
use crate::db::{DbError, DbResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorAppointment {
    pub id: i64,
    pub doctor_name: String,
    pub specialty: String,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub questions_to_ask: Option<String>,
    pub completed: bool,
    pub summary: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppointmentCreate {
    pub doctor_name: String,
    pub specialty: String,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub questions_to_ask: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentUpdate {
    pub doctor_name: Option<String>,
    pub specialty: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<TimeOfDay>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub questions_to_ask: Option<String>,
}

impl DoctorAppointment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            doctor_name: row.get("doctor_name")?,
            specialty: row.get("specialty")?,
            date: row.get("date")?,
            time: row.get("time")?,
            location: row.get("location")?,
            phone: row.get("phone")?,
            notes: row.get("notes")?,
            questions_to_ask: row.get("questions_to_ask")?,
            completed: row.get::<_, i32>("completed")? != 0,
            summary: row.get("summary")?,
        })
    }

    pub fn create(conn: &Connection, data: &AppointmentCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO doctor_appointments (doctor_name, specialty, date, time, location, phone, notes, questions_to_ask)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                data.doctor_name,
                data.specialty,
                data.date,
                data.time,
                data.location,
                data.phone,
                data.notes,
                data.questions_to_ask,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound {
            entity: "Appointment",
            id,
        })
    }

    /// Insert a record exactly as exported, keeping its id
    pub fn restore(conn: &Connection, appt: &DoctorAppointment) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT INTO doctor_appointments (
                id, doctor_name, specialty, date, time, location, phone, notes,
                questions_to_ask, completed, summary
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                appt.id,
                appt.doctor_name,
                appt.specialty,
                appt.date,
                appt.time,
                appt.location,
                appt.phone,
                appt.notes,
                appt.questions_to_ask,
                appt.completed as i32,
                appt.summary,
            ],
        )?;
        Ok(())
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let appt = conn
            .query_row(
                "SELECT * FROM doctor_appointments WHERE id = ?1",
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(appt)
    }

    /// Every appointment by date
    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM doctor_appointments ORDER BY date, time, id")?;
        let appts = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(appts)
    }

    /// Open appointments on or after `today`, soonest first
    pub fn upcoming(conn: &Connection, today: NaiveDate) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM doctor_appointments WHERE completed = 0 AND date >= ?1 ORDER BY date, time, id",
        )?;
        let appts = stmt
            .query_map([today], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(appts)
    }

    /// Completed or already-dated appointments, most recent first
    pub fn past(conn: &Connection, today: NaiveDate) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM doctor_appointments WHERE completed = 1 OR date < ?1 ORDER BY date DESC, time DESC, id DESC",
        )?;
        let appts = stmt
            .query_map([today], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(appts)
    }

    pub fn update(conn: &Connection, id: i64, data: &AppointmentUpdate) -> DbResult<Option<Self>> {
        let mut update = RowUpdate::new();
        update.set("doctor_name", data.doctor_name.clone());
        update.set("specialty", data.specialty.clone());
        update.set("date", data.date);
        update.set("time", data.time);
        update.set("location", data.location.clone());
        update.set("phone", data.phone.clone());
        update.set("notes", data.notes.clone());
        update.set("questions_to_ask", data.questions_to_ask.clone());

        update.execute(conn, "doctor_appointments", id)?;
        Self::get_by_id(conn, id)
    }

    /// Close an appointment, recording what was discussed
    pub fn complete(conn: &Connection, id: i64, summary: Option<&str>) -> DbResult<Option<Self>> {
        conn.execute(
            "UPDATE doctor_appointments SET completed = 1, summary = ?2 WHERE id = ?1",
            params![id, summary.filter(|s| !s.trim().is_empty())],
        )?;
        Self::get_by_id(conn, id)
    }

    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM doctor_appointments WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    fn visit(doctor: &str, date: NaiveDate) -> AppointmentCreate {
        AppointmentCreate {
            doctor_name: doctor.to_string(),
            specialty: "Endocrinology".to_string(),
            date,
            time: TimeOfDay::new(10, 30).unwrap(),
            location: None,
            phone: None,
            notes: None,
            questions_to_ask: Some("Adjust metformin?".to_string()),
        }
    }

    #[test]
    fn test_upcoming_and_past_split() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();
        let today = day(10);

        let yesterday = DoctorAppointment::create(&conn, &visit("Old", day(9))).unwrap();
        let on_day = DoctorAppointment::create(&conn, &visit("Today", today)).unwrap();
        let later = DoctorAppointment::create(&conn, &visit("Later", day(20))).unwrap();
        assert!(!later.completed);

        let upcoming: Vec<i64> = DoctorAppointment::upcoming(&conn, today)
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(upcoming, vec![on_day.id, later.id]);

        DoctorAppointment::complete(&conn, later.id, Some("Dose unchanged")).unwrap();
        let past: Vec<i64> = DoctorAppointment::past(&conn, today)
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(past, vec![later.id, yesterday.id]);

        let closed = DoctorAppointment::get_by_id(&conn, later.id).unwrap().unwrap();
        assert_eq!(closed.summary.as_deref(), Some("Dose unchanged"));
    }
}
