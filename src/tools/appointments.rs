//! Doctor appointment tools

use chrono::NaiveDate;
use serde::Serialize;

use super::require_text;
use crate::db::Database;
use crate::models::{AppointmentCreate, AppointmentUpdate, DoctorAppointment};

#[derive(Debug, Serialize)]
pub struct AppointmentsResponse {
    pub upcoming: Vec<DoctorAppointment>,
    pub past: Vec<DoctorAppointment>,
    /// Next open appointment, if any
    pub next: Option<DoctorAppointment>,
    /// Days until `next`
    pub days_until_next: Option<i64>,
}

pub fn add_appointment(
    db: &Database,
    mut data: AppointmentCreate,
) -> Result<DoctorAppointment, String> {
    data.doctor_name = require_text("Doctor name", &data.doctor_name)?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let appt = DoctorAppointment::create(&conn, &data)
        .map_err(|e| format!("Failed to add appointment: {}", e))?;

    tracing::info!(id = appt.id, date = %appt.date, "Appointment added");
    Ok(appt)
}

/// Upcoming appointments soonest first, past ones latest first
pub fn list_appointments(db: &Database, today: NaiveDate) -> Result<AppointmentsResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let upcoming = DoctorAppointment::upcoming(&conn, today)
        .map_err(|e| format!("Failed to list appointments: {}", e))?;
    let past = DoctorAppointment::past(&conn, today)
        .map_err(|e| format!("Failed to list appointments: {}", e))?;

    let next = upcoming.first().cloned();
    let days_until_next = next.as_ref().map(|a| (a.date - today).num_days());

    Ok(AppointmentsResponse {
        upcoming,
        past,
        next,
        days_until_next,
    })
}

pub fn update_appointment(
    db: &Database,
    id: i64,
    mut data: AppointmentUpdate,
) -> Result<DoctorAppointment, String> {
    if let Some(ref name) = data.doctor_name {
        data.doctor_name = Some(require_text("Doctor name", name)?);
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    DoctorAppointment::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update appointment: {}", e))?
        .ok_or_else(|| format!("Appointment not found with id: {}", id))
}

/// Mark an appointment done, optionally with the doctor's summary
pub fn complete_appointment(
    db: &Database,
    id: i64,
    summary: Option<&str>,
) -> Result<DoctorAppointment, String> {
    let summary = summary.map(str::trim).filter(|s| !s.is_empty());

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let appt = DoctorAppointment::complete(&conn, id, summary)
        .map_err(|e| format!("Failed to complete appointment: {}", e))?
        .ok_or_else(|| format!("Appointment not found with id: {}", id))?;

    tracing::info!(id, "Appointment completed");
    Ok(appt)
}

pub fn delete_appointment(db: &Database, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    DoctorAppointment::delete(&conn, id)
        .map_err(|e| format!("Failed to delete appointment: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;
    use crate::models::TimeOfDay;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
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
            questions_to_ask: Some("Adjust Jardiance?".to_string()),
        }
    }

    #[test]
    fn test_upcoming_and_completion() {
        let (_dir, db) = temp_database();
        let today = date(10, 14);
        add_appointment(&db, visit("Dr. Later", date(11, 20))).unwrap();
        let soon = add_appointment(&db, visit("Dr. Soon", date(10, 17))).unwrap();
        add_appointment(&db, visit("Dr. Before", date(9, 1))).unwrap();

        let listed = list_appointments(&db, today).unwrap();
        assert_eq!(listed.upcoming.len(), 2);
        assert_eq!(listed.next.as_ref().unwrap().id, soon.id);
        assert_eq!(listed.days_until_next, Some(3));
        assert_eq!(listed.past.len(), 1);

        let done = complete_appointment(&db, soon.id, Some(" Keep dose ")).unwrap();
        assert!(done.completed);
        assert_eq!(done.summary.as_deref(), Some("Keep dose"));

        let listed = list_appointments(&db, today).unwrap();
        assert_eq!(listed.upcoming.len(), 1);
        assert_eq!(listed.past.len(), 2);
        assert!(complete_appointment(&db, 404, None).is_err());
    }
}
