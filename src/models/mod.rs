//! Data models
//!
//! Rust structs representing database entities.

mod appointment;
mod blood_sugar;
mod dose_log;
mod emergency_contact;
mod health_diary;
mod medical_report;
mod medication;
mod medication_stock;
mod settings;
mod time_of_day;

pub use appointment::{AppointmentCreate, AppointmentUpdate, DoctorAppointment};
pub use blood_sugar::{BloodSugarCreate, BloodSugarReading, GlucoseLevel};
pub use dose_log::{AdherenceStats, DoseLog, DoseLogCreate, DoseStatus};
pub use emergency_contact::{EmergencyContact, EmergencyContactCreate, EmergencyContactUpdate};
pub use health_diary::{HealthDiaryCreate, HealthDiaryEntry, Mood};
pub use medical_report::{MedicalReport, MedicalReportCreate, ReportCategory, MAX_FILE_BYTES};
pub use medication::{Medication, MedicationCreate, MedicationUpdate, Schedule};
pub use medication_stock::{
    MedicationStock, MedicationStockCreate, MedicationStockUpdate, StockAlert,
};
pub use settings::{AppSettings, AppSettingsUpdate, FontSize, NotificationPermission};
pub use time_of_day::{ParseTimeError, TimeOfDay};

#[cfg(test)]
pub(crate) use medication::fixtures;

use rusqlite::{Connection, ToSql};

use crate::db::DbResult;

/// Dynamic `UPDATE ... SET` builder for partial updates
pub(crate) struct RowUpdate {
    assignments: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl RowUpdate {
    pub fn new() -> Self {
        Self {
            assignments: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Assign `col` when a value is given; `None` leaves the column untouched
    pub fn set<T: ToSql + 'static>(&mut self, col: &str, value: Option<T>) {
        if let Some(value) = value {
            self.push(col, Box::new(value));
        }
    }

    /// Always assign `col`; `None` writes NULL
    pub fn set_nullable<T: ToSql + 'static>(&mut self, col: &str, value: Option<T>) {
        self.push(col, Box::new(value));
    }

    fn push(&mut self, col: &str, value: Box<dyn ToSql>) {
        self.assignments
            .push(format!("{} = ?{}", col, self.params.len() + 1));
        self.params.push(value);
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Run the update against `table` for row `id`; returns rows changed
    pub fn execute(mut self, conn: &Connection, table: &str, id: i64) -> DbResult<usize> {
        if self.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            self.assignments.join(", "),
            self.params.len() + 1
        );
        self.params.push(Box::new(id));

        let params_refs: Vec<&dyn ToSql> = self.params.iter().map(|p| p.as_ref()).collect();
        Ok(conn.execute(&sql, params_refs.as_slice())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    #[test]
    fn test_row_update_skips_none_and_writes_null() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();
        let med = Medication::create(&conn, &fixtures::daily("Aspirin", 12, 0)).unwrap();

        let mut empty = RowUpdate::new();
        empty.set::<String>("name", None);
        assert!(empty.is_empty());
        assert_eq!(empty.execute(&conn, "medications", med.id).unwrap(), 0);

        conn.execute("UPDATE medications SET warning = 'x' WHERE id = ?1", [med.id])
            .unwrap();
        let mut update = RowUpdate::new();
        update.set("dose", Some("2 tablets".to_string()));
        update.set_nullable::<String>("warning", None);
        assert_eq!(update.execute(&conn, "medications", med.id).unwrap(), 1);

        let med = Medication::get_by_id(&conn, med.id).unwrap().unwrap();
        assert_eq!(med.dose, "2 tablets");
        assert_eq!(med.warning, None);
    }
}
