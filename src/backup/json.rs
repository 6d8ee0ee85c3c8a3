//! Full JSON backup
//!
//! One array per table. Import parses the whole document before touching the
//! database and then replaces every table in a single transaction, keeping
//! the exported ids so dose logs still point at their medications.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::BackupError;
use crate::db::Database;
use crate::models::{
    AppSettings, BloodSugarReading, DoctorAppointment, DoseLog, EmergencyContact,
    HealthDiaryEntry, MedicalReport, Medication, MedicationStock,
};

/// Bumped when the document layout changes
pub const BACKUP_FORMAT_VERSION: &str = "2.0";

const TABLES: [&str; 8] = [
    "dose_logs",
    "medications",
    "blood_sugar",
    "medical_reports",
    "emergency_contacts",
    "doctor_appointments",
    "medication_stock",
    "health_diary",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupPayload {
    /// RFC 3339 timestamp of the export
    #[serde(default)]
    pub exported_at: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub logs: Vec<DoseLog>,
    #[serde(default)]
    pub blood_sugar: Vec<BloodSugarReading>,
    #[serde(default)]
    pub medical_reports: Vec<MedicalReport>,
    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,
    #[serde(default)]
    pub doctor_appointments: Vec<DoctorAppointment>,
    #[serde(default)]
    pub medication_stock: Vec<MedicationStock>,
    #[serde(default)]
    pub health_diary: Vec<HealthDiaryEntry>,
    /// Zero or one row; kept as an array like every other table
    #[serde(default)]
    pub settings: Vec<AppSettings>,
}

/// Row counts written by an import
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub medications: usize,
    pub logs: usize,
    pub blood_sugar: usize,
    pub medical_reports: usize,
    pub emergency_contacts: usize,
    pub doctor_appointments: usize,
    pub medication_stock: usize,
    pub health_diary: usize,
    pub settings_restored: bool,
}

impl BackupPayload {
    /// Snapshot every table
    pub fn export(db: &Database) -> Result<Self, BackupError> {
        let payload = db.with_conn(|conn| {
            Ok(Self {
                exported_at: chrono::Utc::now().to_rfc3339(),
                version: BACKUP_FORMAT_VERSION.to_string(),
                medications: Medication::list(conn, false)?,
                logs: DoseLog::list_all(conn)?,
                blood_sugar: BloodSugarReading::list(conn, None)?,
                medical_reports: MedicalReport::list(conn, None)?,
                emergency_contacts: EmergencyContact::list(conn)?,
                doctor_appointments: DoctorAppointment::list(conn)?,
                medication_stock: MedicationStock::list(conn)?,
                health_diary: HealthDiaryEntry::list(conn, None)?,
                settings: vec![AppSettings::get(conn)?],
            })
        })?;

        tracing::info!(
            medications = payload.medications.len(),
            logs = payload.logs.len(),
            "Exported backup"
        );
        Ok(payload)
    }

    /// Parse a backup document; nothing is written
    pub fn parse(json: &str) -> Result<Self, BackupError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, BackupError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Suggested file name for a backup taken on `date`
    pub fn file_name(date: NaiveDate) -> String {
        format!("medtime-backup-{}.json", date)
    }

    /// Replace every table with the payload's rows. Requires `confirmed`
    /// because existing data is deleted. Settings are only replaced when the
    /// payload carries a settings row.
    pub fn import(&self, db: &Database, confirmed: bool) -> Result<ImportStats, BackupError> {
        if !confirmed {
            return Err(BackupError::NotConfirmed);
        }

        let stats = db.with_transaction(|tx| {
            for table in TABLES {
                tx.execute(&format!("DELETE FROM {}", table), [])?;
            }

            for med in &self.medications {
                Medication::restore(tx, med)?;
            }
            for log in &self.logs {
                DoseLog::restore(tx, log)?;
            }
            for reading in &self.blood_sugar {
                BloodSugarReading::restore(tx, reading)?;
            }
            for report in &self.medical_reports {
                MedicalReport::restore(tx, report)?;
            }
            for contact in &self.emergency_contacts {
                EmergencyContact::restore(tx, contact)?;
            }
            for appt in &self.doctor_appointments {
                DoctorAppointment::restore(tx, appt)?;
            }
            for stock in &self.medication_stock {
                MedicationStock::restore(tx, stock)?;
            }
            for entry in &self.health_diary {
                HealthDiaryEntry::restore(tx, entry)?;
            }
            let settings_restored = match self.settings.first() {
                Some(settings) => {
                    AppSettings::restore(tx, settings)?;
                    true
                }
                None => false,
            };

            Ok(ImportStats {
                medications: self.medications.len(),
                logs: self.logs.len(),
                blood_sugar: self.blood_sugar.len(),
                medical_reports: self.medical_reports.len(),
                emergency_contacts: self.emergency_contacts.len(),
                doctor_appointments: self.doctor_appointments.len(),
                medication_stock: self.medication_stock.len(),
                health_diary: self.health_diary.len(),
                settings_restored,
            })
        })?;

        tracing::info!(
            medications = stats.medications,
            logs = stats.logs,
            "Imported backup"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;
    use crate::models::fixtures::daily;
    use crate::models::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, d).unwrap()
    }

    fn seed(db: &Database) {
        db.with_conn(|conn| {
            let med = Medication::create(conn, &daily("Gliclada", 7, 30))?;
            let mut monthly = daily("Vitamin B12", 9, 0);
            monthly.schedule = Schedule::Monthly { day: 1 };
            monthly.start_date = Some(day(1));
            let retired = Medication::create(conn, &monthly)?;
            Medication::deactivate(conn, retired.id)?;

            DoseLog::record(
                conn,
                &DoseLogCreate {
                    medication_id: med.id,
                    medication_name: med.name.clone(),
                    scheduled_time: med.scheduled_time,
                    status: DoseStatus::Taken,
                    notes: Some("with toast".to_string()),
                },
                day(3).and_hms_opt(7, 41, 0).unwrap(),
            )?;
            BloodSugarReading::create(
                conn,
                &BloodSugarCreate {
                    value: 6.3,
                    time: TimeOfDay::new(7, 0).unwrap(),
                    date: day(3),
                    notes: None,
                },
            )?;
            MedicalReport::create(
                conn,
                &MedicalReportCreate {
                    title: "Lipid panel".to_string(),
                    category: ReportCategory::Analysis,
                    date: day(2),
                    file_name: None,
                    file_type: None,
                    file_data: None,
                    notes: Some("fasting".to_string()),
                },
            )?;
            EmergencyContact::create(
                conn,
                &EmergencyContactCreate {
                    name: "Ana".to_string(),
                    relationship: "Daughter".to_string(),
                    phone: "555-0100".to_string(),
                    is_primary: true,
                },
            )?;
            DoctorAppointment::create(
                conn,
                &AppointmentCreate {
                    doctor_name: "Dr. Hoxha".to_string(),
                    specialty: "Neurology".to_string(),
                    date: day(20),
                    time: TimeOfDay::new(11, 0).unwrap(),
                    location: Some("Clinic 2".to_string()),
                    phone: None,
                    notes: None,
                    questions_to_ask: None,
                },
            )?;
            MedicationStock::create(
                conn,
                &MedicationStockCreate {
                    medication_id: med.id,
                    medication_name: med.name.clone(),
                    pills_remaining: 28,
                    pills_per_day: 1.0,
                    refill_threshold: 7,
                    last_refill_date: day(1),
                    pharmacy_name: None,
                    pharmacy_phone: None,
                },
            )?;
            HealthDiaryEntry::create(
                conn,
                &HealthDiaryCreate {
                    date: day(3),
                    mood: Mood::Good,
                    pain_level: 2,
                    symptoms: "stiff hands".to_string(),
                    side_effects: String::new(),
                    energy_level: 7,
                    notes: String::new(),
                },
            )?;
            AppSettings::update(
                conn,
                &AppSettingsUpdate {
                    snooze_minutes: Some(5),
                    ..Default::default()
                },
            )?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_export_import_reproduces_every_table() {
        let (_src_dir, source) = temp_database();
        seed(&source);
        let exported = BackupPayload::export(&source).unwrap();
        let json = exported.to_json().unwrap();

        let (_dst_dir, target) = temp_database();
        // Pre-existing rows are replaced, not merged
        target
            .with_conn(|conn| Medication::create(conn, &daily("Stale", 6, 0)))
            .unwrap();

        let parsed = BackupPayload::parse(&json).unwrap();
        let stats = parsed.import(&target, true).unwrap();
        assert_eq!(stats.medications, 2);
        assert!(stats.settings_restored);

        let reexported = BackupPayload::export(&target).unwrap();
        assert_eq!(
            BackupPayload {
                exported_at: String::new(),
                ..reexported
            },
            BackupPayload {
                exported_at: String::new(),
                ..exported
            }
        );
    }

    #[test]
    fn test_import_requires_confirmation() {
        let (_dir, db) = temp_database();
        seed(&db);
        let payload = BackupPayload::parse("{}").unwrap();

        assert!(matches!(
            payload.import(&db, false),
            Err(BackupError::NotConfirmed)
        ));
        assert_eq!(
            db.with_conn(|conn| Medication::count(conn, false)).unwrap(),
            2
        );
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        assert!(matches!(
            BackupPayload::parse("{\"logs\": [{\"status\": 5}]"),
            Err(BackupError::Json(_))
        ));
        assert!(BackupPayload::parse("not json").is_err());
    }

    #[test]
    fn test_missing_arrays_default_to_empty() {
        let payload = BackupPayload::parse(r#"{"version": "1.0", "logs": []}"#).unwrap();
        assert!(payload.medications.is_empty());
        assert!(payload.settings.is_empty());
    }
}
