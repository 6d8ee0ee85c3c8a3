//! Backup tools
//!
//! JSON export/import of the whole store. Import replaces everything and
//! re-arms reminders from the restored data.

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::backup::{BackupPayload, ImportStats};
use crate::db::Database;
use crate::models::{AppSettings, NotificationPermission};
use crate::reminders::{NotificationCenter, ReminderScheduler};

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub file_name: String,
    /// Where the backup was written, when a directory was given
    pub saved_to: Option<String>,
    pub medications: usize,
    pub logs: usize,
    /// The backup document itself; omitted when saved to disk
    pub json: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: ImportStats,
    pub reminders_armed: usize,
}

/// Export everything; written into `dir` when given, returned inline otherwise
pub fn export_json(
    db: &Database,
    dir: Option<&Path>,
    today: NaiveDate,
) -> Result<ExportResponse, String> {
    let payload = BackupPayload::export(db).map_err(|e| e.to_string())?;
    let json = payload.to_json().map_err(|e| e.to_string())?;
    let file_name = BackupPayload::file_name(today);

    let saved_to = match dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
            let path = dir.join(&file_name);
            std::fs::write(&path, &json)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            tracing::info!(path = %path.display(), "Backup written");
            Some(path.display().to_string())
        }
        None => None,
    };

    Ok(ExportResponse {
        file_name,
        medications: payload.medications.len(),
        logs: payload.logs.len(),
        json: if saved_to.is_some() { None } else { Some(json) },
        saved_to,
    })
}

/// Replace all data with the backup in `json`. Nothing is written unless
/// `confirmed` is set and the document parses.
pub fn import_json(
    db: &Database,
    center: &NotificationCenter,
    scheduler: &ReminderScheduler,
    json: &str,
    confirmed: bool,
) -> Result<ImportResponse, String> {
    let payload = BackupPayload::parse(json).map_err(|e| e.to_string())?;
    let imported = payload.import(db, confirmed).map_err(|e| e.to_string())?;

    let settings = db
        .with_conn(AppSettings::get)
        .map_err(|e| format!("Database error: {}", e))?;
    let granted = settings.notification_permission == NotificationPermission::Granted;
    center.set_enabled(granted);

    let reminders_armed = if granted {
        scheduler
            .schedule_all()
            .map_err(|e| format!("Failed to schedule reminders: {}", e))?
    } else {
        scheduler.stop_all();
        0
    };

    Ok(ImportResponse {
        imported,
        reminders_armed,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::db::test_support::temp_database;
    use crate::models::fixtures::daily;
    use crate::models::Medication;
    use crate::reminders::Notifier;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
    }

    #[test]
    fn test_export_to_directory() {
        let (dir, db) = temp_database();
        db.with_conn(|conn| Medication::create(conn, &daily("Aspirin", 12, 0)))
            .unwrap();

        let inline = export_json(&db, None, today()).unwrap();
        assert!(inline.json.unwrap().contains("Aspirin"));

        let saved = export_json(&db, Some(&dir.path().join("backups")), today()).unwrap();
        assert_eq!(saved.file_name, "medtime-backup-2026-10-14.json");
        assert!(saved.json.is_none());
        assert!(std::path::Path::new(&saved.saved_to.unwrap()).exists());
    }

    #[tokio::test]
    async fn test_import_rearms_from_restored_settings() {
        let (_a, source) = temp_database();
        source
            .with_conn(|conn| {
                Medication::create(conn, &daily("Lyrica", 20, 0))?;
                AppSettings::set_permission(conn, NotificationPermission::Granted)
            })
            .unwrap();
        let json = export_json(&source, None, today()).unwrap().json.unwrap();

        let (_b, target) = temp_database();
        let center = Arc::new(NotificationCenter::new(false));
        let clock = Arc::new(ManualClock::at((2026, 10, 14), 9, 0));
        let scheduler = ReminderScheduler::new(
            target.clone(),
            center.clone() as Arc<dyn Notifier>,
            clock as Arc<dyn Clock>,
        );

        assert!(import_json(&target, &center, &scheduler, &json, false).is_err());
        assert!(import_json(&target, &center, &scheduler, "{not json", true).is_err());

        let done = import_json(&target, &center, &scheduler, &json, true).unwrap();
        assert_eq!(done.imported.medications, 1);
        assert!(done.imported.settings_restored);
        assert_eq!(done.reminders_armed, 1);
        assert!(center.is_enabled());
    }
}
