//! Utility to write a JSON backup of the database
//!
//! Usage: export_backup [OUTPUT_PATH]
//! Without a path the file is named `medtime-backup-<date>.json` in the
//! current directory.

use std::path::PathBuf;

use medtime::backup::BackupPayload;
use medtime::config;
use medtime::db::Database;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let db_path = config::database_path();
    if !db_path.exists() {
        return Err(format!("Database not found at {}", db_path.display()).into());
    }

    let database = Database::open(&db_path)?;
    let payload = BackupPayload::export(&database)?;

    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(BackupPayload::file_name(chrono::Local::now().date_naive()))
        });

    std::fs::write(&output, payload.to_json()?)?;

    println!("Backup written to {}", output.display());
    println!("  Medications: {}", payload.medications.len());
    println!("  Dose logs: {}", payload.logs.len());
    println!("  Blood sugar readings: {}", payload.blood_sugar.len());
    println!("  Medical reports: {}", payload.medical_reports.len());

    Ok(())
}
