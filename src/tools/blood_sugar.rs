//! Blood Sugar MCP Tools

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::backup::csv::{self, BloodSugarSummary};
use crate::db::Database;
use crate::models::{BloodSugarCreate, BloodSugarReading, GlucoseLevel, TimeOfDay};

/// A reading with its classification
#[derive(Debug, Serialize)]
pub struct ReadingView {
    #[serde(flatten)]
    pub reading: BloodSugarReading,
    pub level: GlucoseLevel,
    pub level_name: &'static str,
}

impl From<BloodSugarReading> for ReadingView {
    fn from(reading: BloodSugarReading) -> Self {
        let level = reading.level();
        Self {
            reading,
            level,
            level_name: level.display_name(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListReadingsResponse {
    pub readings: Vec<ReadingView>,
    pub total: usize,
    pub summary: Option<BloodSugarSummary>,
}

/// Log a reading; time and date default to now
pub fn add_reading(
    db: &Database,
    value: f64,
    time: Option<TimeOfDay>,
    date: Option<NaiveDate>,
    notes: Option<String>,
    now: NaiveDateTime,
) -> Result<ReadingView, String> {
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("Blood sugar value must be positive, got {}", value));
    }

    let data = BloodSugarCreate {
        value,
        time: time.unwrap_or_else(|| TimeOfDay::of(now)),
        date: date.unwrap_or_else(|| now.date()),
        notes: notes.filter(|n| !n.trim().is_empty()),
    };

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let reading = BloodSugarReading::create(&conn, &data)
        .map_err(|e| format!("Failed to save reading: {}", e))?;

    tracing::info!(id = reading.id, value, level = reading.level().display_name(), "Blood sugar logged");
    Ok(reading.into())
}

/// Readings newest first, optionally limited to the last `days` days
pub fn list_readings(
    db: &Database,
    days: Option<u32>,
    today: NaiveDate,
) -> Result<ListReadingsResponse, String> {
    let since = days.map(|d| {
        today
            .checked_sub_days(Days::new(u64::from(d)))
            .unwrap_or(NaiveDate::MIN)
    });

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let readings = BloodSugarReading::list(&conn, since)
        .map_err(|e| format!("Failed to list readings: {}", e))?;

    let refs: Vec<&BloodSugarReading> = readings.iter().collect();
    let from = since
        .or_else(|| readings.last().map(|r| r.date))
        .unwrap_or(today);
    let summary = BloodSugarSummary::compute(&refs, from, today);

    let total = readings.len();
    Ok(ListReadingsResponse {
        readings: readings.into_iter().map(ReadingView::from).collect(),
        total,
        summary,
    })
}

pub fn delete_reading(db: &Database, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    BloodSugarReading::delete(&conn, id).map_err(|e| format!("Failed to delete reading: {}", e))
}

/// Every reading as CSV
pub fn export_csv(db: &Database) -> Result<String, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let readings = BloodSugarReading::list(&conn, None)
        .map_err(|e| format!("Failed to list readings: {}", e))?;
    Ok(csv::blood_sugar(&readings))
}

/// Three-month report for the doctor
pub fn doctor_report(db: &Database, today: NaiveDate) -> Result<String, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let readings = BloodSugarReading::list(&conn, None)
        .map_err(|e| format!("Failed to list readings: {}", e))?;

    csv::blood_sugar_report(&readings, today)
        .ok_or_else(|| "No blood sugar readings in the last 3 months".to_string())
}
