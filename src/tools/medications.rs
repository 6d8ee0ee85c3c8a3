//! Medication MCP Tools
//!
//! Tools for managing the medication schedule. Medications are soft-deleted
//! so their dose history stays intact.

use chrono::NaiveDate;
use serde::Serialize;

use super::require_text;
use crate::db::Database;
use crate::models::{Medication, MedicationCreate, MedicationUpdate, Schedule};
use crate::schedule::shows_on;

/// Medication summary for listing
#[derive(Debug, Serialize)]
pub struct MedicationSummary {
    pub id: i64,
    pub name: String,
    pub dose: String,
    pub scheduled_time: String,
    pub timing: String,
    pub schedule: String,
    pub is_active: bool,
    pub applies_today: bool,
}

impl MedicationSummary {
    fn new(med: &Medication, today: NaiveDate) -> Self {
        Self {
            id: med.id,
            name: med.name.clone(),
            dose: med.dose.clone(),
            scheduled_time: med.scheduled_time.to_string(),
            timing: med.timing.clone(),
            schedule: med.schedule.describe(),
            is_active: med.is_active,
            applies_today: med.is_active && shows_on(med, today),
        }
    }
}

/// Full medication detail
#[derive(Debug, Serialize)]
pub struct MedicationDetail {
    #[serde(flatten)]
    pub medication: Medication,
    pub schedule_description: String,
    pub applies_today: bool,
}

impl MedicationDetail {
    fn new(medication: Medication, today: NaiveDate) -> Self {
        Self {
            schedule_description: medication.schedule.describe(),
            applies_today: medication.is_active && shows_on(&medication, today),
            medication,
        }
    }
}

/// Response for list_medications
#[derive(Debug, Serialize)]
pub struct ListMedicationsResponse {
    pub medications: Vec<MedicationSummary>,
    pub total: usize,
    pub active_count: i64,
    pub inactive_count: i64,
}

fn check_schedule(schedule: &Schedule) -> Result<(), String> {
    match schedule {
        Schedule::Daily => Ok(()),
        Schedule::Monthly { day } if (1..=31).contains(day) => Ok(()),
        Schedule::Monthly { day } => Err(format!(
            "Monthly day must be between 1 and 31, got {}",
            day
        )),
    }
}

/// Longest post-dose wait accepted, in minutes
pub const MAX_WAIT_MINUTES: u32 = 24 * 60;

/// Post-dose wait in seconds from the minutes a client sends
pub fn wait_seconds(minutes: u32) -> Result<u32, String> {
    if minutes > MAX_WAIT_MINUTES {
        return Err(format!(
            "Wait must be at most {} minutes, got {}",
            MAX_WAIT_MINUTES, minutes
        ));
    }
    Ok(minutes * 60)
}

/// Add a new medication
pub fn add_medication(
    db: &Database,
    mut data: MedicationCreate,
    today: NaiveDate,
) -> Result<MedicationDetail, String> {
    data.name = require_text("Medication name", &data.name)?;
    data.dose = require_text("Dose", &data.dose)?;
    check_schedule(&data.schedule)?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let med = Medication::create(&conn, &data)
        .map_err(|e| format!("Failed to create medication: {}", e))?;

    tracing::info!(id = med.id, name = %med.name, time = %med.scheduled_time, "Medication added");
    Ok(MedicationDetail::new(med, today))
}

/// Get full details for a medication
pub fn get_medication(
    db: &Database,
    id: i64,
    today: NaiveDate,
) -> Result<Option<MedicationDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let med = Medication::get_by_id(&conn, id)
        .map_err(|e| format!("Failed to get medication: {}", e))?;

    Ok(med.map(|m| MedicationDetail::new(m, today)))
}

/// List medications
pub fn list_medications(
    db: &Database,
    active_only: bool,
    today: NaiveDate,
) -> Result<ListMedicationsResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let meds = Medication::list(&conn, active_only)
        .map_err(|e| format!("Failed to list medications: {}", e))?;

    let active_count = Medication::count(&conn, true)
        .map_err(|e| format!("Failed to count medications: {}", e))?;
    let total_count = Medication::count(&conn, false)
        .map_err(|e| format!("Failed to count medications: {}", e))?;

    let summaries: Vec<MedicationSummary> = meds
        .iter()
        .map(|m| MedicationSummary::new(m, today))
        .collect();
    let total = summaries.len();

    Ok(ListMedicationsResponse {
        medications: summaries,
        total,
        active_count,
        inactive_count: total_count - active_count,
    })
}

/// Update a medication
pub fn update_medication(
    db: &Database,
    id: i64,
    mut data: MedicationUpdate,
    today: NaiveDate,
) -> Result<MedicationDetail, String> {
    if let Some(ref name) = data.name {
        data.name = Some(require_text("Medication name", name)?);
    }
    if let Some(ref dose) = data.dose {
        data.dose = Some(require_text("Dose", dose)?);
    }
    if let Some(ref schedule) = data.schedule {
        check_schedule(schedule)?;
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let med = Medication::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update medication: {}", e))?
        .ok_or_else(|| format!("Medication not found with id: {}", id))?;

    tracing::info!(id, "Medication updated");
    Ok(MedicationDetail::new(med, today))
}

/// Soft delete (deactivate) a medication
pub fn deactivate_medication(
    db: &Database,
    id: i64,
    today: NaiveDate,
) -> Result<MedicationDetail, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let med = Medication::deactivate(&conn, id)
        .map_err(|e| format!("Failed to deactivate medication: {}", e))?
        .ok_or_else(|| format!("Medication not found with id: {}", id))?;

    tracing::info!(id, name = %med.name, "Medication deactivated");
    Ok(MedicationDetail::new(med, today))
}

/// Reactivate a previously deactivated medication
pub fn reactivate_medication(
    db: &Database,
    id: i64,
    today: NaiveDate,
) -> Result<MedicationDetail, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let existing = Medication::get_by_id(&conn, id)
        .map_err(|e| format!("Database error: {}", e))?
        .ok_or_else(|| format!("Medication not found with id: {}", id))?;

    if existing.is_active {
        return Err(format!("Medication '{}' is already active", existing.name));
    }

    let med = Medication::reactivate(&conn, id)
        .map_err(|e| format!("Failed to reactivate medication: {}", e))?
        .ok_or_else(|| format!("Medication not found with id: {}", id))?;

    Ok(MedicationDetail::new(med, today))
}
