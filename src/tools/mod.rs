//! Medtime tools module
//!
//! Validation and response shaping behind each MCP tool. Functions take the
//! current instant as an argument so they can be exercised at fixed times.

pub mod appointments;
pub mod backup;
pub mod blood_sugar;
pub mod contacts;
pub mod diary;
pub mod doses;
pub mod medications;
pub mod notifications;
pub mod reports;
pub mod settings;
pub mod status;
pub mod stock;

use chrono::NaiveDate;

use crate::models::TimeOfDay;

/// Parse a `YYYY-MM-DD` argument
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}', expected YYYY-MM-DD", value))
}

/// Parse an optional date argument, falling back to `default`
pub fn parse_date_or(value: Option<&str>, default: NaiveDate) -> Result<NaiveDate, String> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_date(v),
        _ => Ok(default),
    }
}

/// Parse an `HH:MM` argument
pub fn parse_time(value: &str) -> Result<TimeOfDay, String> {
    value.parse::<TimeOfDay>().map_err(|e| e.to_string())
}

/// Reject blank required text
pub fn require_text(field: &str, value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(format!("{} cannot be empty", field))
    } else {
        Ok(trimmed.to_string())
    }
}
