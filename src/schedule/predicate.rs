//! Which medications apply on a given date

use chrono::{Datelike, NaiveDate};

use crate::models::{Medication, Schedule};

/// Whether `med` applies on `date`.
///
/// Nothing applies before its start date. Monthly medications apply only on
/// their day of the month, so day 31 never applies in a 30-day month.
pub fn shows_on(med: &Medication, date: NaiveDate) -> bool {
    if let Some(start) = med.start_date {
        if date < start {
            return false;
        }
    }

    match med.schedule {
        Schedule::Daily => true,
        Schedule::Monthly { day } => date.day() == day,
    }
}

/// Active medications that apply on `date`, keeping input order
pub fn applicable_on(meds: &[Medication], date: NaiveDate) -> Vec<&Medication> {
    meds.iter()
        .filter(|m| m.is_active && shows_on(m, date))
        .collect()
}
