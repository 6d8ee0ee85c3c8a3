//! CSV exports for caregivers and doctors

use chrono::{Months, NaiveDate};

use crate::models::{BloodSugarReading, DoseLog, GlucoseLevel};

const LINE_END: &str = "\n";

/// Quote a field when it contains a delimiter, quote or line break
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn row(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Dose history, in the order given
pub fn dose_history(logs: &[DoseLog]) -> String {
    let mut out = String::from("Date,Medication,Scheduled Time,Taken Time,Status");
    out.push_str(LINE_END);

    for log in logs {
        let taken = log
            .taken_time
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&row(&[
            log.date.to_string(),
            log.medication_name.clone(),
            log.scheduled_time.to_string(),
            taken,
            log.status.display_name().to_string(),
        ]));
        out.push_str(LINE_END);
    }
    out
}

fn newest_first(readings: &[BloodSugarReading]) -> Vec<&BloodSugarReading> {
    let mut sorted: Vec<&BloodSugarReading> = readings.iter().collect();
    sorted.sort_by(|a, b| (b.date, b.time, b.id).cmp(&(a.date, a.time, a.id)));
    sorted
}

fn reading_rows(out: &mut String, readings: &[&BloodSugarReading]) {
    out.push_str("Date,Time,Value (mmol/L),Notes,Status");
    out.push_str(LINE_END);
    for reading in readings {
        let notes = reading
            .notes
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("-");
        out.push_str(&row(&[
            reading.date.to_string(),
            reading.time.to_string(),
            reading.value.to_string(),
            notes.to_string(),
            reading.level().display_name().to_string(),
        ]));
        out.push_str(LINE_END);
    }
}

/// Every reading, newest first
pub fn blood_sugar(readings: &[BloodSugarReading]) -> String {
    let mut out = String::new();
    reading_rows(&mut out, &newest_first(readings));
    out
}

/// Summary of the readings in a report window
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BloodSugarSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    /// (level, count) for every level, low to high
    pub levels: Vec<(GlucoseLevel, usize)>,
}

impl BloodSugarSummary {
    /// `None` when no reading falls in the window
    pub fn compute(readings: &[&BloodSugarReading], from: NaiveDate, to: NaiveDate) -> Option<Self> {
        if readings.is_empty() {
            return None;
        }

        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
        let count = values.len();
        let average = values.iter().sum::<f64>() / count as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let levels = GlucoseLevel::ALL
            .iter()
            .map(|level| {
                let n = readings.iter().filter(|r| r.level() == *level).count();
                (*level, n)
            })
            .collect();

        Some(Self {
            from,
            to,
            count,
            average,
            min,
            max,
            levels,
        })
    }

    pub fn share(&self, count: usize) -> f64 {
        count as f64 / self.count as f64 * 100.0
    }
}

/// Doctor's report covering the three months up to `today`: summary block,
/// blank line, then the readings newest first. `None` when there is nothing
/// in the window.
pub fn blood_sugar_report(readings: &[BloodSugarReading], today: NaiveDate) -> Option<String> {
    let from = today.checked_sub_months(Months::new(3)).unwrap_or(today);
    let in_window: Vec<&BloodSugarReading> = newest_first(readings)
        .into_iter()
        .filter(|r| r.date >= from && r.date <= today)
        .collect();

    let summary = BloodSugarSummary::compute(&in_window, from, today)?;

    let mut out = String::new();
    let mut line = |text: String| {
        out.push_str(&text);
        out.push_str(LINE_END);
    };
    line("BLOOD SUGAR REPORT - LAST 3 MONTHS".to_string());
    line(format!("Period: {} to {}", summary.from, summary.to));
    line(format!("Readings: {}", summary.count));
    line(format!("Average: {:.1} mmol/L", summary.average));
    line(format!("Range: {:.1} - {:.1} mmol/L", summary.min, summary.max));
    line(String::new());
    line("STATISTICS:".to_string());
    for (level, n) in &summary.levels {
        let band = match level {
            GlucoseLevel::Low => "< 4.0",
            GlucoseLevel::Normal => "4.0-7.0",
            GlucoseLevel::SlightlyHigh => "7.0-10.0",
            GlucoseLevel::High => ">= 10.0",
        };
        line(format!(
            "{} ({}): {} ({:.1}%)",
            level.display_name(),
            band,
            n,
            summary.share(*n)
        ));
    }
    line(String::new());

    reading_rows(&mut out, &in_window);
    Some(out)
}
