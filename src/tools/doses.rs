//! Dose MCP Tools
//!
//! Today's board and the confirm / snooze / missed / undo actions, plus dose
//! history and adherence statistics.

use std::time::Duration;

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::backup::csv;
use crate::db::Database;
use crate::models::{
    AdherenceStats, AppSettings, DoseLog, DoseLogCreate, DoseStatus, Medication, TimeOfDay,
};
use crate::reminders::{MonitorState, NotificationPayload, ReminderMessage};
use crate::schedule::{shows_on, TodayBoard};

/// Default history window in days
pub const DEFAULT_HISTORY_DAYS: u32 = 7;

/// Response for today
#[derive(Debug, Serialize)]
pub struct TodayResponse {
    #[serde(flatten)]
    pub board: TodayBoard,
    /// What the due monitor last saw
    pub alert: MonitorState,
}

/// Response for confirm / missed actions
#[derive(Debug, Serialize)]
pub struct DoseActionResponse {
    pub status: DoseStatus,
    pub logged: Vec<DoseLog>,
}

/// Response for snooze; the caller arms the re-notifications
#[derive(Debug, Serialize)]
pub struct SnoozeResponse {
    pub logged: Vec<DoseLog>,
    pub snooze_minutes: u32,
    pub remind_at: NaiveDateTime,
    #[serde(skip)]
    pub payloads: Vec<NotificationPayload>,
}

impl SnoozeResponse {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.snooze_minutes) * 60)
    }
}

#[derive(Debug, Serialize)]
pub struct UndoResponse {
    pub removed: Option<DoseLog>,
    /// Whether a `taken` entry still remains for that day
    pub still_taken: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub stats: AdherenceStats,
    pub logs: Vec<DoseLog>,
}

fn days_before(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Build today's board
pub fn today(db: &Database, alert: MonitorState, now: NaiveDateTime) -> Result<TodayResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let meds = Medication::list(&conn, true)
        .map_err(|e| format!("Failed to list medications: {}", e))?;
    let taken = DoseLog::taken_medication_ids(&conn, now.date())
        .map_err(|e| format!("Failed to load today's doses: {}", e))?;
    let settings = AppSettings::get(&conn).map_err(|e| format!("Database error: {}", e))?;

    Ok(TodayResponse {
        board: TodayBoard::build(&meds, &taken, now, settings.notification_permission),
        alert,
    })
}

/// Load and check the medications an action applies to
fn load_medications(conn: &rusqlite::Connection, ids: &[i64]) -> Result<Vec<Medication>, String> {
    if ids.is_empty() {
        return Err("At least one medication id is required".to_string());
    }

    ids.iter()
        .map(|&id| {
            Medication::get_by_id(conn, id)
                .map_err(|e| format!("Database error: {}", e))?
                .ok_or_else(|| format!("Medication not found with id: {}", id))
        })
        .collect()
}

fn log_status(
    db: &Database,
    ids: &[i64],
    status: DoseStatus,
    now: NaiveDateTime,
) -> Result<Vec<DoseLog>, String> {
    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let meds = load_medications(&conn, ids)?;

    let tx = conn
        .transaction()
        .map_err(|e| format!("Database error: {}", e))?;
    let mut logged = Vec::with_capacity(meds.len());
    for med in &meds {
        let entry = DoseLogCreate {
            medication_id: med.id,
            medication_name: med.name.clone(),
            scheduled_time: med.scheduled_time,
            status,
            notes: None,
        };
        logged.push(
            DoseLog::record(&tx, &entry, now).map_err(|e| format!("Failed to log dose: {}", e))?,
        );
    }
    tx.commit().map_err(|e| format!("Database error: {}", e))?;

    tracing::info!(count = logged.len(), status = status.as_str(), "Dose action logged");
    Ok(logged)
}

/// Mark one or more medications as taken now
pub fn confirm(db: &Database, ids: &[i64], now: NaiveDateTime) -> Result<DoseActionResponse, String> {
    Ok(DoseActionResponse {
        status: DoseStatus::Taken,
        logged: log_status(db, ids, DoseStatus::Taken, now)?,
    })
}

/// Ids of today's untaken medications scheduled at `time`
pub fn group_at(db: &Database, time: TimeOfDay, now: NaiveDateTime) -> Result<Vec<i64>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let date = now.date();

    let meds = Medication::list_at_time(&conn, time)
        .map_err(|e| format!("Failed to list medications: {}", e))?;
    let taken = DoseLog::taken_medication_ids(&conn, date)
        .map_err(|e| format!("Failed to load today's doses: {}", e))?;

    Ok(meds
        .iter()
        .filter(|m| shows_on(m, date) && !taken.contains(&m.id))
        .map(|m| m.id)
        .collect())
}

/// Confirm every untaken medication in the group at `time`
pub fn confirm_group(
    db: &Database,
    time: TimeOfDay,
    now: NaiveDateTime,
) -> Result<DoseActionResponse, String> {
    let ids = group_at(db, time, now)?;
    if ids.is_empty() {
        return Err(format!("Nothing left to take at {}", time));
    }
    confirm(db, &ids, now)
}

/// Log a snooze and work out when to remind again
pub fn snooze(db: &Database, ids: &[i64], now: NaiveDateTime) -> Result<SnoozeResponse, String> {
    let snooze_minutes = db
        .with_conn(AppSettings::get)
        .map_err(|e| format!("Database error: {}", e))?
        .snooze_minutes
        .max(1);

    let logged = log_status(db, ids, DoseStatus::Snoozed, now)?;
    let payloads = logged
        .iter()
        .map(|log| NotificationPayload {
            medication_id: log.medication_id,
            medication_name: log.medication_name.clone(),
            scheduled_time: log.scheduled_time,
        })
        .collect();

    Ok(SnoozeResponse {
        logged,
        snooze_minutes,
        remind_at: now + chrono::Duration::minutes(i64::from(snooze_minutes)),
        payloads,
    })
}

/// Mark one or more medications as missed
pub fn mark_missed(
    db: &Database,
    ids: &[i64],
    now: NaiveDateTime,
) -> Result<DoseActionResponse, String> {
    Ok(DoseActionResponse {
        status: DoseStatus::Missed,
        logged: log_status(db, ids, DoseStatus::Missed, now)?,
    })
}

/// Record the answer to a notification
pub fn record_message(
    db: &Database,
    message: &ReminderMessage,
    now: NaiveDateTime,
) -> Result<DoseLog, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    DoseLog::record(&conn, &message.to_dose_log(), now)
        .map_err(|e| format!("Failed to log dose: {}", e))
}

/// Remove the latest entry for a medication on a date
pub fn undo(db: &Database, medication_id: i64, date: NaiveDate) -> Result<UndoResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let removed = DoseLog::undo_latest(&conn, medication_id, date)
        .map_err(|e| format!("Failed to undo dose: {}", e))?;
    let still_taken = DoseLog::is_taken(&conn, medication_id, date)
        .map_err(|e| format!("Database error: {}", e))?;

    if let Some(ref log) = removed {
        tracing::info!(medication_id, id = log.id, status = log.status.as_str(), "Dose entry undone");
    }

    Ok(UndoResponse {
        removed,
        still_taken,
    })
}

/// Dose history for the last `days` days, newest first
pub fn history(db: &Database, days: u32, today: NaiveDate) -> Result<HistoryResponse, String> {
    let from = days_before(today, days);
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let logs = DoseLog::list_since(&conn, from)
        .map_err(|e| format!("Failed to load history: {}", e))?;
    let stats = DoseLog::stats_since(&conn, from)
        .map_err(|e| format!("Failed to compute statistics: {}", e))?;

    Ok(HistoryResponse {
        from,
        to: today,
        stats,
        logs,
    })
}

/// Adherence over the last week
pub fn week_stats(db: &Database, today: NaiveDate) -> Result<AdherenceStats, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    DoseLog::stats_since(&conn, days_before(today, DEFAULT_HISTORY_DAYS))
        .map_err(|e| format!("Failed to compute statistics: {}", e))
}

/// Dose history as CSV
pub fn export_history_csv(db: &Database, days: u32, today: NaiveDate) -> Result<String, String> {
    let history = history(db, days, today)?;
    Ok(csv::dose_history(&history.logs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;
    use crate::models::fixtures::daily;
    use crate::models::AppSettingsUpdate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 14)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn add(db: &Database, name: &str, hour: u32, minute: u32) -> Medication {
        db.with_conn(|conn| Medication::create(conn, &daily(name, hour, minute)))
            .unwrap()
    }

    #[test]
    fn test_undo_reverts_board() {
        let (_dir, db) = temp_database();
        let med = add(&db, "Metformin", 8, 0);

        confirm(&db, &[med.id], at(8, 3)).unwrap();
        confirm(&db, &[med.id], at(8, 4)).unwrap();
        let board = today(&db, MonitorState::default(), at(8, 5)).unwrap().board;
        assert_eq!(board.taken_count, 1);
        assert!(board.active.is_none());

        // Only the latest duplicate goes
        let undone = undo(&db, med.id, at(8, 5).date()).unwrap();
        assert!(undone.still_taken);

        let undone = undo(&db, med.id, at(8, 5).date()).unwrap();
        assert!(!undone.still_taken);
        let board = today(&db, MonitorState::default(), at(8, 5)).unwrap().board;
        assert_eq!(board.taken_count, 0);
        assert_eq!(board.active.unwrap().medication_ids(), vec![med.id]);
    }

    #[test]
    fn test_confirm_group_takes_whole_batch() {
        let (_dir, db) = temp_database();
        let a = add(&db, "Aspirin", 20, 0);
        let b = add(&db, "Lyrica", 20, 0);
        add(&db, "Madopar", 8, 0);

        let eight_pm = TimeOfDay::new(20, 0).unwrap();
        let done = confirm_group(&db, eight_pm, at(20, 2)).unwrap();
        let mut ids: Vec<i64> = done.logged.iter().map(|l| l.medication_id).collect();
        ids.sort();
        assert_eq!(ids, vec![a.id, b.id]);

        assert!(confirm_group(&db, eight_pm, at(20, 3)).is_err());
    }

    #[test]
    fn test_snooze_uses_configured_delay() {
        let (_dir, db) = temp_database();
        let med = add(&db, "Jardiance", 8, 0);
        db.with_conn(|conn| {
            AppSettings::update(
                conn,
                &AppSettingsUpdate {
                    snooze_minutes: Some(15),
                    ..Default::default()
                },
            )
        })
        .unwrap();

        let snoozed = snooze(&db, &[med.id], at(8, 1)).unwrap();
        assert_eq!(snoozed.snooze_minutes, 15);
        assert_eq!(snoozed.remind_at, at(8, 16));
        assert_eq!(snoozed.delay(), Duration::from_secs(900));
        assert_eq!(snoozed.payloads[0].medication_id, med.id);
        assert_eq!(snoozed.logged[0].status, DoseStatus::Snoozed);
    }

    #[test]
    fn test_unknown_medication_logs_nothing() {
        let (_dir, db) = temp_database();
        let med = add(&db, "Aspirin", 8, 0);
        assert!(confirm(&db, &[med.id, 404], at(8, 0)).is_err());
        assert!(confirm(&db, &[], at(8, 0)).is_err());

        let history = history(&db, 7, at(8, 0).date()).unwrap();
        assert!(history.logs.is_empty());
        assert_eq!(history.stats.compliance, 100);
    }

    #[test]
    fn test_history_and_week_stats() {
        let (_dir, db) = temp_database();
        let med = add(&db, "Aspirin", 8, 0);
        confirm(&db, &[med.id], at(8, 0)).unwrap();
        mark_missed(&db, &[med.id], at(9, 0)).unwrap();

        let stats = week_stats(&db, at(9, 0).date()).unwrap();
        assert_eq!(stats.taken, 1);
        assert_eq!(stats.missed, 1);
        assert_eq!(stats.compliance, 50);

        let csv = export_history_csv(&db, 7, at(9, 0).date()).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains("Missed"));
    }
}
