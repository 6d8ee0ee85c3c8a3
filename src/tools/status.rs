//! Medtime Status Tool
//!
//! Provides runtime status information about the Medtime service.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;
use crate::reminders::{DueMonitor, NotificationCenter, ReminderScheduler};

/// Usage guide for AI assistants
pub const INSTRUCTIONS: &str = r#"
# Medtime Instructions

Medtime keeps a fixed medication schedule for one person, reminds them when a
dose is due, and records what was actually taken.

## Key Concepts

### Schedule
- Every medication has one `scheduled_time` (HH:MM, 24h)
- `frequency` is `daily` or `monthly`; monthly medications need `monthly_day` (1-31)
- A monthly day past the end of a short month is skipped that month
- `start_date` (optional) hides the medication before that date

### Due Window
- A dose is **active** from 5 minutes before to 30 minutes after its time
- Before that it is **upcoming**, after that **overdue**
- A dose logged as taken today drops out of all three
- Medications sharing a time form one group; `confirm_group` takes them all

### Deactivate, don't delete
- `deactivate_medication` hides a medication but keeps its dose history
- `reactivate_medication` brings it back

## Daily Workflow

1. `get_today` - see the active group, what is overdue, upcoming and taken
2. When the user takes a dose: `confirm_doses(medication_ids: [..])`
   or `confirm_group(time: "08:00")`
3. "Remind me later": `snooze_doses(medication_ids: [..])`; the reminder
   comes back after the configured snooze minutes
4. Skipped: `mark_missed(medication_ids: [..])`
5. Logged by mistake: `undo_dose(medication_id)` removes the latest entry for today

## Reminders

- Call `set_notification_permission(granted: true)` once; reminders are then
  armed for every medication that applies today
- `list_notifications` shows what is currently in the tray
- Answer with `respond_to_notification(tag, action)` where action is
  `confirm`, `snooze` or `dismiss` (dismiss logs the dose as missed)
- Adding or editing a medication re-arms its reminder right away
- Reminders are armed for the medications that apply today; just after
  midnight the ones that start applying that day (monthly day, start date)
  are armed too
- `reschedule_reminders` re-runs the whole pass
- Medications with a post-dose wait get a "Waiting time is over"
  notification (tag `wait-<id>`) once the wait after confirming has passed

## Records

- Blood sugar (mmol/L): `add_blood_sugar`, `list_blood_sugar`,
  `export_blood_sugar_csv`, `blood_sugar_report` (last 3 months, for the doctor)
  - < 4.0 Low, 4.0-7.0 Normal, 7.0-10.0 Slightly high, >= 10.0 High
- Medical reports (base64 files up to 5 MB): `add_report`, `list_reports`, `get_report`
- Emergency contacts, doctor appointments, medication stock, health diary
- `dose_history` and `week_stats` for adherence; `export_dose_history_csv` for caregivers

## Backup

- `export_backup` dumps everything as JSON
- `import_backup(json, confirm: true)` **replaces all data**; always ask the user first
"#;

/// Reminder machinery as seen by the status tool
#[derive(Debug, Serialize)]
pub struct ReminderStatus {
    pub notifications_enabled: bool,
    pub notifications_shown: usize,
    pub armed_reminders: usize,
    pub timers: Vec<String>,
    pub due_monitor_running: bool,
}

impl ReminderStatus {
    pub fn collect(
        center: &NotificationCenter,
        scheduler: &ReminderScheduler,
        monitor: &DueMonitor,
    ) -> Self {
        Self {
            notifications_enabled: center.is_enabled(),
            notifications_shown: center.list().len(),
            armed_reminders: scheduler.armed_count(),
            timers: scheduler.armed_keys(),
            due_monitor_running: monitor.is_running(),
        }
    }
}

/// Runtime status of the Medtime service
#[derive(Debug, Serialize)]
pub struct MedtimeStatus {
    // Build info
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    // Database info
    pub database_path: String,
    pub database_size_bytes: Option<u64>,

    // Runtime info
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,

    pub reminders: ReminderStatus,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
}

impl StatusTracker {
    /// Create a new status tracker
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
        }
    }

    /// Get the current status
    pub fn get_status(&self, reminders: ReminderStatus) -> MedtimeStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        MedtimeStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
            reminders,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::db::test_support::temp_database;
    use crate::reminders::Notifier;

    #[tokio::test]
    async fn test_status_reports_database_and_reminders() {
        let (dir, db) = temp_database();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at((2026, 10, 14), 9, 0));
        let center = Arc::new(NotificationCenter::new(true));
        let scheduler = ReminderScheduler::new(db.clone(), center.clone() as Arc<dyn Notifier>, clock.clone());
        let monitor = DueMonitor::new(db, clock);

        let tracker = StatusTracker::new(dir.path().join("medtime-test.db"));
        let status = tracker.get_status(ReminderStatus::collect(&center, &scheduler, &monitor));

        assert_eq!(status.process_id, std::process::id());
        assert!(status.database_size_bytes.is_some());
        assert!(status.reminders.notifications_enabled);
        assert_eq!(status.reminders.armed_reminders, 0);
        assert!(!status.reminders.due_monitor_running);
    }

    #[test]
    fn test_instructions_name_real_tools() {
        for tool in ["get_today", "confirm_doses", "respond_to_notification", "import_backup"] {
            assert!(INSTRUCTIONS.contains(tool), "missing {}", tool);
        }
    }
}
