//! Notification MCP Tools
//!
//! Permission handling, the in-process notification tray, and answering
//! reminders. Answers are written to the dose log.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::Database;
use crate::models::{AppSettings, DoseLog, NotificationPermission};
use crate::reminders::{
    DueMonitor, Notification, NotificationAction, NotificationCenter, ReminderMessage,
    ReminderScheduler,
};

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub permission: NotificationPermission,
    pub enabled: bool,
    /// Medication reminders armed for today
    pub reminders_armed: usize,
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub enabled: bool,
    pub count: usize,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct RespondResponse {
    pub tag: String,
    pub action: NotificationAction,
    /// Dose log entry written for the answer; `None` for generic reminders
    pub logged: Option<DoseLog>,
    pub snooze_minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RescheduleResponse {
    pub reminders_armed: usize,
    pub armed: Vec<String>,
}

/// Record the user's answer to the permission prompt
pub fn set_permission(
    db: &Database,
    center: &NotificationCenter,
    scheduler: &ReminderScheduler,
    granted: bool,
) -> Result<PermissionResponse, String> {
    let permission = if granted {
        NotificationPermission::Granted
    } else {
        NotificationPermission::Denied
    };

    db.with_conn(|conn| AppSettings::set_permission(conn, permission))
        .map_err(|e| format!("Failed to save permission: {}", e))?;
    center.set_enabled(granted);

    let reminders_armed = if granted {
        scheduler
            .schedule_all()
            .map_err(|e| format!("Failed to schedule reminders: {}", e))?
    } else {
        scheduler.stop_all();
        tracing::warn!("Notification permission denied, reminders disabled");
        0
    };

    tracing::info!(permission = permission.as_str(), reminders_armed, "Notification permission set");
    Ok(PermissionResponse {
        permission,
        enabled: center.is_enabled(),
        reminders_armed,
    })
}

/// Everything currently in the tray
pub fn list(center: &NotificationCenter) -> NotificationsResponse {
    let notifications = center.list();
    NotificationsResponse {
        enabled: center.is_enabled(),
        count: notifications.len(),
        notifications,
    }
}

/// Answer a notification by tag. Confirm logs the dose as taken, snooze
/// logs it as snoozed and re-notifies after the configured delay, dismiss
/// logs it as missed.
pub fn respond(
    db: &Database,
    center: &NotificationCenter,
    scheduler: &ReminderScheduler,
    monitor: &DueMonitor,
    tag: &str,
    action: &str,
    now: NaiveDateTime,
) -> Result<RespondResponse, String> {
    let action = NotificationAction::from_str(action).ok_or_else(|| {
        format!(
            "Unknown action '{}', expected confirm, snooze or dismiss",
            action
        )
    })?;

    let message = center.respond(tag, action).map_err(|e| e.to_string())?;
    let Some(message) = message else {
        return Ok(RespondResponse {
            tag: tag.to_string(),
            action,
            logged: None,
            snooze_minutes: None,
        });
    };

    let logged = super::doses::record_message(db, &message, now)?;

    let snooze_minutes = match &message {
        ReminderMessage::Snoozed(payload) => {
            let minutes = db
                .with_conn(AppSettings::get)
                .map_err(|e| format!("Database error: {}", e))?
                .snooze_minutes
                .max(1);
            let delay = std::time::Duration::from_secs(u64::from(minutes) * 60);
            scheduler.snooze(payload.clone(), delay);
            monitor.snooze(delay);
            Some(minutes)
        }
        ReminderMessage::Confirmed(payload) => {
            monitor.clear_snooze();
            scheduler
                .start_waits(&[payload.medication_id])
                .map_err(|e| format!("Failed to start post-dose wait: {}", e))?;
            None
        }
        ReminderMessage::Missed(_) => None,
    };

    Ok(RespondResponse {
        tag: tag.to_string(),
        action,
        logged: Some(logged),
        snooze_minutes,
    })
}

/// Re-run the daily scheduling pass
pub fn reschedule(
    db: &Database,
    scheduler: &ReminderScheduler,
) -> Result<RescheduleResponse, String> {
    let settings = db
        .with_conn(AppSettings::get)
        .map_err(|e| format!("Database error: {}", e))?;
    if settings.notification_permission != NotificationPermission::Granted {
        return Err("Notifications are not permitted; request permission first".to_string());
    }

    let reminders_armed = scheduler
        .schedule_all()
        .map_err(|e| format!("Failed to schedule reminders: {}", e))?;

    Ok(RescheduleResponse {
        reminders_armed,
        armed: scheduler.armed_keys(),
    })
}
