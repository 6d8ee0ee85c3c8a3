//! Local notification facility
//!
//! `NotificationCenter` keeps the currently shown notifications in memory. A
//! notification with an existing tag replaces the old one. Answering a
//! notification removes it and turns it into a `ReminderMessage`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DoseLogCreate, DoseStatus, Medication, TimeOfDay};

/// Tag of the generic "check your schedule" notification
pub const GENERIC_REMINDER_TAG: &str = "medication-reminder";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Notifications are not permitted")]
    Disabled,

    #[error("No notification with tag '{0}'")]
    NotFound(String),
}

/// The medication a reminder is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub medication_id: i64,
    pub medication_name: String,
    pub scheduled_time: TimeOfDay,
}

impl NotificationPayload {
    pub fn for_medication(med: &Medication) -> Self {
        Self {
            medication_id: med.id,
            medication_name: med.name.clone(),
            scheduled_time: med.scheduled_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    Confirm,
    Snooze,
    Dismiss,
}

impl NotificationAction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "confirm" | "taken" => Some(NotificationAction::Confirm),
            "snooze" => Some(NotificationAction::Snooze),
            "dismiss" | "close" => Some(NotificationAction::Dismiss),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Assigned by the center when shown
    pub id: u64,
    pub title: String,
    pub body: String,
    pub tag: String,
    pub payload: Option<NotificationPayload>,
    pub actions: Vec<NotificationAction>,
    pub require_interaction: bool,
    pub shown_at: Option<NaiveDateTime>,
}

impl Notification {
    /// Reminder for one dose, tagged per medication
    pub fn dose_reminder(med: &Medication) -> Self {
        let mut body = format!("{} {}", med.name, med.dose);
        if !med.timing.is_empty() {
            body.push('\n');
            body.push_str(&med.timing);
        }
        Self {
            id: 0,
            title: "Time for your medication".to_string(),
            body,
            tag: medication_tag(med.id),
            payload: Some(NotificationPayload::for_medication(med)),
            actions: vec![NotificationAction::Confirm, NotificationAction::Snooze],
            require_interaction: true,
            shown_at: None,
        }
    }

    /// Re-notification after a snooze
    pub fn snooze_reminder(payload: NotificationPayload) -> Self {
        Self {
            id: 0,
            title: "Reminder: medication".to_string(),
            body: format!(
                "{}\nScheduled: {}",
                payload.medication_name, payload.scheduled_time
            ),
            tag: medication_tag(payload.medication_id),
            payload: Some(payload),
            actions: vec![NotificationAction::Confirm, NotificationAction::Snooze],
            require_interaction: true,
            shown_at: None,
        }
    }

    /// End of the post-dose wait of a medication
    pub fn wait_over(med: &Medication, wait_secs: u32) -> Self {
        Self {
            id: 0,
            title: "Waiting time is over".to_string(),
            body: format!("{} was taken {} minutes ago", med.name, wait_secs / 60),
            tag: wait_tag(med.id),
            payload: None,
            actions: Vec::new(),
            require_interaction: false,
            shown_at: None,
        }
    }

    pub fn generic_reminder() -> Self {
        Self {
            id: 0,
            title: "Medication time".to_string(),
            body: "Check today's medication schedule".to_string(),
            tag: GENERIC_REMINDER_TAG.to_string(),
            payload: None,
            actions: Vec::new(),
            require_interaction: false,
            shown_at: None,
        }
    }
}

pub fn medication_tag(medication_id: i64) -> String {
    format!("medication-{}", medication_id)
}

pub fn wait_tag(medication_id: i64) -> String {
    format!("wait-{}", medication_id)
}

/// Answer to a dose notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderMessage {
    Confirmed(NotificationPayload),
    Snoozed(NotificationPayload),
    Missed(NotificationPayload),
}

impl ReminderMessage {
    pub fn payload(&self) -> &NotificationPayload {
        match self {
            ReminderMessage::Confirmed(p)
            | ReminderMessage::Snoozed(p)
            | ReminderMessage::Missed(p) => p,
        }
    }

    pub fn status(&self) -> DoseStatus {
        match self {
            ReminderMessage::Confirmed(_) => DoseStatus::Taken,
            ReminderMessage::Snoozed(_) => DoseStatus::Snoozed,
            ReminderMessage::Missed(_) => DoseStatus::Missed,
        }
    }

    /// The dose log entry this answer records
    pub fn to_dose_log(&self) -> DoseLogCreate {
        let payload = self.payload();
        DoseLogCreate {
            medication_id: payload.medication_id,
            medication_name: payload.medication_name.clone(),
            scheduled_time: payload.scheduled_time,
            status: self.status(),
            notes: None,
        }
    }
}

/// Something that can display a notification
pub trait Notifier: Send + Sync {
    fn show(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// In-process notification tray
pub struct NotificationCenter {
    shown: Mutex<Vec<Notification>>,
    enabled: AtomicBool,
    next_id: AtomicU64,
}

impl NotificationCenter {
    pub fn new(enabled: bool) -> Self {
        Self {
            shown: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(enabled),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Disabling also clears everything currently shown
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.clear_all();
        }
    }

    pub fn list(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    pub fn get(&self, tag: &str) -> Option<Notification> {
        self.lock().iter().find(|n| n.tag == tag).cloned()
    }

    /// Remove a notification without answering it
    pub fn clear(&self, tag: &str) -> bool {
        let mut shown = self.lock();
        let before = shown.len();
        shown.retain(|n| n.tag != tag);
        shown.len() != before
    }

    pub fn clear_all(&self) {
        self.lock().clear();
    }

    /// Answer a notification. Generic reminders carry no dose, so answering
    /// them only closes them and yields `None`.
    pub fn respond(
        &self,
        tag: &str,
        action: NotificationAction,
    ) -> Result<Option<ReminderMessage>, NotifyError> {
        let notification = {
            let mut shown = self.lock();
            let index = shown
                .iter()
                .position(|n| n.tag == tag)
                .ok_or_else(|| NotifyError::NotFound(tag.to_string()))?;
            shown.remove(index)
        };

        let Some(payload) = notification.payload else {
            return Ok(None);
        };

        let message = match action {
            NotificationAction::Confirm => ReminderMessage::Confirmed(payload),
            NotificationAction::Snooze => ReminderMessage::Snoozed(payload),
            NotificationAction::Dismiss => ReminderMessage::Missed(payload),
        };
        tracing::debug!(tag, ?action, "Notification answered");
        Ok(Some(message))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Notifier for NotificationCenter {
    fn show(&self, mut notification: Notification) -> Result<(), NotifyError> {
        if !self.is_enabled() {
            return Err(NotifyError::Disabled);
        }

        notification.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        // Timers stamp their own clock; direct callers get local time
        if notification.shown_at.is_none() {
            notification.shown_at = Some(chrono::Local::now().naive_local());
        }

        tracing::info!(tag = %notification.tag, title = %notification.title, "Showing notification");
        let mut shown = self.lock();
        shown.retain(|n| n.tag != notification.tag);
        shown.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn med(id: i64) -> Medication {
        Medication {
            id,
            name: "Lyrica".to_string(),
            dose: "75mg".to_string(),
            scheduled_time: TimeOfDay::new(21, 0).unwrap(),
            timing: "before bed".to_string(),
            is_active: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_same_tag_replaces() {
        let center = NotificationCenter::new(true);
        center.show(Notification::dose_reminder(&med(4))).unwrap();
        center
            .show(Notification::snooze_reminder(NotificationPayload::for_medication(&med(4))))
            .unwrap();
        center.show(Notification::dose_reminder(&med(5))).unwrap();

        let shown = center.list();
        assert_eq!(shown.len(), 2);
        assert_eq!(center.get(&medication_tag(4)).unwrap().title, "Reminder: medication");
    }

    #[test]
    fn test_disabled_center_refuses() {
        let center = NotificationCenter::new(false);
        assert_eq!(
            center.show(Notification::generic_reminder()),
            Err(NotifyError::Disabled)
        );
        assert!(center.list().is_empty());
    }

    #[test]
    fn test_respond_maps_actions() {
        let center = NotificationCenter::new(true);
        let tag = medication_tag(4);

        center.show(Notification::dose_reminder(&med(4))).unwrap();
        let msg = center.respond(&tag, NotificationAction::Dismiss).unwrap().unwrap();
        assert_eq!(msg.status(), DoseStatus::Missed);
        assert!(center.get(&tag).is_none());

        center.show(Notification::dose_reminder(&med(4))).unwrap();
        let msg = center.respond(&tag, NotificationAction::Confirm).unwrap().unwrap();
        let log = msg.to_dose_log();
        assert_eq!(log.status, DoseStatus::Taken);
        assert_eq!(log.medication_id, 4);
        assert_eq!(log.scheduled_time.to_string(), "21:00");

        assert!(matches!(
            center.respond(&tag, NotificationAction::Snooze),
            Err(NotifyError::NotFound(_))
        ));
    }

    #[test]
    fn test_generic_reminder_has_no_message() {
        let center = NotificationCenter::new(true);
        center.show(Notification::generic_reminder()).unwrap();
        assert_eq!(
            center
                .respond(GENERIC_REMINDER_TAG, NotificationAction::Dismiss)
                .unwrap(),
            None
        );
    }
}
