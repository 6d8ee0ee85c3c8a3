//! Reminders
//!
//! Background timers for dose reminders, the in-process notification center,
//! and the poller that tracks which dose group is currently due.

mod monitor;
mod notifier;
mod recurring;
mod scheduler;

pub use monitor::{DueMonitor, MonitorState};
pub use notifier::{
    medication_tag, wait_tag, Notification, NotificationAction, NotificationCenter,
    NotificationPayload, Notifier, NotifyError, ReminderMessage, GENERIC_REMINDER_TAG,
};
pub use recurring::RecurringTask;
pub use scheduler::{next_fire_at, FireOutcome, ReminderScheduler};
