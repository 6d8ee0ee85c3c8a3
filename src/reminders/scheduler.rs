//! Local reminder scheduler
//!
//! One timer per medication: sleep until the next HH:MM, show the reminder if
//! the medication still applies and is not yet taken that day, then sleep
//! until the same time on the next day. A rollover task arms, at each
//! midnight, the medications that only start applying that day. Timers only
//! live as long as the process; the scheduling pass runs again on startup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{Days, NaiveDate, NaiveDateTime};

use super::notifier::{Notification, NotificationPayload, Notifier, NotifyError};
use super::recurring::RecurringTask;
use crate::clock::Clock;
use crate::db::{Database, DbResult};
use crate::models::{DoseLog, Medication, TimeOfDay};
use crate::schedule::shows_on;

const PERIODIC_KEY: &str = "periodic-check";
const ROLLOVER_KEY: &str = "day-rollover";
const REMINDER_PREFIX: &str = "medication-";

fn reminder_key(medication_id: i64) -> String {
    format!("{}{}", REMINDER_PREFIX, medication_id)
}

fn snooze_key(medication_id: i64) -> String {
    format!("snooze-{}", medication_id)
}

fn wait_key(medication_id: i64) -> String {
    format!("wait-{}", medication_id)
}

/// Next instant strictly after `now` at `time`: today if still ahead,
/// otherwise tomorrow
pub fn next_fire_at(now: NaiveDateTime, time: TimeOfDay) -> NaiveDateTime {
    let today = time.on(now.date());
    if today > now {
        today
    } else {
        let tomorrow = now
            .date()
            .checked_add_days(Days::new(1))
            .unwrap_or(NaiveDate::MAX);
        time.on(tomorrow)
    }
}

fn delay_until(now: NaiveDateTime, target: NaiveDateTime) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// What happened when a timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    Notified,
    /// Not applicable that day, inactive, or already taken
    Skipped,
}

type TaskTable = Mutex<HashMap<String, RecurringTask>>;

fn lock_table(table: &TaskTable) -> MutexGuard<'_, HashMap<String, RecurringTask>> {
    table.lock().unwrap_or_else(|e| e.into_inner())
}

/// Shared pieces each timer task needs
#[derive(Clone)]
struct FireContext {
    db: Database,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl FireContext {
    /// Re-read the medication and show its reminder if it is still due on `date`
    fn fire(&self, medication_id: i64, date: NaiveDate) -> DbResult<FireOutcome> {
        let conn = self.db.get_conn()?;
        let Some(med) = Medication::get_by_id(&conn, medication_id)? else {
            return Ok(FireOutcome::Skipped);
        };

        if !med.is_active || !shows_on(&med, date) {
            return Ok(FireOutcome::Skipped);
        }
        if DoseLog::is_taken(&conn, medication_id, date)? {
            return Ok(FireOutcome::Skipped);
        }

        Ok(self.show(Notification::dose_reminder(&med)))
    }

    /// Show the snoozed reminder again unless the dose was taken meanwhile
    fn fire_snoozed(&self, payload: NotificationPayload) -> DbResult<FireOutcome> {
        let date = self.clock.now().date();
        let taken = self
            .db
            .with_conn(|conn| DoseLog::is_taken(conn, payload.medication_id, date))?;
        if taken {
            return Ok(FireOutcome::Skipped);
        }
        Ok(self.show(Notification::snooze_reminder(payload)))
    }

    fn show(&self, mut notification: Notification) -> FireOutcome {
        notification.shown_at = Some(self.clock.now());
        match self.notifier.show(notification) {
            Ok(()) => FireOutcome::Notified,
            Err(NotifyError::Disabled) => {
                tracing::debug!("Notifications disabled, reminder dropped");
                FireOutcome::Skipped
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to show reminder");
                FireOutcome::Skipped
            }
        }
    }

    /// Daily timer for one medication
    fn arm_reminder(&self, med: &Medication) -> RecurringTask {
        let ctx = self.clone();
        let medication_id = med.id;
        let time = med.scheduled_time;

        RecurringTask::spawn(reminder_key(medication_id), async move {
            loop {
                let now = ctx.clock.now();
                let target = next_fire_at(now, time);
                tracing::debug!(medication_id, %target, "Reminder armed");
                tokio::time::sleep(delay_until(now, target)).await;

                let fired_on = ctx.clock.now().date();
                match ctx.fire(medication_id, fired_on) {
                    Ok(FireOutcome::Notified) => {
                        tracing::debug!(medication_id, "Reminder shown")
                    }
                    Ok(FireOutcome::Skipped) => {
                        tracing::debug!(medication_id, "Reminder skipped")
                    }
                    Err(e) => {
                        tracing::error!(medication_id, error = %e, "Reminder check failed")
                    }
                }
            }
        })
    }

    /// Arm the medications that apply on `date` and have no timer yet
    fn arm_missing(&self, table: &TaskTable, date: NaiveDate) -> DbResult<usize> {
        let meds = self.db.with_conn(|conn| Medication::list(conn, true))?;
        let mut tasks = lock_table(table);
        let mut armed = 0;
        for med in meds.iter().filter(|m| shows_on(m, date)) {
            if tasks.contains_key(&reminder_key(med.id)) {
                continue;
            }
            let task = self.arm_reminder(med);
            tasks.insert(task.name().to_string(), task);
            armed += 1;
        }
        Ok(armed)
    }

    /// Wakes at every midnight and arms what starts applying that day.
    /// Holds the table weakly so dropping the scheduler ends it.
    fn day_rollover(&self, table: Weak<TaskTable>) -> RecurringTask {
        let ctx = self.clone();
        RecurringTask::spawn(ROLLOVER_KEY, async move {
            loop {
                let now = ctx.clock.now();
                let target = next_fire_at(now, TimeOfDay::MIDNIGHT);
                tokio::time::sleep(delay_until(now, target)).await;

                let Some(table) = table.upgrade() else {
                    return;
                };
                let today = ctx.clock.now().date();
                match ctx.arm_missing(&table, today) {
                    Ok(armed) => tracing::info!(%today, armed, "New day, reminders armed"),
                    Err(e) => tracing::error!(error = %e, "Day rollover failed"),
                }
            }
        })
    }
}

/// Owns every armed reminder timer
pub struct ReminderScheduler {
    ctx: FireContext,
    tasks: Arc<TaskTable>,
}

impl ReminderScheduler {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ctx: FireContext {
                db,
                notifier,
                clock,
            },
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Arm a reminder for every active medication that applies today and
    /// start the midnight rollover. Previously armed medication reminders
    /// are stopped first.
    pub fn schedule_all(&self) -> DbResult<usize> {
        let today = self.ctx.clock.now().date();

        self.tasks().retain(|key, _| !key.starts_with(REMINDER_PREFIX));
        let armed = self.ctx.arm_missing(&self.tasks, today)?;

        let mut tasks = self.tasks();
        if !tasks.contains_key(ROLLOVER_KEY) {
            let rollover = self.ctx.day_rollover(Arc::downgrade(&self.tasks));
            tasks.insert(ROLLOVER_KEY.to_string(), rollover);
        }

        tracing::info!(armed, "Scheduled medication reminders");
        Ok(armed)
    }

    /// Bring one medication's timer in line with its stored row: the old
    /// timer stops, and a new one is armed if the medication is active and
    /// applies today. Returns whether a timer is armed.
    pub fn rearm(&self, med: &Medication) -> bool {
        let today = self.ctx.clock.now().date();
        let mut tasks = self.tasks();
        tasks.remove(&reminder_key(med.id));
        if !med.is_active || !shows_on(med, today) {
            return false;
        }

        let task = self.ctx.arm_reminder(med);
        tasks.insert(task.name().to_string(), task);
        tracing::debug!(medication_id = med.id, time = %med.scheduled_time, "Reminder re-armed");
        true
    }

    /// Stop the reminder, pending snooze and post-dose wait of a medication
    pub fn cancel(&self, medication_id: i64) {
        let mut tasks = self.tasks();
        tasks.remove(&reminder_key(medication_id));
        tasks.remove(&snooze_key(medication_id));
        tasks.remove(&wait_key(medication_id));
    }

    /// Show the reminder again after `delay` unless it gets taken first
    pub fn snooze(&self, payload: NotificationPayload, delay: Duration) {
        let ctx = self.ctx.clone();
        let medication_id = payload.medication_id;

        let task = RecurringTask::spawn(snooze_key(medication_id), async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = ctx.fire_snoozed(payload) {
                tracing::error!(medication_id, error = %e, "Snoozed reminder check failed");
            }
        });

        self.insert(task);
    }

    /// Start the post-dose wait of every given medication that has one.
    /// Returns how many waits were started.
    pub fn start_waits(&self, medication_ids: &[i64]) -> DbResult<usize> {
        let meds = self.ctx.db.with_conn(|conn| {
            medication_ids
                .iter()
                .filter_map(|id| Medication::get_by_id(conn, *id).transpose())
                .collect::<DbResult<Vec<_>>>()
        })?;

        let mut started = 0;
        for med in &meds {
            let Some(secs) = med.special_timer_secs.filter(|s| *s > 0) else {
                continue;
            };
            let ctx = self.ctx.clone();
            let notification = Notification::wait_over(med, secs);
            let medication_id = med.id;

            let task = RecurringTask::spawn(wait_key(medication_id), async move {
                tokio::time::sleep(Duration::from_secs(u64::from(secs))).await;
                ctx.show(notification);
                tracing::debug!(medication_id, "Post-dose wait over");
            });
            self.insert(task);
            started += 1;
        }
        Ok(started)
    }

    /// Generic "check your schedule" reminder every `interval`
    pub fn start_periodic_check(&self, interval: Duration) {
        let ctx = self.ctx.clone();
        let task = RecurringTask::spawn(PERIODIC_KEY, async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                ctx.show(Notification::generic_reminder());
            }
        });
        self.insert(task);
        tracing::info!(interval_secs = interval.as_secs(), "Periodic schedule check enabled");
    }

    pub fn stop_all(&self) {
        let mut tasks = self.tasks();
        let count = tasks.len();
        tasks.clear();
        tracing::info!(count, "Stopped all reminder timers");
    }

    /// Number of armed daily medication reminders
    pub fn armed_count(&self) -> usize {
        self.tasks()
            .values()
            .filter(|t| t.name().starts_with(REMINDER_PREFIX) && t.is_running())
            .count()
    }

    /// Names of every live timer, sorted
    pub fn armed_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .tasks()
            .values()
            .filter(|t| t.is_running())
            .map(|t| t.name().to_string())
            .collect();
        keys.sort();
        keys
    }

    fn insert(&self, task: RecurringTask) {
        // Replacing drops, and so stops, the previous task under this key
        self.tasks().insert(task.name().to_string(), task);
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, RecurringTask>> {
        lock_table(&self.tasks)
    }
}
