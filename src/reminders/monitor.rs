//! Due monitor
//!
//! Re-evaluates the day's board on a fixed poll interval and remembers the
//! active dose group. Snoozing suppresses the active alert until the snooze
//! runs out; the next poll after that picks it up again.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::recurring::RecurringTask;
use crate::clock::Clock;
use crate::db::{Database, DbResult};
use crate::models::{AppSettings, DoseLog, Medication};
use crate::schedule::{DoseGroup, TodayBoard};

#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorState {
    pub active: Option<DoseGroup>,
    pub snoozed_until: Option<NaiveDateTime>,
    pub last_checked: Option<NaiveDateTime>,
}

struct MonitorInner {
    db: Database,
    clock: Arc<dyn Clock>,
    state: Mutex<MonitorState>,
}

impl MonitorInner {
    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn board(&self, now: NaiveDateTime) -> DbResult<TodayBoard> {
        self.db.with_conn(|conn| {
            let meds = Medication::list(conn, true)?;
            let taken = DoseLog::taken_medication_ids(conn, now.date())?;
            let settings = AppSettings::get(conn)?;
            Ok(TodayBoard::build(
                &meds,
                &taken,
                now,
                settings.notification_permission,
            ))
        })
    }

    fn check(&self) -> DbResult<Option<DoseGroup>> {
        let now = self.clock.now();
        let board = self.board(now)?;

        let mut state = self.state();
        state.last_checked = Some(now);

        if let Some(until) = state.snoozed_until {
            if now < until {
                state.active = None;
                return Ok(None);
            }
            state.snoozed_until = None;
        }

        let previous = state.active.as_ref().map(|g| g.medication_ids());
        let current = board.active.as_ref().map(|g| g.medication_ids());
        if previous != current {
            match &board.active {
                Some(group) => tracing::info!(
                    time = %group.time(),
                    medications = %group.names(),
                    "Dose now due"
                ),
                None => tracing::debug!("No dose due"),
            }
        }

        state.active = board.active.clone();
        Ok(board.active)
    }
}

/// Polls for the currently due dose group
pub struct DueMonitor {
    inner: Arc<MonitorInner>,
    task: Mutex<Option<RecurringTask>>,
}

impl DueMonitor {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                db,
                clock,
                state: Mutex::new(MonitorState::default()),
            }),
            task: Mutex::new(None),
        }
    }

    /// Evaluate right away, outside the poll cycle
    pub fn check_now(&self) -> DbResult<Option<DoseGroup>> {
        self.inner.check()
    }

    /// Poll every `interval`, starting immediately. Restarting replaces the
    /// previous poller.
    pub fn start(&self, interval: Duration) {
        let inner = self.inner.clone();
        let task = RecurringTask::spawn("due-monitor", async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = inner.check() {
                    tracing::error!(error = %e, "Due check failed");
                }
            }
        });
        *self.task_slot() = Some(task);
    }

    pub fn stop(&self) {
        if let Some(mut task) = self.task_slot().take() {
            task.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_slot().as_ref().is_some_and(|t| t.is_running())
    }

    /// Hide the active alert for `delay`
    pub fn snooze(&self, delay: Duration) {
        let now = self.inner.clock.now();
        let until = now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        let mut state = self.inner.state();
        state.snoozed_until = Some(until);
        state.active = None;
        tracing::info!(%until, "Active dose alert snoozed");
    }

    /// Forget any snooze, e.g. after the dose was confirmed
    pub fn clear_snooze(&self) {
        self.inner.state().snoozed_until = None;
    }

    pub fn active(&self) -> Option<DoseGroup> {
        self.inner.state().active.clone()
    }

    pub fn state(&self) -> MonitorState {
        self.inner.state().clone()
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<RecurringTask>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, TokioClock};
    use crate::db::test_support::temp_database;
    use crate::models::fixtures::daily;
    use crate::models::{DoseLogCreate, DoseStatus};

    #[test]
    fn test_check_tracks_active_group_and_snooze() {
        let (_dir, db) = temp_database();
        let clock = Arc::new(ManualClock::at((2026, 10, 12), 7, 50));
        let monitor = DueMonitor::new(db.clone(), clock.clone());

        let med = db
            .with_conn(|conn| Medication::create(conn, &daily("Madopar", 8, 0)))
            .unwrap();

        assert!(monitor.check_now().unwrap().is_none());

        clock.advance(chrono::Duration::minutes(6));
        let active = monitor.check_now().unwrap().unwrap();
        assert_eq!(active.medication_ids(), vec![med.id]);

        monitor.snooze(Duration::from_secs(600));
        assert!(monitor.active().is_none());
        clock.advance(chrono::Duration::minutes(5));
        assert!(monitor.check_now().unwrap().is_none());

        clock.advance(chrono::Duration::minutes(6));
        assert!(monitor.check_now().unwrap().is_some());
        assert!(monitor.state().snoozed_until.is_none());

        db.with_conn(|conn| {
            DoseLog::record(
                conn,
                &DoseLogCreate {
                    medication_id: med.id,
                    medication_name: med.name.clone(),
                    scheduled_time: med.scheduled_time,
                    status: DoseStatus::Taken,
                    notes: None,
                },
                clock.now(),
            )
        })
        .unwrap();
        assert!(monitor.check_now().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_detects_within_one_period() {
        let (_dir, db) = temp_database();
        let clock = Arc::new(TokioClock::at((2026, 10, 12), 7, 50));
        let monitor = DueMonitor::new(db.clone(), clock);
        db.with_conn(|conn| Medication::create(conn, &daily("Jardiance", 8, 0)))
            .unwrap();

        monitor.start(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(monitor.is_running());
        assert!(monitor.active().is_none());

        // Due from 07:55; the 07:55 poll sees it
        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert!(monitor.active().is_some());

        monitor.stop();
        assert!(!monitor.is_running());
    }
}
