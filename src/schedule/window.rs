//! Due-window classification
//!
//! A dose is due from 5 minutes before its scheduled time until 30 minutes
//! after. Offsets are whole minutes within the same calendar day.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::TimeOfDay;

/// Minutes before the scheduled time at which a dose becomes due
pub const DUE_EARLY_MINUTES: i64 = 5;
/// Minutes after the scheduled time after which a dose is overdue
pub const DUE_LATE_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DueState {
    Upcoming,
    Active,
    Overdue,
    /// Already taken today
    Satisfied,
}

/// Minutes from the scheduled time to `now`; negative means still ahead
pub fn offset_minutes(now: NaiveDateTime, scheduled: TimeOfDay) -> i64 {
    TimeOfDay::of(now).minutes_since_midnight() - scheduled.minutes_since_midnight()
}

pub fn classify(offset_minutes: i64, taken: bool) -> DueState {
    if taken {
        DueState::Satisfied
    } else if offset_minutes < -DUE_EARLY_MINUTES {
        DueState::Upcoming
    } else if offset_minutes <= DUE_LATE_MINUTES {
        DueState::Active
    } else {
        DueState::Overdue
    }
}

/// Classify a scheduled time against `now`
pub fn due_state(now: NaiveDateTime, scheduled: TimeOfDay, taken: bool) -> DueState {
    classify(offset_minutes(now, scheduled), taken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_eight_oclock_dose() {
        let eight = TimeOfDay::new(8, 0).unwrap();
        assert_eq!(due_state(at(8, 25), eight, false), DueState::Active);
        assert_eq!(due_state(at(8, 31), eight, false), DueState::Overdue);
        assert_eq!(due_state(at(7, 50), eight, false), DueState::Upcoming);
        assert_eq!(due_state(at(8, 5), eight, true), DueState::Satisfied);
    }

    #[test]
    fn test_window_edges_are_inclusive() {
        assert_eq!(classify(-6, false), DueState::Upcoming);
        assert_eq!(classify(-5, false), DueState::Active);
        assert_eq!(classify(30, false), DueState::Active);
        assert_eq!(classify(31, false), DueState::Overdue);
    }

    #[test]
    fn test_seconds_are_ignored() {
        let eight = TimeOfDay::new(8, 0).unwrap();
        let late = at(8, 30) + chrono::Duration::seconds(59);
        assert_eq!(offset_minutes(late, eight), 30);
    }
}
