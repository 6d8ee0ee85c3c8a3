//! Today's dose board
//!
//! Groups the day's untaken doses by scheduled time and sorts the groups into
//! active / queued / upcoming / overdue. At most one group is active: the
//! earliest one inside the due window.

use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::predicate::applicable_on;
use super::window::{due_state, DueState};
use crate::models::{Medication, NotificationPermission, TimeOfDay};

/// Medications due at one scheduled time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DoseGroup {
    Single(Medication),
    Batch {
        time: TimeOfDay,
        medications: Vec<Medication>,
    },
}

impl DoseGroup {
    /// `None` for an empty list
    pub fn from_medications(time: TimeOfDay, mut medications: Vec<Medication>) -> Option<Self> {
        match medications.len() {
            0 => None,
            1 => medications.pop().map(DoseGroup::Single),
            _ => Some(DoseGroup::Batch { time, medications }),
        }
    }

    pub fn time(&self) -> TimeOfDay {
        match self {
            DoseGroup::Single(med) => med.scheduled_time,
            DoseGroup::Batch { time, .. } => *time,
        }
    }

    pub fn medications(&self) -> &[Medication] {
        match self {
            DoseGroup::Single(med) => std::slice::from_ref(med),
            DoseGroup::Batch { medications, .. } => medications,
        }
    }

    pub fn medication_ids(&self) -> Vec<i64> {
        self.medications().iter().map(|m| m.id).collect()
    }

    /// "Aspirin" or "Aspirin, Lyrica"
    pub fn names(&self) -> String {
        self.medications()
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Snapshot of the day's schedule at one instant
#[derive(Debug, Clone, Serialize)]
pub struct TodayBoard {
    pub date: NaiveDate,
    pub now: TimeOfDay,
    /// Earliest untaken group inside the due window
    pub active: Option<DoseGroup>,
    /// Other groups inside the due window, behind `active`
    pub queued: Vec<DoseGroup>,
    pub upcoming: Vec<DoseGroup>,
    pub overdue: Vec<DoseGroup>,
    /// Applicable medications already taken today
    pub taken: Vec<Medication>,
    pub taken_count: usize,
    pub total: usize,
    /// Percent of today's medications taken; 100 when nothing applies
    pub completion: u32,
    /// Shown when reminders cannot be delivered
    pub banner: Option<String>,
}

impl TodayBoard {
    pub fn build(
        medications: &[Medication],
        taken_ids: &HashSet<i64>,
        now: NaiveDateTime,
        permission: NotificationPermission,
    ) -> Self {
        let date = now.date();
        let applicable = applicable_on(medications, date);

        let mut by_time: BTreeMap<TimeOfDay, Vec<Medication>> = BTreeMap::new();
        let mut taken = Vec::new();
        for med in applicable.iter().copied() {
            if taken_ids.contains(&med.id) {
                taken.push(med.clone());
            } else {
                by_time
                    .entry(med.scheduled_time)
                    .or_default()
                    .push(med.clone());
            }
        }

        let mut active = None;
        let mut queued = Vec::new();
        let mut upcoming = Vec::new();
        let mut overdue = Vec::new();

        for (time, meds) in by_time {
            let Some(group) = DoseGroup::from_medications(time, meds) else {
                continue;
            };
            match due_state(now, time, false) {
                DueState::Active if active.is_none() => active = Some(group),
                DueState::Active => queued.push(group),
                DueState::Upcoming => upcoming.push(group),
                DueState::Overdue => overdue.push(group),
                DueState::Satisfied => {}
            }
        }

        let total = applicable.len();
        let taken_count = taken.len();
        let completion = if total > 0 {
            ((taken_count as f64 / total as f64) * 100.0).round() as u32
        } else {
            100
        };

        Self {
            date,
            now: TimeOfDay::of(now),
            active,
            queued,
            upcoming,
            overdue,
            taken,
            taken_count,
            total,
            completion,
            banner: permission_banner(permission),
        }
    }

    /// Every untaken group, by time
    pub fn pending_groups(&self) -> impl Iterator<Item = &DoseGroup> {
        let mut groups: Vec<&DoseGroup> = self
            .overdue
            .iter()
            .chain(self.active.iter())
            .chain(self.queued.iter())
            .chain(self.upcoming.iter())
            .collect();
        groups.sort_by_key(|g| g.time());
        groups.into_iter()
    }
}

fn permission_banner(permission: NotificationPermission) -> Option<String> {
    match permission {
        NotificationPermission::Granted => None,
        NotificationPermission::Default => Some(
            "Reminders are off. Allow notifications to be reminded at each dose time.".to_string(),
        ),
        NotificationPermission::Denied => Some(
            "Notifications are blocked. Doses still show here but no reminder will be sent."
                .to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Schedule;

    fn med(id: i64, hour: u32, minute: u32) -> Medication {
        Medication {
            id,
            name: format!("Med {}", id),
            scheduled_time: TimeOfDay::new(hour, minute).unwrap(),
            schedule: Schedule::Daily,
            is_active: true,
            ..Default::default()
        }
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 9, 14)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_same_time_forms_batch() {
        let meds = vec![med(1, 8, 0), med(2, 8, 0), med(3, 20, 0)];
        let board = TodayBoard::build(
            &meds,
            &HashSet::new(),
            at(8, 10),
            NotificationPermission::Granted,
        );

        match board.active {
            Some(DoseGroup::Batch { time, ref medications }) => {
                assert_eq!(time.to_string(), "08:00");
                assert_eq!(medications.len(), 2);
            }
            ref other => panic!("expected batch, got {:?}", other),
        }
        assert_eq!(board.upcoming.len(), 1);
        assert!(matches!(board.upcoming[0], DoseGroup::Single(_)));
        assert!(board.banner.is_none());
    }

    #[test]
    fn test_only_earliest_group_is_active() {
        let meds = vec![med(1, 8, 0), med(2, 8, 20)];
        let board = TodayBoard::build(
            &meds,
            &HashSet::new(),
            at(8, 18),
            NotificationPermission::Granted,
        );
        assert_eq!(board.active.as_ref().unwrap().medication_ids(), vec![1]);
        assert_eq!(board.queued.len(), 1);
        assert_eq!(board.pending_groups().count(), 2);
    }

    #[test]
    fn test_taken_is_excluded_and_counted() {
        let meds = vec![med(1, 8, 0), med(2, 8, 0), med(3, 7, 0)];
        let taken = HashSet::from([1]);
        let board = TodayBoard::build(&meds, &taken, at(8, 5), NotificationPermission::Denied);

        assert_eq!(board.active.as_ref().unwrap().medication_ids(), vec![2]);
        assert_eq!(board.overdue.len(), 1);
        assert_eq!(board.taken_count, 1);
        assert_eq!(board.total, 3);
        assert_eq!(board.completion, 33);
        assert!(board.banner.is_some());
    }

    #[test]
    fn test_nothing_applicable_is_complete() {
        let mut monthly = med(1, 8, 0);
        monthly.schedule = Schedule::Monthly { day: 1 };
        let board = TodayBoard::build(
            &[monthly],
            &HashSet::new(),
            at(8, 0),
            NotificationPermission::Granted,
        );
        assert_eq!(board.total, 0);
        assert_eq!(board.completion, 100);
        assert!(board.active.is_none());
    }
}
