//! Wall-clock source
//!
//! Everything that asks "what time is it" goes through a `Clock` so the
//! schedule logic can be exercised at fixed instants.

use chrono::{Local, NaiveDateTime};

/// Source of the current local date and time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[cfg(test)]
pub(crate) use manual::{ManualClock, TokioClock};

#[cfg(test)]
mod manual {
    use std::sync::Mutex;

    use chrono::{Duration, NaiveDate, NaiveDateTime};

    use super::Clock;

    fn instant(date: (i32, u32, u32), hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .expect("valid test instant")
    }

    /// Wall clock that follows tokio's (pausable) timer, for timer tests
    pub struct TokioClock {
        base: NaiveDateTime,
        started: tokio::time::Instant,
    }

    impl TokioClock {
        pub fn at(date: (i32, u32, u32), hour: u32, minute: u32) -> Self {
            Self {
                base: instant(date, hour, minute),
                started: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> NaiveDateTime {
            let elapsed = tokio::time::Instant::now() - self.started;
            self.base + Duration::from_std(elapsed).unwrap_or_else(|_| Duration::zero())
        }
    }

    /// Test clock that only moves when told to
    pub struct ManualClock {
        now: Mutex<NaiveDateTime>,
    }

    impl ManualClock {
        pub fn at(date: (i32, u32, u32), hour: u32, minute: u32) -> Self {
            Self {
                now: Mutex::new(instant(date, hour, minute)),
            }
        }

        pub fn set(&self, now: NaiveDateTime) {
            *self.now.lock().unwrap() = now;
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            *self.now.lock().unwrap()
        }
    }
}
