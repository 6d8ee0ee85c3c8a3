//! Time-of-day value
//!
//! Schedules, dose logs, readings and appointments all carry a local wall-clock
//! time stored as `"HH:MM"` text.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid time of day '{0}', expected HH:MM")]
pub struct ParseTimeError(String);

/// Hour and minute of a local day (seconds are always zero)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(NaiveTime::MIN);

    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Wall-clock time of an instant, truncated to the minute
    pub fn of(instant: NaiveDateTime) -> Self {
        Self(
            NaiveTime::from_hms_opt(instant.hour(), instant.minute(), 0)
                .unwrap_or(NaiveTime::MIN),
        )
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn minutes_since_midnight(&self) -> i64 {
        i64::from(self.hour() * 60 + self.minute())
    }

    /// This time on the given date
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.0)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut parts = trimmed.split(':');
        let hour = parts.next().and_then(|h| h.parse::<u32>().ok());
        let minute = parts.next().and_then(|m| m.parse::<u32>().ok());
        // Tolerate a trailing ":SS" from older exports, but only zero seconds
        let seconds_ok = match parts.next() {
            None => true,
            Some(sec) => sec.parse::<u32>().map(|s| s == 0).unwrap_or(false),
        };

        match (hour, minute) {
            (Some(h), Some(m)) if seconds_ok && parts.next().is_none() => {
                Self::new(h, m).ok_or_else(|| ParseTimeError(s.to_string()))
            }
            _ => Err(ParseTimeError(s.to_string())),
        }
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl ToSql for TimeOfDay {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for TimeOfDay {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let t: TimeOfDay = "8:05".parse().unwrap();
        assert_eq!(t.hour(), 8);
        assert_eq!(t.minute(), 5);
        assert_eq!(t.to_string(), "08:05");
        assert_eq!("21:30:00".parse::<TimeOfDay>().unwrap().to_string(), "21:30");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
        assert!("12:30:15".parse::<TimeOfDay>().is_err());
        assert!("".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let t = TimeOfDay::new(7, 45).unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"07:45\"");
        let back: TimeOfDay = serde_json::from_str("\"07:45\"").unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_minutes_since_midnight() {
        assert_eq!(TimeOfDay::new(8, 0).unwrap().minutes_since_midnight(), 480);
        assert_eq!(TimeOfDay::default().minutes_since_midnight(), 0);
    }
}
