//! Runtime configuration
//!
//! All settings come from the environment; the persisted user preferences
//! (snooze length, permission state) live in the `app_settings` table instead.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DUE_POLL_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// How often the due monitor re-evaluates the active dose group
    pub due_poll_interval: Duration,
    /// Generic "check your schedule" reminder interval; `None` disables it
    pub periodic_check_interval: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let due_poll_seconds = read_u64("MEDTIME_DUE_POLL_SECONDS")
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_DUE_POLL_SECONDS);

        let periodic_check_interval = read_u64("MEDTIME_PERIODIC_CHECK_MINUTES")
            .filter(|mins| *mins > 0)
            .map(|mins| Duration::from_secs(mins * 60));

        Self {
            database_path: database_path(),
            due_poll_interval: Duration::from_secs(due_poll_seconds),
            periodic_check_interval,
        }
    }
}

fn read_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring non-numeric configuration value");
            None
        }
    }
}

/// Get the database path from environment or use default
pub fn database_path() -> PathBuf {
    std::env::var("MEDTIME_DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));

            // Go up from target/release or target/debug to project root
            if path.ends_with("release") || path.ends_with("debug") {
                if let Some(parent) = path.parent() {
                    if let Some(grandparent) = parent.parent() {
                        path = grandparent.to_path_buf();
                    }
                }
            }

            path.push("data");
            path.push("medtime.db");
            path
        })
}
