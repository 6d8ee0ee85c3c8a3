//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 2;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
        tracing::info!("Applied schema migration v1");
    }

    if current_version < 2 {
        migrate_v2(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (2)", [])?;
        tracing::info!("Applied schema migration v2");
    }

    Ok(())
}

/// Migration v1: medication schedule, dose log, settings
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- MEDICATIONS
        -- User-defined schedule; soft-deleted via is_active
        -- ============================================
        CREATE TABLE medications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            dose TEXT NOT NULL,
            scheduled_time TEXT NOT NULL,        -- "HH:MM", local time
            timing TEXT NOT NULL DEFAULT '',     -- e.g. "before breakfast"
            instructions TEXT NOT NULL DEFAULT '',
            warning TEXT,
            color TEXT NOT NULL DEFAULT '#2196F3',
            icon TEXT NOT NULL DEFAULT '',
            frequency TEXT NOT NULL DEFAULT 'daily' CHECK(frequency IN ('daily', 'monthly')),
            monthly_day INTEGER CHECK(monthly_day IS NULL OR (monthly_day BETWEEN 1 AND 31)),
            start_date TEXT,                     -- "YYYY-MM-DD", inactive before
            special_timer_secs INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_medications_time ON medications(scheduled_time);
        CREATE INDEX idx_medications_active ON medications(is_active);

        -- ============================================
        -- DOSE LOGS
        -- No uniqueness on (medication_id, date): the latest row wins for undo
        -- ============================================
        CREATE TABLE dose_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            medication_id INTEGER NOT NULL,
            medication_name TEXT NOT NULL,
            scheduled_time TEXT NOT NULL,
            taken_time TEXT,
            status TEXT NOT NULL CHECK(status IN ('pending', 'taken', 'missed', 'snoozed')),
            date TEXT NOT NULL,
            notes TEXT
        );

        CREATE INDEX idx_dose_logs_med_date ON dose_logs(medication_id, date);
        CREATE INDEX idx_dose_logs_date ON dose_logs(date);
        CREATE INDEX idx_dose_logs_status ON dose_logs(status);

        -- ============================================
        -- APP SETTINGS
        -- Single row (id = 1)
        -- ============================================
        CREATE TABLE app_settings (
            id INTEGER PRIMARY KEY CHECK(id = 1),
            notifications_enabled INTEGER NOT NULL DEFAULT 1,
            sound_enabled INTEGER NOT NULL DEFAULT 1,
            vibration_enabled INTEGER NOT NULL DEFAULT 1,
            snooze_minutes INTEGER NOT NULL DEFAULT 10,
            font_size TEXT NOT NULL DEFAULT 'extra-large' CHECK(font_size IN ('normal', 'large', 'extra-large')),
            high_contrast INTEGER NOT NULL DEFAULT 1,
            caregiver_phone TEXT,
            caregiver_notifications INTEGER NOT NULL DEFAULT 0,
            notification_permission TEXT NOT NULL DEFAULT 'default' CHECK(notification_permission IN ('default', 'granted', 'denied')),
            welcome_completed INTEGER NOT NULL DEFAULT 0
        );

        INSERT INTO app_settings (id) VALUES (1);
        "#,
    )?;

    Ok(())
}

/// Migration v2: caregiver records
fn migrate_v2(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE blood_sugar (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            value REAL NOT NULL CHECK(value > 0),   -- mmol/L
            time TEXT NOT NULL,
            date TEXT NOT NULL,
            notes TEXT
        );

        CREATE INDEX idx_blood_sugar_date ON blood_sugar(date, time);

        CREATE TABLE medical_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            category TEXT NOT NULL CHECK(category IN ('report', 'analysis', 'other')),
            date TEXT NOT NULL,
            file_name TEXT,
            file_type TEXT,
            file_data TEXT,                       -- base64
            is_built_in INTEGER NOT NULL DEFAULT 0,
            built_in_path TEXT,
            notes TEXT,
            uploaded_at TEXT NOT NULL
        );

        CREATE INDEX idx_medical_reports_category ON medical_reports(category, date);

        CREATE TABLE emergency_contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            relationship TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL,
            is_primary INTEGER NOT NULL DEFAULT 0,
            display_order INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX idx_emergency_contacts_order ON emergency_contacts(display_order);

        CREATE TABLE doctor_appointments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doctor_name TEXT NOT NULL,
            specialty TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            time TEXT NOT NULL,
            location TEXT,
            phone TEXT,
            notes TEXT,
            questions_to_ask TEXT,
            completed INTEGER NOT NULL DEFAULT 0,
            summary TEXT
        );

        CREATE INDEX idx_doctor_appointments_date ON doctor_appointments(date, completed);

        CREATE TABLE medication_stock (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            medication_id INTEGER NOT NULL,
            medication_name TEXT NOT NULL,
            pills_remaining INTEGER NOT NULL DEFAULT 0,
            pills_per_day REAL NOT NULL DEFAULT 1.0 CHECK(pills_per_day > 0),
            refill_threshold INTEGER NOT NULL DEFAULT 0,
            last_refill_date TEXT NOT NULL,
            pharmacy_name TEXT,
            pharmacy_phone TEXT
        );

        CREATE INDEX idx_medication_stock_med ON medication_stock(medication_id);

        CREATE TABLE health_diary (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            mood TEXT NOT NULL CHECK(mood IN ('great', 'good', 'okay', 'bad', 'terrible')),
            pain_level INTEGER NOT NULL CHECK(pain_level BETWEEN 0 AND 10),
            symptoms TEXT NOT NULL DEFAULT '',
            side_effects TEXT NOT NULL DEFAULT '',
            energy_level INTEGER NOT NULL CHECK(energy_level BETWEEN 0 AND 10),
            notes TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX idx_health_diary_date ON health_diary(date);
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert!(!needs_migration(&conn).unwrap());

        let settings_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM app_settings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(settings_rows, 1);
    }
}
