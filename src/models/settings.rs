//! Application settings
//!
//! A single row (id = 1) created by the first migration. Also holds the
//! notification permission and first-run flags.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::RowUpdate;
use crate::db::{DbError, DbResult};

const SETTINGS_ID: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontSize {
    Normal,
    Large,
    #[default]
    ExtraLarge,
}

impl FontSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontSize::Normal => "normal",
            FontSize::Large => "large",
            FontSize::ExtraLarge => "extra-large",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "normal" => Some(FontSize::Normal),
            "large" => Some(FontSize::Large),
            "extra-large" | "xl" => Some(FontSize::ExtraLarge),
            _ => None,
        }
    }
}

/// Whether the user allowed local notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    /// Never asked
    #[default]
    Default,
    Granted,
    Denied,
}

impl NotificationPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPermission::Default => "default",
            NotificationPermission::Granted => "granted",
            NotificationPermission::Denied => "denied",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "default" => Some(NotificationPermission::Default),
            "granted" => Some(NotificationPermission::Granted),
            "denied" => Some(NotificationPermission::Denied),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub notifications_enabled: bool,
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    pub snooze_minutes: u32,
    pub font_size: FontSize,
    pub high_contrast: bool,
    pub caregiver_phone: Option<String>,
    pub caregiver_notifications: bool,
    pub notification_permission: NotificationPermission,
    pub welcome_completed: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            sound_enabled: true,
            vibration_enabled: true,
            snooze_minutes: 10,
            font_size: FontSize::ExtraLarge,
            high_contrast: true,
            caregiver_phone: None,
            caregiver_notifications: false,
            notification_permission: NotificationPermission::Default,
            welcome_completed: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppSettingsUpdate {
    pub notifications_enabled: Option<bool>,
    pub sound_enabled: Option<bool>,
    pub vibration_enabled: Option<bool>,
    pub snooze_minutes: Option<u32>,
    pub font_size: Option<FontSize>,
    pub high_contrast: Option<bool>,
    pub caregiver_phone: Option<String>,
    pub caregiver_notifications: Option<bool>,
    pub welcome_completed: Option<bool>,
}

impl AppSettings {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let font_size: String = row.get("font_size")?;
        let permission: String = row.get("notification_permission")?;
        Ok(Self {
            notifications_enabled: row.get::<_, i32>("notifications_enabled")? != 0,
            sound_enabled: row.get::<_, i32>("sound_enabled")? != 0,
            vibration_enabled: row.get::<_, i32>("vibration_enabled")? != 0,
            snooze_minutes: row.get("snooze_minutes")?,
            font_size: FontSize::from_str(&font_size).unwrap_or_default(),
            high_contrast: row.get::<_, i32>("high_contrast")? != 0,
            caregiver_phone: row.get("caregiver_phone")?,
            caregiver_notifications: row.get::<_, i32>("caregiver_notifications")? != 0,
            notification_permission: NotificationPermission::from_str(&permission)
                .unwrap_or_default(),
            welcome_completed: row.get::<_, i32>("welcome_completed")? != 0,
        })
    }

    /// Load the settings row
    pub fn get(conn: &Connection) -> DbResult<Self> {
        let settings = conn.query_row(
            "SELECT * FROM app_settings WHERE id = ?1",
            [SETTINGS_ID],
            Self::from_row,
        )?;
        Ok(settings)
    }

    pub fn update(conn: &Connection, data: &AppSettingsUpdate) -> DbResult<Self> {
        if data.snooze_minutes == Some(0) {
            return Err(DbError::InvalidValue(
                "snooze minutes must be at least 1".to_string(),
            ));
        }

        let mut update = RowUpdate::new();
        update.set("notifications_enabled", data.notifications_enabled.map(i32::from));
        update.set("sound_enabled", data.sound_enabled.map(i32::from));
        update.set("vibration_enabled", data.vibration_enabled.map(i32::from));
        update.set("snooze_minutes", data.snooze_minutes);
        update.set("font_size", data.font_size.map(|f| f.as_str()));
        update.set("high_contrast", data.high_contrast.map(i32::from));
        update.set("caregiver_phone", data.caregiver_phone.clone());
        update.set(
            "caregiver_notifications",
            data.caregiver_notifications.map(i32::from),
        );
        update.set("welcome_completed", data.welcome_completed.map(i32::from));

        update.execute(conn, "app_settings", SETTINGS_ID)?;
        Self::get(conn)
    }

    pub fn set_permission(conn: &Connection, permission: NotificationPermission) -> DbResult<()> {
        conn.execute(
            "UPDATE app_settings SET notification_permission = ?2 WHERE id = ?1",
            params![SETTINGS_ID, permission.as_str()],
        )?;
        Ok(())
    }

    /// Overwrite the settings row with an imported copy
    pub fn restore(conn: &Connection, settings: &AppSettings) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO app_settings (
                id, notifications_enabled, sound_enabled, vibration_enabled, snooze_minutes,
                font_size, high_contrast, caregiver_phone, caregiver_notifications,
                notification_permission, welcome_completed
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                SETTINGS_ID,
                settings.notifications_enabled as i32,
                settings.sound_enabled as i32,
                settings.vibration_enabled as i32,
                settings.snooze_minutes.max(1),
                settings.font_size.as_str(),
                settings.high_contrast as i32,
                settings.caregiver_phone,
                settings.caregiver_notifications as i32,
                settings.notification_permission.as_str(),
                settings.welcome_completed as i32,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    #[test]
    fn test_defaults_after_migration() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();

        let settings = AppSettings::get(&conn).unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn test_partial_update_and_permission() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();

        let update = AppSettingsUpdate {
            snooze_minutes: Some(15),
            font_size: Some(FontSize::Large),
            ..Default::default()
        };
        let settings = AppSettings::update(&conn, &update).unwrap();
        assert_eq!(settings.snooze_minutes, 15);
        assert_eq!(settings.font_size, FontSize::Large);
        assert!(settings.high_contrast);

        AppSettings::set_permission(&conn, NotificationPermission::Denied).unwrap();
        assert_eq!(
            AppSettings::get(&conn).unwrap().notification_permission,
            NotificationPermission::Denied
        );

        let zero = AppSettingsUpdate {
            snooze_minutes: Some(0),
            ..Default::default()
        };
        assert!(AppSettings::update(&conn, &zero).is_err());
    }

    #[test]
    fn test_font_size_serde() {
        assert_eq!(
            serde_json::to_string(&FontSize::ExtraLarge).unwrap(),
            "\"extra-large\""
        );
    }
}
