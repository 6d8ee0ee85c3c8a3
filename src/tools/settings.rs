//! Settings tools

use crate::db::Database;
use crate::models::{AppSettings, AppSettingsUpdate, FontSize};

pub fn get_settings(db: &Database) -> Result<AppSettings, String> {
    db.with_conn(AppSettings::get)
        .map_err(|e| format!("Failed to load settings: {}", e))
}

pub fn parse_font_size(value: &str) -> Result<FontSize, String> {
    FontSize::from_str(value.trim()).ok_or_else(|| {
        format!(
            "Unknown font size '{}', expected normal, large or extra-large",
            value
        )
    })
}

/// Apply a partial settings update. An empty caregiver phone clears it.
pub fn update_settings(
    db: &Database,
    mut data: AppSettingsUpdate,
) -> Result<AppSettings, String> {
    if data.snooze_minutes.is_some_and(|m| m == 0 || m > 120) {
        return Err("Snooze minutes must be between 1 and 120".to_string());
    }
    if let Some(ref phone) = data.caregiver_phone {
        data.caregiver_phone = Some(phone.trim().to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    if data.caregiver_phone.as_deref() == Some("") {
        conn.execute("UPDATE app_settings SET caregiver_phone = NULL WHERE id = 1", [])
            .map_err(|e| format!("Failed to update settings: {}", e))?;
        data.caregiver_phone = None;
    }

    let settings = AppSettings::update(&conn, &data)
        .map_err(|e| format!("Failed to update settings: {}", e))?;
    tracing::info!(snooze_minutes = settings.snooze_minutes, "Settings updated");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    #[test]
    fn test_update_and_clear_phone() {
        let (_dir, db) = temp_database();
        assert_eq!(get_settings(&db).unwrap().snooze_minutes, 10);

        let updated = update_settings(
            &db,
            AppSettingsUpdate {
                snooze_minutes: Some(5),
                font_size: Some(parse_font_size("large").unwrap()),
                caregiver_phone: Some(" 0691234567 ".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.snooze_minutes, 5);
        assert_eq!(updated.font_size, FontSize::Large);
        assert_eq!(updated.caregiver_phone.as_deref(), Some("0691234567"));

        let cleared = update_settings(
            &db,
            AppSettingsUpdate {
                caregiver_phone: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cleared.caregiver_phone, None);
        assert_eq!(cleared.snooze_minutes, 5);

        assert!(update_settings(&db, AppSettingsUpdate { snooze_minutes: Some(0), ..Default::default() }).is_err());
        assert!(parse_font_size("tiny").is_err());
    }
}
