//! Medical report model
//!
//! Uploaded reports and lab analyses, stored inline as base64 text.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// Largest accepted upload (decoded size)
pub const MAX_FILE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportCategory {
    #[default]
    Report,
    Analysis,
    Other,
}

impl ReportCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportCategory::Report => "report",
            ReportCategory::Analysis => "analysis",
            ReportCategory::Other => "other",
        }
    }

    /// Accepts the legacy Albanian labels used by older exports
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "report" | "reports" | "raportet" => Some(ReportCategory::Report),
            "analysis" | "analyses" | "lab" | "analizat" => Some(ReportCategory::Analysis),
            "other" => Some(ReportCategory::Other),
            _ => None,
        }
    }
}

/// A stored medical report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicalReport {
    pub id: i64,
    pub title: String,
    pub category: ReportCategory,
    pub date: NaiveDate,
    pub file_name: Option<String>,
    /// MIME type, e.g. `application/pdf`
    pub file_type: Option<String>,
    /// Base64 file content
    pub file_data: Option<String>,
    pub is_built_in: bool,
    pub built_in_path: Option<String>,
    pub notes: Option<String>,
    pub uploaded_at: String,
}

/// Data for uploading a report
#[derive(Debug, Clone)]
pub struct MedicalReportCreate {
    pub title: String,
    pub category: ReportCategory,
    pub date: NaiveDate,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_data: Option<String>,
    pub notes: Option<String>,
}

/// Approximate decoded size of a base64 payload (data URL prefix ignored)
fn decoded_len(data: &str) -> usize {
    let body = data.split_once(',').map(|(_, b)| b).unwrap_or(data);
    body.trim_end_matches('=').len() * 3 / 4
}

impl MedicalReport {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let category: String = row.get("category")?;
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            category: ReportCategory::from_str(&category).unwrap_or(ReportCategory::Other),
            date: row.get("date")?,
            file_name: row.get("file_name")?,
            file_type: row.get("file_type")?,
            file_data: row.get("file_data")?,
            is_built_in: row.get::<_, i32>("is_built_in")? != 0,
            built_in_path: row.get("built_in_path")?,
            notes: row.get("notes")?,
            uploaded_at: row.get("uploaded_at")?,
        })
    }

    pub fn create(conn: &Connection, data: &MedicalReportCreate) -> DbResult<Self> {
        if let Some(ref file) = data.file_data {
            let size = decoded_len(file);
            if size > MAX_FILE_BYTES {
                return Err(DbError::InvalidValue(format!(
                    "file is {} bytes, the limit is {} bytes",
                    size, MAX_FILE_BYTES
                )));
            }
        }

        conn.execute(
            r#"
            INSERT INTO medical_reports (title, category, date, file_name, file_type, file_data, notes, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            "#,
            params![
                data.title,
                data.category.as_str(),
                data.date,
                data.file_name,
                data.file_type,
                data.file_data,
                data.notes,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or(DbError::NotFound {
            entity: "Medical report",
            id,
        })
    }

    /// Insert a record exactly as exported, keeping its id
    pub fn restore(conn: &Connection, report: &MedicalReport) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT INTO medical_reports (
                id, title, category, date, file_name, file_type, file_data,
                is_built_in, built_in_path, notes, uploaded_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                report.id,
                report.title,
                report.category.as_str(),
                report.date,
                report.file_name,
                report.file_type,
                report.file_data,
                report.is_built_in as i32,
                report.built_in_path,
                report.notes,
                report.uploaded_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let report = conn
            .query_row(
                "SELECT * FROM medical_reports WHERE id = ?1",
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(report)
    }

    /// Reports newest first, optionally filtered by category
    pub fn list(conn: &Connection, category: Option<ReportCategory>) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM medical_reports
            WHERE (?1 IS NULL OR category = ?1)
            ORDER BY date DESC, id DESC
            "#,
        )?;
        let reports = stmt
            .query_map([category.map(|c| c.as_str())], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reports)
    }

    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM medical_reports WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    fn upload(title: &str, category: ReportCategory) -> MedicalReportCreate {
        MedicalReportCreate {
            title: title.to_string(),
            category,
            date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            file_name: Some("scan.pdf".to_string()),
            file_type: Some("application/pdf".to_string()),
            file_data: Some("data:application/pdf;base64,JVBERi0xLjQK".to_string()),
            notes: None,
        }
    }

    #[test]
    fn test_legacy_category_labels() {
        assert_eq!(ReportCategory::from_str("raportet"), Some(ReportCategory::Report));
        assert_eq!(ReportCategory::from_str("Analizat"), Some(ReportCategory::Analysis));
        assert_eq!(ReportCategory::from_str("xray"), None);
    }

    #[test]
    fn test_filter_by_category() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();

        let report = MedicalReport::create(&conn, &upload("Cardiology", ReportCategory::Report)).unwrap();
        assert!(!report.is_built_in);
        assert!(!report.uploaded_at.is_empty());
        MedicalReport::create(&conn, &upload("HbA1c", ReportCategory::Analysis)).unwrap();

        assert_eq!(MedicalReport::list(&conn, None).unwrap().len(), 2);
        let labs = MedicalReport::list(&conn, Some(ReportCategory::Analysis)).unwrap();
        assert_eq!(labs.len(), 1);
        assert_eq!(labs[0].title, "HbA1c");
    }

    #[test]
    fn test_rejects_oversized_upload() {
        let (_dir, db) = temp_database();
        let conn = db.get_conn().unwrap();

        let mut data = upload("Huge", ReportCategory::Other);
        data.file_data = Some("A".repeat(MAX_FILE_BYTES * 2));
        assert!(MedicalReport::create(&conn, &data).is_err());
    }
}
