//! Medical report tools
//!
//! Upload, browse and remove stored reports and lab analyses. Listings leave
//! out the file content; fetch a single report to get it.

use chrono::NaiveDate;
use serde::Serialize;

use super::require_text;
use crate::db::Database;
use crate::models::{MedicalReport, MedicalReportCreate, ReportCategory};

/// Report without its file content
#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub id: i64,
    pub title: String,
    pub category: ReportCategory,
    pub date: NaiveDate,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub has_file: bool,
    pub is_built_in: bool,
    pub notes: Option<String>,
    pub uploaded_at: String,
}

impl From<&MedicalReport> for ReportSummary {
    fn from(r: &MedicalReport) -> Self {
        Self {
            id: r.id,
            title: r.title.clone(),
            category: r.category,
            date: r.date,
            file_name: r.file_name.clone(),
            file_type: r.file_type.clone(),
            has_file: r.file_data.is_some() || r.built_in_path.is_some(),
            is_built_in: r.is_built_in,
            notes: r.notes.clone(),
            uploaded_at: r.uploaded_at.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListReportsResponse {
    pub reports: Vec<ReportSummary>,
    pub total: usize,
}

fn parse_category(value: &str) -> Result<ReportCategory, String> {
    ReportCategory::from_str(value).ok_or_else(|| {
        format!(
            "Unknown category '{}', expected report, analysis or other",
            value
        )
    })
}

pub fn add_report(
    db: &Database,
    mut data: MedicalReportCreate,
) -> Result<ReportSummary, String> {
    data.title = require_text("Title", &data.title)?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let report = MedicalReport::create(&conn, &data)
        .map_err(|e| format!("Failed to save report: {}", e))?;

    tracing::info!(id = report.id, category = report.category.as_str(), "Medical report stored");
    Ok(ReportSummary::from(&report))
}

/// Full report including the base64 file content
pub fn get_report(db: &Database, id: i64) -> Result<Option<MedicalReport>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    MedicalReport::get_by_id(&conn, id).map_err(|e| format!("Failed to get report: {}", e))
}

pub fn list_reports(db: &Database, category: Option<&str>) -> Result<ListReportsResponse, String> {
    let category = category
        .filter(|c| !c.trim().is_empty())
        .map(parse_category)
        .transpose()?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let reports = MedicalReport::list(&conn, category)
        .map_err(|e| format!("Failed to list reports: {}", e))?;

    let summaries: Vec<ReportSummary> = reports.iter().map(ReportSummary::from).collect();
    let total = summaries.len();
    Ok(ListReportsResponse {
        reports: summaries,
        total,
    })
}

pub fn delete_report(db: &Database, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    MedicalReport::delete(&conn, id).map_err(|e| format!("Failed to delete report: {}", e))
}

/// Category argument as accepted by the tools
pub fn category_arg(value: Option<&str>) -> Result<ReportCategory, String> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_category(v),
        _ => Ok(ReportCategory::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;
    use crate::models::MAX_FILE_BYTES;

    fn upload(title: &str, category: ReportCategory, data: Option<String>) -> MedicalReportCreate {
        MedicalReportCreate {
            title: title.to_string(),
            category,
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            file_name: Some("scan.pdf".to_string()),
            file_type: Some("application/pdf".to_string()),
            file_data: data,
            notes: None,
        }
    }

    #[test]
    fn test_listing_hides_content() {
        let (_dir, db) = temp_database();
        add_report(&db, upload("HbA1c", ReportCategory::Analysis, Some("QUJD".into()))).unwrap();
        add_report(&db, upload("Discharge letter", ReportCategory::Report, None)).unwrap();

        let analyses = list_reports(&db, Some("analizat")).unwrap();
        assert_eq!(analyses.total, 1);
        assert!(analyses.reports[0].has_file);

        let full = get_report(&db, analyses.reports[0].id).unwrap().unwrap();
        assert_eq!(full.file_data.as_deref(), Some("QUJD"));

        assert_eq!(list_reports(&db, None).unwrap().total, 2);
        assert!(list_reports(&db, Some("xray")).is_err());
    }

    #[test]
    fn test_rejects_oversized_and_untitled() {
        let (_dir, db) = temp_database();
        let huge = "A".repeat(MAX_FILE_BYTES * 2);
        assert!(add_report(&db, upload("Big", ReportCategory::Other, Some(huge))).is_err());
        assert!(add_report(&db, upload(" ", ReportCategory::Other, None)).is_err());
        assert_eq!(category_arg(None).unwrap(), ReportCategory::Report);
    }
}
