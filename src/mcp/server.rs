//! Medtime MCP Server Implementation
//!
//! Implements the MCP server with all Medtime tools.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::db::Database;
use crate::models::{
    AppSettingsUpdate, AppointmentCreate, AppointmentUpdate, EmergencyContactCreate,
    EmergencyContactUpdate, HealthDiaryCreate, MedicalReportCreate, Medication, MedicationCreate,
    MedicationStockUpdate, MedicationUpdate, Schedule, TimeOfDay,
};
use crate::reminders::{DueMonitor, NotificationCenter, ReminderScheduler};
use crate::tools::status::{ReminderStatus, StatusTracker};
use crate::tools::{
    appointments, backup, blood_sugar, contacts, diary, doses, medications, notifications,
    parse_date, parse_date_or, parse_time, reports, settings, stock,
};

/// Medtime MCP Service
#[derive(Clone)]
pub struct MedtimeService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    scheduler: Arc<ReminderScheduler>,
    notifications: Arc<NotificationCenter>,
    monitor: Arc<DueMonitor>,
    clock: Arc<dyn Clock>,
    backup_dir: PathBuf,
    tool_router: ToolRouter<MedtimeService>,
}

impl MedtimeService {
    pub fn new(
        database_path: PathBuf,
        database: Database,
        scheduler: Arc<ReminderScheduler>,
        notifications: Arc<NotificationCenter>,
        monitor: Arc<DueMonitor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let backup_dir = database_path
            .parent()
            .map(|p| p.join("backups"))
            .unwrap_or_else(|| PathBuf::from("backups"));

        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(database_path))),
            database,
            scheduler,
            notifications,
            monitor,
            clock,
            backup_dir,
            tool_router: Self::tool_router(),
        }
    }

    fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }
}

fn tool_error(message: String) -> McpError {
    tracing::error!(error = %message, "Tool call failed");
    McpError::internal_error(message, None)
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn not_found(kind: &str, id: i64) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(format!(
        r#"{{"error": "{} not found", "id": {}}}"#,
        kind, id
    ))]))
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    id: i64,
    deleted: bool,
}

fn optional_time(value: Option<&str>) -> Result<Option<TimeOfDay>, McpError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(parse_time)
        .transpose()
        .map_err(tool_error)
}

fn optional_date(value: Option<&str>) -> Result<Option<chrono::NaiveDate>, McpError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(parse_date)
        .transpose()
        .map_err(tool_error)
}

fn wait_arg(minutes: Option<u32>) -> Result<Option<u32>, McpError> {
    minutes
        .map(medications::wait_seconds)
        .transpose()
        .map_err(tool_error)
}

fn schedule_arg(frequency: Option<&str>, monthly_day: Option<u32>) -> Result<Option<Schedule>, McpError> {
    match (frequency, monthly_day) {
        (None, None) => Ok(None),
        (None, Some(day)) => Ok(Some(Schedule::Monthly { day })),
        (Some(f), day) => Schedule::from_columns(f, day)
            .map(Some)
            .map_err(|e| tool_error(e.to_string())),
    }
}

// ============================================================================
// Shared Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IdParams {
    /// Record ID
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct MedicationIdsParams {
    /// Medication IDs the action applies to
    pub medication_ids: Vec<i64>,
}

// ============================================================================
// Medication Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddMedicationParams {
    pub name: String,
    /// Dose as written on the box, e.g. "500 mg"
    pub dose: String,
    /// Time of day, HH:MM (24h)
    pub scheduled_time: String,
    /// When to take it relative to meals, e.g. "after breakfast"
    #[serde(default)]
    pub timing: String,
    #[serde(default)]
    pub instructions: String,
    pub warning: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    /// "daily" (default) or "monthly"
    pub frequency: Option<String>,
    /// Day of month for monthly medications (1-31)
    pub monthly_day: Option<u32>,
    /// First day the medication applies (YYYY-MM-DD)
    pub start_date: Option<String>,
    /// Wait after the dose, in minutes (e.g. stay upright)
    pub wait_minutes: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListMedicationsParams {
    /// Only active medications (default true)
    #[serde(default = "default_true")]
    pub active_only: bool,
}

fn default_true() -> bool { true }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateMedicationParams {
    pub id: i64,
    pub name: Option<String>,
    pub dose: Option<String>,
    /// HH:MM
    pub scheduled_time: Option<String>,
    pub timing: Option<String>,
    pub instructions: Option<String>,
    pub warning: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub frequency: Option<String>,
    pub monthly_day: Option<u32>,
    pub start_date: Option<String>,
    pub wait_minutes: Option<u32>,
}

// ============================================================================
// Dose Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ConfirmGroupParams {
    /// Scheduled time of the group, HH:MM
    pub time: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UndoDoseParams {
    pub medication_id: i64,
    /// Day of the entry (YYYY-MM-DD, default today)
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct HistoryParams {
    /// Number of days back (default 7)
    #[serde(default = "default_history_days")]
    pub days: u32,
}

fn default_history_days() -> u32 { doses::DEFAULT_HISTORY_DAYS }

// ============================================================================
// Notification Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PermissionParams {
    /// Whether the user allowed notifications
    pub granted: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RespondParams {
    /// Notification tag, e.g. "medication-3"
    pub tag: String,
    /// "confirm", "snooze" or "dismiss"
    pub action: String,
}

// ============================================================================
// Record Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddBloodSugarParams {
    /// mmol/L
    pub value: f64,
    /// HH:MM (default now)
    pub time: Option<String>,
    /// YYYY-MM-DD (default today)
    pub date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListBloodSugarParams {
    /// Only the last N days (default all)
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddReportParams {
    pub title: String,
    /// "report" (default), "analysis" or "other"
    pub category: Option<String>,
    /// YYYY-MM-DD (default today)
    pub date: Option<String>,
    pub file_name: Option<String>,
    /// MIME type
    pub file_type: Option<String>,
    /// Base64 file content, up to 5 MB decoded
    pub file_data: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListReportsParams {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddContactParams {
    pub name: String,
    #[serde(default)]
    pub relationship: String,
    pub phone: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateContactParams {
    pub id: i64,
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub phone: Option<String>,
    pub is_primary: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddAppointmentParams {
    pub doctor_name: String,
    #[serde(default)]
    pub specialty: String,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub time: String,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub questions_to_ask: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateAppointmentParams {
    pub id: i64,
    pub doctor_name: Option<String>,
    pub specialty: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub questions_to_ask: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CompleteAppointmentParams {
    pub id: i64,
    /// What the doctor said
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddStockParams {
    pub medication_id: i64,
    pub pills_remaining: i64,
    /// Pills taken per day (default 1)
    #[serde(default = "default_pills_per_day")]
    pub pills_per_day: f64,
    /// Refill when fewer pills than this remain (default 10)
    #[serde(default = "default_refill_threshold")]
    pub refill_threshold: i64,
    pub pharmacy_name: Option<String>,
    pub pharmacy_phone: Option<String>,
}

fn default_pills_per_day() -> f64 { 1.0 }
fn default_refill_threshold() -> i64 { 10 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateStockParams {
    pub id: i64,
    pub pills_remaining: Option<i64>,
    pub pills_per_day: Option<f64>,
    pub refill_threshold: Option<i64>,
    pub pharmacy_name: Option<String>,
    pub pharmacy_phone: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RefillParams {
    pub id: i64,
    pub pills_added: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddDiaryParams {
    /// YYYY-MM-DD (default today)
    pub date: Option<String>,
    /// great, good, okay, bad or terrible
    pub mood: Option<String>,
    /// 0-10
    #[serde(default)]
    pub pain_level: u8,
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub side_effects: String,
    /// 0-10 (default 5)
    #[serde(default = "default_energy")]
    pub energy_level: u8,
    #[serde(default)]
    pub notes: String,
}

fn default_energy() -> u8 { 5 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DiaryDateParams {
    /// YYYY-MM-DD (default today)
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListDiaryParams {
    /// Maximum entries (default 30)
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateSettingsParams {
    pub notifications_enabled: Option<bool>,
    pub sound_enabled: Option<bool>,
    pub vibration_enabled: Option<bool>,
    /// 1-120
    pub snooze_minutes: Option<u32>,
    /// normal, large or extra-large
    pub font_size: Option<String>,
    pub high_contrast: Option<bool>,
    /// Empty string clears it
    pub caregiver_phone: Option<String>,
    pub caregiver_notifications: Option<bool>,
    pub welcome_completed: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExportBackupParams {
    /// Write the file next to the database instead of returning it (default false)
    #[serde(default)]
    pub save_to_disk: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImportBackupParams {
    /// Backup document as produced by export_backup
    pub json: String,
    /// Must be true: import replaces all existing data
    #[serde(default)]
    pub confirm: bool,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl MedtimeService {
    // --- Status ---

    #[tool(description = "Get the current status of the Medtime service including build info, database status, reminder timers, and process information")]
    async fn medtime_status(&self) -> Result<CallToolResult, McpError> {
        let reminders = ReminderStatus::collect(&self.notifications, &self.scheduler, &self.monitor);
        let tracker = self.status_tracker.lock().await;
        json_result(&tracker.get_status(reminders))
    }

    #[tool(description = "Get instructions for using Medtime. Call this when starting a session or when unsure how to use the tools.")]
    fn medtime_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(INSTRUCTIONS)]))
    }

    // --- Medications ---

    #[tool(description = "Add a medication with a daily or monthly schedule. Its reminder is armed right away.")]
    fn add_medication(&self, Parameters(p): Parameters<AddMedicationParams>) -> Result<CallToolResult, McpError> {
        let data = MedicationCreate {
            name: p.name,
            dose: p.dose,
            scheduled_time: parse_time(&p.scheduled_time).map_err(tool_error)?,
            timing: p.timing,
            instructions: p.instructions,
            warning: p.warning,
            color: p.color,
            icon: p.icon,
            schedule: schedule_arg(p.frequency.as_deref(), p.monthly_day)?.unwrap_or_default(),
            start_date: optional_date(p.start_date.as_deref())?,
            special_timer_secs: wait_arg(p.wait_minutes)?,
        };
        let result = medications::add_medication(&self.database, data, self.now().date()).map_err(tool_error)?;
        self.sync_reminder(&result.medication);
        json_result(&result)
    }

    #[tool(description = "Get full details for a medication")]
    fn get_medication(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        match medications::get_medication(&self.database, p.id, self.now().date()).map_err(tool_error)? {
            Some(med) => json_result(&med),
            None => not_found("Medication", p.id),
        }
    }

    #[tool(description = "List medications with their schedule and whether they apply today")]
    fn list_medications(&self, Parameters(p): Parameters<ListMedicationsParams>) -> Result<CallToolResult, McpError> {
        let result = medications::list_medications(&self.database, p.active_only, self.now().date()).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Update fields of a medication. Its reminder follows the new schedule.")]
    fn update_medication(&self, Parameters(p): Parameters<UpdateMedicationParams>) -> Result<CallToolResult, McpError> {
        let data = MedicationUpdate {
            name: p.name,
            dose: p.dose,
            scheduled_time: optional_time(p.scheduled_time.as_deref())?,
            timing: p.timing,
            instructions: p.instructions,
            warning: p.warning,
            color: p.color,
            icon: p.icon,
            schedule: schedule_arg(p.frequency.as_deref(), p.monthly_day)?,
            start_date: optional_date(p.start_date.as_deref())?,
            special_timer_secs: wait_arg(p.wait_minutes)?,
        };
        let result = medications::update_medication(&self.database, p.id, data, self.now().date()).map_err(tool_error)?;
        self.sync_reminder(&result.medication);
        json_result(&result)
    }

    #[tool(description = "Stop a medication (soft delete). Its dose history is kept and its reminder is cancelled.")]
    fn deactivate_medication(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        let result = medications::deactivate_medication(&self.database, p.id, self.now().date()).map_err(tool_error)?;
        self.scheduler.cancel(p.id);
        json_result(&result)
    }

    #[tool(description = "Resume a previously stopped medication")]
    fn reactivate_medication(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        let result = medications::reactivate_medication(&self.database, p.id, self.now().date()).map_err(tool_error)?;
        self.sync_reminder(&result.medication);
        json_result(&result)
    }

    // --- Doses ---

    #[tool(description = "Today's board: the active dose group, overdue, upcoming and taken medications, and completion")]
    fn get_today(&self) -> Result<CallToolResult, McpError> {
        let result = doses::today(&self.database, self.monitor.state(), self.now()).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Mark medications as taken now")]
    fn confirm_doses(&self, Parameters(p): Parameters<MedicationIdsParams>) -> Result<CallToolResult, McpError> {
        let result = doses::confirm(&self.database, &p.medication_ids, self.now()).map_err(tool_error)?;
        self.after_confirm(&p.medication_ids);
        json_result(&result)
    }

    #[tool(description = "Mark every untaken medication scheduled at the given time as taken")]
    fn confirm_group(&self, Parameters(p): Parameters<ConfirmGroupParams>) -> Result<CallToolResult, McpError> {
        let time = parse_time(&p.time).map_err(tool_error)?;
        let result = doses::confirm_group(&self.database, time, self.now()).map_err(tool_error)?;
        let ids: Vec<i64> = result.logged.iter().map(|l| l.medication_id).collect();
        self.after_confirm(&ids);
        json_result(&result)
    }

    #[tool(description = "Remind again later: logs the doses as snoozed and re-notifies after the configured snooze minutes")]
    fn snooze_doses(&self, Parameters(p): Parameters<MedicationIdsParams>) -> Result<CallToolResult, McpError> {
        let result = doses::snooze(&self.database, &p.medication_ids, self.now()).map_err(tool_error)?;
        for payload in &result.payloads {
            self.scheduler.snooze(payload.clone(), result.delay());
        }
        self.monitor.snooze(result.delay());
        json_result(&result)
    }

    #[tool(description = "Mark medications as missed")]
    fn mark_missed(&self, Parameters(p): Parameters<MedicationIdsParams>) -> Result<CallToolResult, McpError> {
        let result = doses::mark_missed(&self.database, &p.medication_ids, self.now()).map_err(tool_error)?;
        for id in &p.medication_ids {
            self.notifications.clear(&crate::reminders::medication_tag(*id));
        }
        json_result(&result)
    }

    #[tool(description = "Undo the most recent dose entry for a medication on a date (default today)")]
    fn undo_dose(&self, Parameters(p): Parameters<UndoDoseParams>) -> Result<CallToolResult, McpError> {
        let date = parse_date_or(p.date.as_deref(), self.now().date()).map_err(tool_error)?;
        let result = doses::undo(&self.database, p.medication_id, date).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Dose history for the last N days with adherence statistics")]
    fn dose_history(&self, Parameters(p): Parameters<HistoryParams>) -> Result<CallToolResult, McpError> {
        let result = doses::history(&self.database, p.days, self.now().date()).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Taken / missed / snoozed counts and compliance for the last 7 days")]
    fn week_stats(&self) -> Result<CallToolResult, McpError> {
        let result = doses::week_stats(&self.database, self.now().date()).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Dose history for the last N days as CSV")]
    fn export_dose_history_csv(&self, Parameters(p): Parameters<HistoryParams>) -> Result<CallToolResult, McpError> {
        let csv = doses::export_history_csv(&self.database, p.days, self.now().date()).map_err(tool_error)?;
        Ok(CallToolResult::success(vec![Content::text(csv)]))
    }

    // --- Notifications ---

    #[tool(description = "Record whether the user allows notifications. Granting arms today's reminders; denying disables them.")]
    fn set_notification_permission(&self, Parameters(p): Parameters<PermissionParams>) -> Result<CallToolResult, McpError> {
        let result = notifications::set_permission(&self.database, &self.notifications, &self.scheduler, p.granted)
            .map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "List notifications currently shown")]
    fn list_notifications(&self) -> Result<CallToolResult, McpError> {
        json_result(&notifications::list(&self.notifications))
    }

    #[tool(description = "Answer a notification: confirm (taken), snooze (remind later) or dismiss (missed)")]
    fn respond_to_notification(&self, Parameters(p): Parameters<RespondParams>) -> Result<CallToolResult, McpError> {
        let result = notifications::respond(
            &self.database,
            &self.notifications,
            &self.scheduler,
            &self.monitor,
            &p.tag,
            &p.action,
            self.now(),
        )
        .map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Re-arm today's medication reminders, e.g. after changing the schedule")]
    fn reschedule_reminders(&self) -> Result<CallToolResult, McpError> {
        let result = notifications::reschedule(&self.database, &self.scheduler).map_err(tool_error)?;
        json_result(&result)
    }

    // --- Blood Sugar ---

    #[tool(description = "Log a blood sugar reading in mmol/L; time and date default to now")]
    fn add_blood_sugar(&self, Parameters(p): Parameters<AddBloodSugarParams>) -> Result<CallToolResult, McpError> {
        let result = blood_sugar::add_reading(
            &self.database,
            p.value,
            optional_time(p.time.as_deref())?,
            optional_date(p.date.as_deref())?,
            p.notes,
            self.now(),
        )
        .map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "List blood sugar readings newest first, with average and range")]
    fn list_blood_sugar(&self, Parameters(p): Parameters<ListBloodSugarParams>) -> Result<CallToolResult, McpError> {
        let result = blood_sugar::list_readings(&self.database, p.days, self.now().date()).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Delete a blood sugar reading")]
    fn delete_blood_sugar(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        let deleted = blood_sugar::delete_reading(&self.database, p.id).map_err(tool_error)?;
        json_result(&DeleteResponse { id: p.id, deleted })
    }

    #[tool(description = "All blood sugar readings as CSV")]
    fn export_blood_sugar_csv(&self) -> Result<CallToolResult, McpError> {
        let csv = blood_sugar::export_csv(&self.database).map_err(tool_error)?;
        Ok(CallToolResult::success(vec![Content::text(csv)]))
    }

    #[tool(description = "Three-month blood sugar report for the doctor, with statistics, as CSV")]
    fn blood_sugar_report(&self) -> Result<CallToolResult, McpError> {
        let csv = blood_sugar::doctor_report(&self.database, self.now().date()).map_err(tool_error)?;
        Ok(CallToolResult::success(vec![Content::text(csv)]))
    }

    // --- Medical Reports ---

    #[tool(description = "Store a medical report or lab analysis, optionally with a base64 file")]
    fn add_report(&self, Parameters(p): Parameters<AddReportParams>) -> Result<CallToolResult, McpError> {
        let data = MedicalReportCreate {
            title: p.title,
            category: reports::category_arg(p.category.as_deref()).map_err(tool_error)?,
            date: parse_date_or(p.date.as_deref(), self.now().date()).map_err(tool_error)?,
            file_name: p.file_name,
            file_type: p.file_type,
            file_data: p.file_data,
            notes: p.notes,
        };
        let result = reports::add_report(&self.database, data).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Get a medical report including its file content")]
    fn get_report(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        match reports::get_report(&self.database, p.id).map_err(tool_error)? {
            Some(report) => json_result(&report),
            None => not_found("Report", p.id),
        }
    }

    #[tool(description = "List medical reports, optionally by category (report, analysis, other)")]
    fn list_reports(&self, Parameters(p): Parameters<ListReportsParams>) -> Result<CallToolResult, McpError> {
        let result = reports::list_reports(&self.database, p.category.as_deref()).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Delete a medical report")]
    fn delete_report(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        let deleted = reports::delete_report(&self.database, p.id).map_err(tool_error)?;
        json_result(&DeleteResponse { id: p.id, deleted })
    }

    // --- Emergency Contacts ---

    #[tool(description = "Add an emergency contact")]
    fn add_contact(&self, Parameters(p): Parameters<AddContactParams>) -> Result<CallToolResult, McpError> {
        let data = EmergencyContactCreate {
            name: p.name,
            relationship: p.relationship,
            phone: p.phone,
            is_primary: p.is_primary,
        };
        let result = contacts::add_contact(&self.database, data).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "List emergency contacts in display order")]
    fn list_contacts(&self) -> Result<CallToolResult, McpError> {
        let result = contacts::list_contacts(&self.database).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Update an emergency contact")]
    fn update_contact(&self, Parameters(p): Parameters<UpdateContactParams>) -> Result<CallToolResult, McpError> {
        let data = EmergencyContactUpdate {
            name: p.name,
            relationship: p.relationship,
            phone: p.phone,
            is_primary: p.is_primary,
        };
        let result = contacts::update_contact(&self.database, p.id, data).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Delete an emergency contact")]
    fn delete_contact(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        let deleted = contacts::delete_contact(&self.database, p.id).map_err(tool_error)?;
        json_result(&DeleteResponse { id: p.id, deleted })
    }

    // --- Appointments ---

    #[tool(description = "Add a doctor appointment")]
    fn add_appointment(&self, Parameters(p): Parameters<AddAppointmentParams>) -> Result<CallToolResult, McpError> {
        let data = AppointmentCreate {
            doctor_name: p.doctor_name,
            specialty: p.specialty,
            date: parse_date(&p.date).map_err(tool_error)?,
            time: parse_time(&p.time).map_err(tool_error)?,
            location: p.location,
            phone: p.phone,
            notes: p.notes,
            questions_to_ask: p.questions_to_ask,
        };
        let result = appointments::add_appointment(&self.database, data).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "List upcoming and past doctor appointments")]
    fn list_appointments(&self) -> Result<CallToolResult, McpError> {
        let result = appointments::list_appointments(&self.database, self.now().date()).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Update a doctor appointment")]
    fn update_appointment(&self, Parameters(p): Parameters<UpdateAppointmentParams>) -> Result<CallToolResult, McpError> {
        let data = AppointmentUpdate {
            doctor_name: p.doctor_name,
            specialty: p.specialty,
            date: optional_date(p.date.as_deref())?,
            time: optional_time(p.time.as_deref())?,
            location: p.location,
            phone: p.phone,
            notes: p.notes,
            questions_to_ask: p.questions_to_ask,
        };
        let result = appointments::update_appointment(&self.database, p.id, data).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Mark an appointment as done, optionally recording the doctor's summary")]
    fn complete_appointment(&self, Parameters(p): Parameters<CompleteAppointmentParams>) -> Result<CallToolResult, McpError> {
        let result = appointments::complete_appointment(&self.database, p.id, p.summary.as_deref()).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Delete a doctor appointment")]
    fn delete_appointment(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        let deleted = appointments::delete_appointment(&self.database, p.id).map_err(tool_error)?;
        json_result(&DeleteResponse { id: p.id, deleted })
    }

    // --- Stock ---

    #[tool(description = "Start tracking the pill count for a medication")]
    fn add_stock(&self, Parameters(p): Parameters<AddStockParams>) -> Result<CallToolResult, McpError> {
        let result = stock::add_stock(
            &self.database,
            p.medication_id,
            p.pills_remaining,
            p.pills_per_day,
            p.refill_threshold,
            p.pharmacy_name,
            p.pharmacy_phone,
            self.now().date(),
        )
        .map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "List medication stock with days left and refill alerts")]
    fn list_stock(&self) -> Result<CallToolResult, McpError> {
        let result = stock::list_stock(&self.database).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Update a stock entry")]
    fn update_stock(&self, Parameters(p): Parameters<UpdateStockParams>) -> Result<CallToolResult, McpError> {
        let data = MedicationStockUpdate {
            pills_remaining: p.pills_remaining,
            pills_per_day: p.pills_per_day,
            refill_threshold: p.refill_threshold,
            pharmacy_name: p.pharmacy_name,
            pharmacy_phone: p.pharmacy_phone,
        };
        let result = stock::update_stock(&self.database, p.id, data).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Record a refill: adds pills and sets the refill date to today")]
    fn refill_stock(&self, Parameters(p): Parameters<RefillParams>) -> Result<CallToolResult, McpError> {
        let result = stock::refill(&self.database, p.id, p.pills_added, self.now().date()).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Stop tracking stock for a medication")]
    fn delete_stock(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        let deleted = stock::delete_stock(&self.database, p.id).map_err(tool_error)?;
        json_result(&DeleteResponse { id: p.id, deleted })
    }

    // --- Health Diary ---

    #[tool(description = "Write a health diary entry: mood, pain and energy (0-10), symptoms, side effects")]
    fn add_diary_entry(&self, Parameters(p): Parameters<AddDiaryParams>) -> Result<CallToolResult, McpError> {
        let data = HealthDiaryCreate {
            date: parse_date_or(p.date.as_deref(), self.now().date()).map_err(tool_error)?,
            mood: diary::parse_mood(p.mood.as_deref()).map_err(tool_error)?,
            pain_level: p.pain_level,
            symptoms: p.symptoms,
            side_effects: p.side_effects,
            energy_level: p.energy_level,
            notes: p.notes,
        };
        let result = diary::add_entry(&self.database, data).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Get the diary entry for a date (default today)")]
    fn get_diary_entry(&self, Parameters(p): Parameters<DiaryDateParams>) -> Result<CallToolResult, McpError> {
        let date = parse_date_or(p.date.as_deref(), self.now().date()).map_err(tool_error)?;
        let result = diary::entry_for_date(&self.database, date).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "List recent diary entries with average pain and energy")]
    fn list_diary(&self, Parameters(p): Parameters<ListDiaryParams>) -> Result<CallToolResult, McpError> {
        let result = diary::list_entries(&self.database, p.limit).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Delete a diary entry")]
    fn delete_diary_entry(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        let deleted = diary::delete_entry(&self.database, p.id).map_err(tool_error)?;
        json_result(&DeleteResponse { id: p.id, deleted })
    }

    // --- Settings ---

    #[tool(description = "Get app settings")]
    fn get_settings(&self) -> Result<CallToolResult, McpError> {
        let result = settings::get_settings(&self.database).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Update app settings (snooze minutes, font size, caregiver phone, ...)")]
    fn update_settings(&self, Parameters(p): Parameters<UpdateSettingsParams>) -> Result<CallToolResult, McpError> {
        let data = AppSettingsUpdate {
            notifications_enabled: p.notifications_enabled,
            sound_enabled: p.sound_enabled,
            vibration_enabled: p.vibration_enabled,
            snooze_minutes: p.snooze_minutes,
            font_size: p
                .font_size
                .as_deref()
                .map(settings::parse_font_size)
                .transpose()
                .map_err(tool_error)?,
            high_contrast: p.high_contrast,
            caregiver_phone: p.caregiver_phone,
            caregiver_notifications: p.caregiver_notifications,
            welcome_completed: p.welcome_completed,
        };
        let result = settings::update_settings(&self.database, data).map_err(tool_error)?;
        json_result(&result)
    }

    // --- Backup ---

    #[tool(description = "Export all data as a JSON backup, returned inline or saved next to the database")]
    fn export_backup(&self, Parameters(p): Parameters<ExportBackupParams>) -> Result<CallToolResult, McpError> {
        let dir = p.save_to_disk.then_some(self.backup_dir.as_path());
        let result = backup::export_json(&self.database, dir, self.now().date()).map_err(tool_error)?;
        json_result(&result)
    }

    #[tool(description = "Replace ALL data with a JSON backup. Requires confirm=true; ask the user first.")]
    fn import_backup(&self, Parameters(p): Parameters<ImportBackupParams>) -> Result<CallToolResult, McpError> {
        let result = backup::import_json(&self.database, &self.notifications, &self.scheduler, &p.json, p.confirm)
            .map_err(tool_error)?;
        json_result(&result)
    }
}

impl MedtimeService {
    /// Close the reminders of doses that were just taken and start their
    /// post-dose waits
    fn after_confirm(&self, medication_ids: &[i64]) {
        for id in medication_ids {
            self.notifications.clear(&crate::reminders::medication_tag(*id));
        }
        self.monitor.clear_snooze();
        if let Err(e) = self.scheduler.start_waits(medication_ids) {
            tracing::warn!(error = %e, "Failed to start post-dose waits");
        }
    }

    /// Re-arm a medication's reminder after its row changed
    fn sync_reminder(&self, med: &Medication) {
        if self.notifications.is_enabled() {
            self.scheduler.rearm(med);
        }
    }
}

#[tool_handler]
impl ServerHandler for MedtimeService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "medtime".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Medtime".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Medtime - medication reminders and dose tracking. \
                 IMPORTANT: Call medtime_instructions first. \
                 Medications: add/get/list/update/deactivate/reactivate_medication. \
                 Doses: get_today, confirm_doses, confirm_group, snooze_doses, mark_missed, undo_dose, \
                 dose_history, week_stats, export_dose_history_csv. \
                 Notifications: set_notification_permission, list_notifications, respond_to_notification, \
                 reschedule_reminders. \
                 Blood sugar: add/list/delete_blood_sugar, export_blood_sugar_csv, blood_sugar_report. \
                 Records: add/get/list/delete_report, add/list/update/delete_contact, \
                 add/list/update/complete/delete_appointment, add/list/update/refill/delete_stock, \
                 add_diary_entry, get_diary_entry, list_diary, delete_diary_entry. \
                 Settings: get/update_settings. \
                 Backup: export_backup, import_backup (replaces everything, needs confirm=true)."
                    .into(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::clock::TokioClock;
    use crate::db::test_support::temp_database;
    use crate::reminders::{medication_tag, wait_tag, Notifier};

    /// Service with notifications granted; clock starts on 2026-10-05 at 07:00
    fn service() -> (tempfile::TempDir, MedtimeService) {
        let (dir, db) = temp_database();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::at((2026, 10, 5), 7, 0));
        let center = Arc::new(NotificationCenter::new(true));
        let scheduler = Arc::new(ReminderScheduler::new(
            db.clone(),
            center.clone() as Arc<dyn Notifier>,
            clock.clone(),
        ));
        let monitor = Arc::new(DueMonitor::new(db.clone(), clock.clone()));
        let service = MedtimeService::new(
            dir.path().join("medtime-test.db"),
            db,
            scheduler,
            center,
            monitor,
            clock,
        );
        (dir, service)
    }

    fn add(service: &MedtimeService, params: serde_json::Value) -> Result<CallToolResult, McpError> {
        let params: AddMedicationParams = serde_json::from_value(params).unwrap();
        service.add_medication(Parameters(params))
    }

    fn only_medication_id(service: &MedtimeService) -> i64 {
        let listed = medications::list_medications(&service.database, false, service.now().date()).unwrap();
        assert_eq!(listed.total, 1);
        listed.medications[0].id
    }

    #[tokio::test(start_paused = true)]
    async fn test_edited_time_moves_the_reminder() {
        let (_dir, service) = service();
        add(&service, json!({"name": "Metformin", "dose": "500 mg", "scheduled_time": "08:00"})).unwrap();
        let id = only_medication_id(&service);
        assert_eq!(service.scheduler.armed_count(), 1);

        let update: UpdateMedicationParams =
            serde_json::from_value(json!({"id": id, "scheduled_time": "09:00"})).unwrap();
        service.update_medication(Parameters(update)).unwrap();

        tokio::time::sleep(Duration::from_secs(61 * 60)).await;
        assert!(service.notifications.get(&medication_tag(id)).is_none());

        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert!(service.notifications.get(&medication_tag(id)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_added_medication_gets_a_reminder() {
        let (_dir, service) = service();
        add(&service, json!({"name": "Lyrica", "dose": "75 mg", "scheduled_time": "08:30"})).unwrap();
        let id = only_medication_id(&service);

        tokio::time::sleep(Duration::from_secs(91 * 60)).await;
        assert!(service.notifications.get(&medication_tag(id)).is_some());
    }

    #[tokio::test]
    async fn test_oversized_wait_is_rejected() {
        let (_dir, service) = service();
        let result = add(
            &service,
            json!({"name": "Alendronate", "dose": "70 mg", "scheduled_time": "07:00", "wait_minutes": 100_000_000u32}),
        );
        assert!(result.is_err());

        let listed = medications::list_medications(&service.database, false, service.now().date()).unwrap();
        assert_eq!(listed.total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_starts_post_dose_wait() {
        let (_dir, service) = service();
        add(
            &service,
            json!({"name": "Alendronate", "dose": "70 mg", "scheduled_time": "07:00", "wait_minutes": 30}),
        )
        .unwrap();
        let id = only_medication_id(&service);

        let confirm: MedicationIdsParams =
            serde_json::from_value(json!({"medication_ids": [id]})).unwrap();
        service.confirm_doses(Parameters(confirm)).unwrap();

        tokio::time::sleep(Duration::from_secs(29 * 60)).await;
        assert!(service.notifications.get(&wait_tag(id)).is_none());
        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert!(service.notifications.get(&wait_tag(id)).is_some());
    }
}
