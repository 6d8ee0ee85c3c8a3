//! Medtime
//!
//! An MCP server for medication reminders and dose tracking.

use std::sync::Arc;

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use medtime::build_info;
use medtime::clock::{Clock, SystemClock};
use medtime::config::AppConfig;
use medtime::db::{self, Database};
use medtime::mcp::MedtimeService;
use medtime::models::{AppSettings, NotificationPermission};
use medtime::reminders::{DueMonitor, NotificationCenter, Notifier, ReminderScheduler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (output to stderr to not interfere with MCP stdio)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("medtime=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    build_info::print_startup_banner();
    eprintln!("Starting MCP server on stdio...");

    let config = AppConfig::from_env();
    let db_path = config.database_path.clone();
    eprintln!("Database path: {}", db_path.display());

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    eprintln!("Initializing database...");
    let database = Database::open(&db_path)?;
    let settings = database.with_conn(|conn| {
        let version = db::migrations::get_schema_version(conn)?;
        eprintln!("Database schema version: {}", version);
        AppSettings::get(conn)
    })?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let granted = settings.notification_permission == NotificationPermission::Granted;
    let notifications = Arc::new(NotificationCenter::new(granted));
    let scheduler = Arc::new(ReminderScheduler::new(
        database.clone(),
        notifications.clone() as Arc<dyn Notifier>,
        clock.clone(),
    ));

    if granted {
        let armed = scheduler.schedule_all()?;
        tracing::info!(armed, "Medication reminders armed");
    } else {
        tracing::warn!(
            permission = settings.notification_permission.as_str(),
            "Notifications not permitted, reminders stay off until granted"
        );
    }
    if let Some(interval) = config.periodic_check_interval {
        scheduler.start_periodic_check(interval);
    }

    let monitor = Arc::new(DueMonitor::new(database.clone(), clock.clone()));
    monitor.start(config.due_poll_interval);

    let service = MedtimeService::new(
        db_path,
        database,
        scheduler.clone(),
        notifications,
        monitor.clone(),
        clock,
    );

    let server = service.serve((stdin(), stdout())).await?;
    server.waiting().await?;

    monitor.stop();
    scheduler.stop_all();
    Ok(())
}
