//! Backup and export
//!
//! Full JSON dump/restore of every table plus CSV exports of dose history and
//! blood sugar readings.

pub mod csv;
mod json;

pub use json::{BackupPayload, ImportStats, BACKUP_FORMAT_VERSION};

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Invalid backup document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Import replaces all existing data and must be confirmed")]
    NotConfirmed,
}
