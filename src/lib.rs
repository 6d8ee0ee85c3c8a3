//! Medtime Library
//!
//! Medication schedule, dose reminders and caregiver records behind an MCP server.

pub mod backup;
pub mod build_info;
pub mod clock;
pub mod config;
pub mod db;
pub mod mcp;
pub mod models;
pub mod reminders;
pub mod schedule;
pub mod tools;
