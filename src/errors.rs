//! Unified application error type.
//! All modules (db, core, cli, utils) return AppError so that the scheduler
//! can classify failures at its per-session boundary.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // Scheduling taxonomy
    // ---------------------------
    /// Bad timezone name, malformed recurrence document.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Session or instance missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Instance missing the fields required to evaluate it.
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Storage unavailable or failing.
    #[error("Storage error: {0}")]
    TransientStorage(#[from] rusqlite::Error),

    // ---------------------------
    // IO
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Database migration error: {0}")]
    Migration(String),

    // ---------------------------
    // Parsing errors
    // ---------------------------
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    #[error("Invalid time format: {0}")]
    InvalidTime(String),

    #[error("Invalid attendance value: {0}")]
    InvalidAttendance(String),

    // ---------------------------
    // Config file errors
    // ---------------------------
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    // ---------------------------
    // Generic fallback
    // ---------------------------
    #[error("Internal error: {0}")]
    Other(String),
}

impl AppError {
    /// Short label used when an error is recorded in a pass result.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "configuration",
            AppError::NotFound(_) => "not_found",
            AppError::Consistency(_) => "consistency",
            AppError::TransientStorage(_) => "storage",
            AppError::Io(_) => "io",
            AppError::Migration(_) => "migration",
            AppError::InvalidDate(_)
            | AppError::InvalidTime(_)
            | AppError::InvalidAttendance(_) => "validation",
            AppError::ConfigLoad(_) | AppError::ConfigSave(_) => "config_file",
            AppError::Other(_) => "internal",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
