//! Error handling for checkin.
//!
//! This module provides:
//! - [`CheckinError`]: The main error enum for all store, migration and backup operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Error payload printed in robot mode

mod codes;

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;

/// Main error type for checkin operations.
#[derive(Error, Debug)]
pub enum CheckinError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required fields: {}", .fields.join(", "))]
    MissingFields { fields: Vec<String> },

    #[error("CSV header is missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("Registration number {registration_number} already exists in event {event_id}")]
    DuplicateRegistrationNumber {
        event_id: String,
        registration_number: String,
    },

    #[error("Email {email} is already registered in event {event_id}")]
    DuplicateEmail { event_id: String, email: String },

    #[error("Attendee {registration_number} not found in event {event_id}")]
    AttendeeNotFound {
        event_id: String,
        registration_number: String,
    },

    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Invalid backup schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Operation requires approval: {0}")]
    ApprovalRequired(String),
}

impl CheckinError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Csv(_) => ErrorCode::CsvError,
            Self::Json(_) => ErrorCode::SerializationError,
            Self::MissingFields { .. } => ErrorCode::MissingFields,
            Self::MissingColumns { .. } => ErrorCode::MissingColumns,
            Self::DuplicateRegistrationNumber { .. } => ErrorCode::DuplicateRegistrationNumber,
            Self::DuplicateEmail { .. } => ErrorCode::DuplicateEmail,
            Self::AttendeeNotFound { .. } => ErrorCode::AttendeeNotFound,
            Self::BackupNotFound(_) => ErrorCode::BackupNotFound,
            Self::Backup(_) => ErrorCode::BackupFailed,
            Self::InvalidSchedule { .. } => ErrorCode::ScheduleInvalid,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::ApprovalRequired(_) => ErrorCode::ApprovalRequired,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::MissingFields { fields } => Some(serde_json::json!({ "fields": fields })),
            Self::MissingColumns { columns } => Some(serde_json::json!({ "columns": columns })),
            Self::DuplicateRegistrationNumber {
                event_id,
                registration_number,
            }
            | Self::AttendeeNotFound {
                event_id,
                registration_number,
            } => Some(serde_json::json!({
                "event_id": event_id,
                "registration_number": registration_number,
            })),
            Self::DuplicateEmail { event_id, email } => {
                Some(serde_json::json!({ "event_id": event_id, "email": email }))
            }
            Self::BackupNotFound(filename) => Some(serde_json::json!({ "filename": filename })),
            Self::InvalidSchedule { expression, .. } => {
                Some(serde_json::json!({ "expression": expression }))
            }
            _ => None,
        }
    }

    /// True for either uniqueness conflict.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Self::DuplicateEmail { .. } | Self::DuplicateRegistrationNumber { .. }
        )
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_checkin_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "DUPLICATE_EMAIL")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 103)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    pub recoverable: bool,

    /// Error category (e.g., "attendee", "backup")
    pub category: String,
}

impl StructuredError {
    #[must_use]
    pub fn from_checkin_error(err: &CheckinError) -> Self {
        let code = err.code();
        Self {
            code,
            numeric_code: code.numeric(),
            message: err.to_string(),
            suggestion: code.suggestion().to_string(),
            context: err.context(),
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
        }
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&CheckinError> for StructuredError {
    fn from(err: &CheckinError) -> Self {
        Self::from_checkin_error(err)
    }
}

/// Result type alias using CheckinError.
pub type Result<T> = std::result::Result<T, CheckinError>;
