//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Attendee errors
//! - 3xx: Config errors
//! - 6xx: Storage errors
//! - 7xx: Backup errors
//! - 8xx: Validation errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode output.
///
/// Each variant maps to a numeric code (e.g., `AttendeeNotFound` -> E101).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Attendee errors (1xx)
    // ========================================
    /// E101: No attendee with that registration number in the event
    AttendeeNotFound,
    /// E102: Registration number already taken within the event
    DuplicateRegistrationNumber,
    /// E103: Email already registered within the event
    DuplicateEmail,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E302: Config file or environment value is invalid
    ConfigInvalid,
    /// E305: Backup schedule expression does not parse
    ScheduleInvalid,

    // ========================================
    // Storage errors (6xx)
    // ========================================
    /// E604: Underlying SQLite failure
    DatabaseError,
    /// E605: JSON serialization failure
    SerializationError,
    /// E606: CSV could not be read or written
    CsvError,

    // ========================================
    // Backup errors (7xx)
    // ========================================
    /// E701: Backup file does not exist
    BackupNotFound,
    /// E702: Backup creation or restore failed
    BackupFailed,

    // ========================================
    // Validation errors (8xx)
    // ========================================
    /// E801: Generic validation failure
    ValidationFailed,
    /// E802: Destructive operation needs explicit approval
    ApprovalRequired,
    /// E806: Required attendee fields are blank
    MissingFields,
    /// E807: CSV header lacks required columns
    MissingColumns,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E906: Filesystem failure
    IoError,
}

impl ErrorCode {
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::AttendeeNotFound => 101,
            Self::DuplicateRegistrationNumber => 102,
            Self::DuplicateEmail => 103,

            Self::ConfigInvalid => 302,
            Self::ScheduleInvalid => 305,

            Self::DatabaseError => 604,
            Self::SerializationError => 605,
            Self::CsvError => 606,

            Self::BackupNotFound => 701,
            Self::BackupFailed => 702,

            Self::ValidationFailed => 801,
            Self::ApprovalRequired => 802,
            Self::MissingFields => 806,
            Self::MissingColumns => 807,

            Self::IoError => 906,
        }
    }

    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::AttendeeNotFound => {
                "Run `checkin attendees list <event>` to see registered attendees"
            }
            Self::DuplicateRegistrationNumber => {
                "Leave the registration number blank to have one allocated"
            }
            Self::DuplicateEmail => "Update the existing attendee instead of adding a new one",
            Self::ConfigInvalid => "Check config.toml and CHECKIN_*/BACKUP_* environment values",
            Self::ScheduleInvalid => {
                "Use a cron expression such as `0 2 * * *` (daily at 02:00)"
            }
            Self::DatabaseError => "Run `checkin migrate status` to inspect the database",
            Self::SerializationError => "Report this as a bug with the failing command",
            Self::CsvError => "Check the CSV encoding (UTF-8) and quoting",
            Self::BackupNotFound => "Run `checkin backup list` to see available backups",
            Self::BackupFailed => "Check free disk space and permissions on the backup directory",
            Self::ValidationFailed => "Check the command arguments",
            Self::ApprovalRequired => "Re-run with --approve",
            Self::MissingFields => "Fill in every required field",
            Self::MissingColumns => "Add the missing columns to the CSV header row",
            Self::IoError => "Check that the data directory exists and is writable",
        }
    }

    /// Whether the user can fix the error without code changes.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::SerializationError | Self::DatabaseError)
    }

    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "attendee",
            3 => "config",
            6 => "storage",
            7 => "backup",
            8 => "validation",
            9 => "internal",
            _ => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
