//! Storage layer for checkin
//!
//! One SQLite connection per process, shared behind a mutex, holds the
//! attendee tables, the migration history and the backup ledger.

pub mod attendees;
pub mod legacy;
pub mod migrations;
pub mod sqlite;

pub use attendees::{AttendeeStore, CheckinStats};
pub use legacy::{EventImport, ImportOutcome, ImportReport};
pub use migrations::{EventCount, MigrationRecord, MigrationStatus, Migrator};
pub use sqlite::{BackupOutcome, BackupRecord, Database, SharedDatabase};
