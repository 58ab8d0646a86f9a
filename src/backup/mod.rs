//! Scheduled gzip backups of the attendee database.

pub mod manager;
pub mod scheduler;

pub use manager::{
    BackupInfo, BackupManager, CleanupReport, CreatedBackup, LastRun, RestoreReport,
    backup_filename, is_backup_filename,
};
pub use scheduler::{BackupScheduler, BackupStatus, parse_schedule};
