//! SQLite connection wrapper and backup ledger rows.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::error::{CheckinError, Result};

/// The single process-wide connection; every mutation goes through this lock.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// SQLite database wrapper for the attendee store
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupOutcome {
    Success,
    Failed,
}

impl BackupOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// One row of the `backup_history` ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub event_id: Option<String>,
    pub created_at: String,
    pub filename: String,
    pub size_bytes: u64,
    pub status: BackupOutcome,
    pub error: Option<String>,
}

impl Database {
    /// Open (creating if needed) the database at the given path with WAL
    /// journaling and foreign keys enabled.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::configure_pragmas(&conn)?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing database for inspection. Never creates the file.
    ///
    /// Read-write without `CREATE`: a WAL database may still need its `-shm`
    /// sidecar created, which a read-only handle cannot do.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_pragmas(&conn)?;
        Ok(Self { conn, path: None })
    }

    #[must_use]
    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }

    /// Get a reference to the connection
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Mutable access, needed to open a transaction.
    pub const fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Backing file, `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Fold as much of the WAL into the main file as possible without
    /// waiting on readers or writers.
    pub fn checkpoint_passive(&self) -> Result<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(PASSIVE);", [], |_| Ok(()))?;
        Ok(())
    }

    pub fn insert_backup_record(&self, record: &BackupRecord) -> Result<()> {
        let size = i64::try_from(record.size_bytes)
            .map_err(|_| CheckinError::Validation(format!("backup size {} overflows", record.size_bytes)))?;
        self.conn.execute(
            "INSERT INTO backup_history (event_id, created_at, filename, size_bytes, status, error) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.event_id,
                record.created_at,
                record.filename,
                size,
                record.status.as_str(),
                record.error,
            ],
        )?;
        Ok(())
    }

    /// Ledger rows, newest first.
    pub fn list_backup_records(&self, limit: usize) -> Result<Vec<BackupRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT event_id, created_at, filename, size_bytes, status, error \
             FROM backup_history ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], backup_record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }
}

fn backup_record_from_row(row: &Row<'_>) -> rusqlite::Result<BackupRecord> {
    let status: String = row.get(4)?;
    let size: i64 = row.get(3)?;
    Ok(BackupRecord {
        event_id: row.get(0)?,
        created_at: row.get(1)?,
        filename: row.get(2)?,
        size_bytes: u64::try_from(size).unwrap_or_default(),
        status: if status == "success" {
            BackupOutcome::Success
        } else {
            BackupOutcome::Failed
        },
        error: row.get(5)?,
    })
}

/// Current UTC time as stored in timestamp columns.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Which uniqueness constraint of `attendees` a write violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueViolation {
    RegistrationNumber,
    Email,
    Other,
}

/// Classify a SQLite error as a uniqueness failure.
///
/// SQLite reports the violated columns only in the message
/// (`UNIQUE constraint failed: attendees.event_id, attendees.email`).
#[must_use]
pub fn unique_violation(err: &rusqlite::Error) -> Option<UniqueViolation> {
    let rusqlite::Error::SqliteFailure(code, message) = err else {
        return None;
    };
    if code.extended_code != rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        && code.extended_code != rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    {
        return None;
    }
    let message = message.as_deref().unwrap_or_default();
    Some(if message.contains("attendees.email") {
        UniqueViolation::Email
    } else if message.contains("attendees.registration_number") {
        UniqueViolation::RegistrationNumber
    } else {
        UniqueViolation::Other
    })
}
