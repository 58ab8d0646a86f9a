//! Database migrations
//!
//! Each migration is a named SQL batch. Applied names are recorded in
//! `migration_history` with insert-or-ignore, so running the migrator again
//! is a no-op.

use std::path::PathBuf;

use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::DataPaths;
use crate::core::FieldConfig;
use crate::error::Result;

use super::legacy::{self, ImportReport};
use super::sqlite::{Database, now_timestamp};

pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: [Migration; 2] = [
    Migration {
        name: "001_initial_schema",
        sql: include_str!("../../migrations/001_initial_schema.sql"),
    },
    Migration {
        name: "002_backup_history",
        sql: include_str!("../../migrations/002_backup_history.sql"),
    },
];

const HISTORY_TABLE: &str = "CREATE TABLE IF NOT EXISTS migration_history (
    name TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

/// A migration name and when it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub name: String,
    pub applied_at: String,
}

/// Apply every migration not yet recorded. Returns the names applied now.
pub fn apply_migrations(conn: &mut Connection) -> Result<Vec<&'static str>> {
    conn.execute_batch(HISTORY_TABLE)?;

    let mut applied = Vec::new();
    for migration in &MIGRATIONS {
        let done: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM migration_history WHERE name = ?1)",
            [migration.name],
            |row| row.get(0),
        )?;
        if done {
            debug!(migration = migration.name, "already applied");
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT OR IGNORE INTO migration_history (name, applied_at) VALUES (?1, ?2)",
            params![migration.name, now_timestamp()],
        )?;
        tx.commit()?;

        info!(migration = migration.name, "applied migration");
        applied.push(migration.name);
    }
    Ok(applied)
}

/// Applied migrations in application order.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<MigrationRecord>> {
    let mut stmt =
        conn.prepare("SELECT name, applied_at FROM migration_history ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(MigrationRecord {
            name: row.get(0)?,
            applied_at: row.get(1)?,
        })
    })?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Attendee totals for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventCount {
    pub event_id: String,
    pub attendees: u64,
    pub checked_in: u64,
}

/// Read-only report produced by [`Migrator::check_status`].
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub database_path: PathBuf,
    pub database_exists: bool,
    pub applied: Vec<MigrationRecord>,
    pub pending: Vec<String>,
    pub events: Vec<EventCount>,
}

impl MigrationStatus {
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.database_exists && self.pending.is_empty()
    }
}

/// Brings the database schema up to date and imports legacy CSV data.
#[derive(Debug, Clone)]
pub struct Migrator {
    paths: DataPaths,
    fields: FieldConfig,
}

impl Migrator {
    #[must_use]
    pub const fn new(paths: DataPaths, fields: FieldConfig) -> Self {
        Self { paths, fields }
    }

    #[must_use]
    pub const fn paths(&self) -> &DataPaths {
        &self.paths
    }

    /// Ensure the data and backup directories exist, open the database and
    /// apply pending migrations. The returned handle is ready for the store.
    pub fn run_migrations(&self) -> Result<Database> {
        std::fs::create_dir_all(self.paths.data_dir())?;
        std::fs::create_dir_all(self.paths.backup_dir())?;

        let mut db = Database::open(self.paths.database_path())?;
        let applied = apply_migrations(db.conn_mut())?;
        info!(
            database = %self.paths.database_path().display(),
            applied = applied.len(),
            "schema up to date"
        );
        Ok(db)
    }

    /// Import every legacy per-event CSV under the data root. Safe to re-run.
    pub fn migrate_existing_data(&self, db: &mut Database) -> Result<ImportReport> {
        legacy::import_legacy_data(db, &self.paths, &self.fields)
    }

    /// Report applied and pending migrations and per-event row counts
    /// without creating or modifying anything.
    pub fn check_status(&self) -> Result<MigrationStatus> {
        let database_path = self.paths.database_path();
        let all_pending = || MIGRATIONS.iter().map(|m| m.name.to_string()).collect();

        if !database_path.exists() {
            return Ok(MigrationStatus {
                database_path,
                database_exists: false,
                applied: Vec::new(),
                pending: all_pending(),
                events: Vec::new(),
            });
        }

        let db = Database::open_existing(&database_path)?;
        let applied = if db.table_exists("migration_history")? {
            applied_migrations(db.conn())?
        } else {
            Vec::new()
        };
        let pending = MIGRATIONS
            .iter()
            .filter(|m| !applied.iter().any(|record| record.name == m.name))
            .map(|m| m.name.to_string())
            .collect();
        let events = if db.table_exists("attendees")? {
            event_counts(db.conn())?
        } else {
            Vec::new()
        };

        Ok(MigrationStatus {
            database_path,
            database_exists: true,
            applied,
            pending,
            events,
        })
    }
}

fn event_counts(conn: &Connection) -> Result<Vec<EventCount>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, COUNT(*), COALESCE(SUM(checked_in), 0) \
         FROM attendees GROUP BY event_id ORDER BY event_id",
    )?;
    let rows = stmt.query_map([], |row| {
        let attendees: i64 = row.get(1)?;
        let checked_in: i64 = row.get(2)?;
        Ok(EventCount {
            event_id: row.get(0)?,
            attendees: u64::try_from(attendees).unwrap_or_default(),
            checked_in: u64::try_from(checked_in).unwrap_or_default(),
        })
    })?;
    let mut counts = Vec::new();
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}
