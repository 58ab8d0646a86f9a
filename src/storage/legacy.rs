//! One-time import of the per-event CSV files that predate the database.
//!
//! Every subdirectory of the data root except the backup directory is an
//! event directory named by its event id. Rows are inserted with
//! insert-or-ignore keyed on `(event_id, registration_number)`, so re-running
//! the import only adds rows that are not yet present.

use std::path::Path;

use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::DataPaths;
use crate::core::{AttendeeRecord, FieldConfig, parse_csv};
use crate::error::{CheckinError, Result};

use super::attendees::ensure_event;
use super::sqlite::{Database, now_timestamp, unique_violation};

/// Outcome of importing one event directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportOutcome {
    Imported {
        rows_read: usize,
        inserted: usize,
        ignored: usize,
        skipped_blank: usize,
    },
    NoLegacyCsv,
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventImport {
    pub event_id: String,
    #[serde(flatten)]
    pub outcome: ImportOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub events: Vec<EventImport>,
}

impl ImportReport {
    #[must_use]
    pub fn total_inserted(&self) -> usize {
        self.events
            .iter()
            .map(|event| match event.outcome {
                ImportOutcome::Imported { inserted, .. } => inserted,
                _ => 0,
            })
            .sum()
    }

    #[must_use]
    pub fn failed(&self) -> Vec<&EventImport> {
        self.events
            .iter()
            .filter(|event| matches!(event.outcome, ImportOutcome::Failed { .. }))
            .collect()
    }
}

#[derive(Debug, Default)]
struct Counts {
    rows_read: usize,
    inserted: usize,
    ignored: usize,
    skipped_blank: usize,
}

/// Import all event directories. A failing directory is reported and rolled
/// back on its own; the others still import.
pub fn import_legacy_data(
    db: &mut Database,
    paths: &DataPaths,
    fields: &FieldConfig,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    let walker = WalkDir::new(paths.data_dir())
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|err| {
            CheckinError::Io(err.into_io_error().unwrap_or_else(|| {
                std::io::Error::other("walk data directory")
            }))
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let event_id = entry.file_name().to_string_lossy().to_string();
        if event_id == paths.backup_dir_name() {
            continue;
        }

        let csv_path = paths.legacy_csv(entry.path());
        if !csv_path.is_file() {
            debug!(event_id = %event_id, "no legacy CSV, skipping");
            report.events.push(EventImport {
                event_id,
                outcome: ImportOutcome::NoLegacyCsv,
            });
            continue;
        }

        let outcome = match import_event(db.conn_mut(), &event_id, &csv_path, fields) {
            Ok(counts) => {
                info!(
                    event_id = %event_id,
                    inserted = counts.inserted,
                    ignored = counts.ignored,
                    "imported legacy CSV"
                );
                ImportOutcome::Imported {
                    rows_read: counts.rows_read,
                    inserted: counts.inserted,
                    ignored: counts.ignored,
                    skipped_blank: counts.skipped_blank,
                }
            }
            Err(err) => {
                warn!(event_id = %event_id, error = %err, "legacy import failed, rolled back");
                ImportOutcome::Failed {
                    error: err.to_string(),
                }
            }
        };
        report.events.push(EventImport { event_id, outcome });
    }

    Ok(report)
}

fn import_event(
    conn: &mut Connection,
    event_id: &str,
    csv_path: &Path,
    fields: &FieldConfig,
) -> Result<Counts> {
    let content = std::fs::read_to_string(csv_path)?;
    let rows = parse_csv(&content, fields)?;

    let mut counts = Counts {
        rows_read: rows.len(),
        ..Counts::default()
    };

    let tx = conn.transaction()?;
    ensure_event(&tx, event_id)?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO attendees (event_id, registration_number, name, company, \
             contact, email, invitation_type, checked_in, checkin_time, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        )?;
        let now = now_timestamp();
        for row in &rows {
            let registration_number = row.registration_number.trim();
            if registration_number.is_empty() {
                counts.skipped_blank += 1;
                continue;
            }
            match stmt.execute(params![
                event_id,
                registration_number,
                row.name,
                row.company,
                row.contact,
                email_column(row),
                row.invitation_type,
                row.checked_in,
                row.checkin_time,
                now,
            ]) {
                Ok(0) => counts.ignored += 1,
                Ok(_) => counts.inserted += 1,
                Err(err) if unique_violation(&err).is_some() => counts.ignored += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }
    tx.commit()?;
    Ok(counts)
}

fn email_column(row: &AttendeeRecord) -> Option<&str> {
    Some(row.email.trim()).filter(|email| !email.is_empty())
}
