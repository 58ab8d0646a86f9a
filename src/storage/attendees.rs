//! Attendee store backed by the shared SQLite connection.

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::{
    self, Attendee, AttendeePatch, AttendeeRecord, Field, FieldConfig, format_registration_number,
    parse_registration_number,
};
use crate::error::{CheckinError, Result};

use super::sqlite::{SharedDatabase, UniqueViolation, now_timestamp, unique_violation};

const SELECT_COLUMNS: &str = "registration_number, name, company, contact, email, \
     invitation_type, checked_in, checkin_time, event_id, created_at, updated_at";

const INSERT_ATTENDEE: &str = "INSERT INTO attendees (event_id, registration_number, name, \
     company, contact, email, invitation_type, checked_in, checkin_time, created_at, updated_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)";

/// Check-in totals for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckinStats {
    pub event_id: String,
    pub total: u64,
    pub checked_in: u64,
    pub not_checked_in: u64,
}

/// CRUD over the `attendees` table.
///
/// All calls lock the shared connection for their duration, so mutations
/// from one process are serialized. Duplicate detection in
/// [`AttendeeStore::add_attendee`] is check-then-insert and assumes no
/// other process writes the same file.
#[derive(Debug, Clone)]
pub struct AttendeeStore {
    db: SharedDatabase,
    fields: FieldConfig,
}

impl AttendeeStore {
    #[must_use]
    pub const fn new(db: SharedDatabase, fields: FieldConfig) -> Self {
        Self { db, fields }
    }

    #[must_use]
    pub const fn fields(&self) -> &FieldConfig {
        &self.fields
    }

    #[must_use]
    pub const fn database(&self) -> &SharedDatabase {
        &self.db
    }

    /// Attendees of an event ordered by registration number.
    pub fn read_attendees(&self, event_id: &str) -> Result<Vec<AttendeeRecord>> {
        Ok(self
            .list_attendees(event_id)?
            .into_iter()
            .map(|attendee| attendee.record)
            .collect())
    }

    /// Like [`Self::read_attendees`] but keeps event id and row timestamps.
    pub fn list_attendees(&self, event_id: &str) -> Result<Vec<Attendee>> {
        let db = self.db.lock();
        let mut stmt = db.conn().prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM attendees WHERE event_id = ?1 \
             ORDER BY registration_number"
        ))?;
        let rows = stmt.query_map([event_id], attendee_from_row)?;
        let mut attendees = Vec::new();
        for row in rows {
            attendees.push(row?);
        }
        Ok(attendees)
    }

    pub fn find_attendee(&self, event_id: &str, registration_number: &str) -> Result<Option<Attendee>> {
        let db = self.db.lock();
        let attendee = db
            .conn()
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM attendees \
                     WHERE event_id = ?1 AND registration_number = ?2"
                ),
                params![event_id, registration_number],
                attendee_from_row,
            )
            .optional()?;
        Ok(attendee)
    }

    /// Replace every attendee of the event with `rows` in one transaction.
    ///
    /// Rows with a blank registration number get a fresh one. On any error
    /// the event keeps exactly the rows it had before the call.
    pub fn write_attendees(&self, event_id: &str, rows: &[AttendeeRecord]) -> Result<usize> {
        let mut next = rows
            .iter()
            .filter_map(|row| parse_registration_number(row.registration_number.trim()))
            .max()
            .map_or(1, |max| max + 1);

        let mut db = self.db.lock();
        let tx = db.conn_mut().transaction()?;
        ensure_event(&tx, event_id)?;
        let removed = tx.execute("DELETE FROM attendees WHERE event_id = ?1", [event_id])?;

        let now = now_timestamp();
        for row in rows {
            let mut row = row.clone();
            row.registration_number = row.registration_number.trim().to_string();
            if row.registration_number.is_empty() {
                row.registration_number = format_registration_number(next);
                next += 1;
            }
            insert_attendee(&tx, event_id, &row, &now)
                .map_err(|err| duplicate_error(err, event_id, &row))?;
        }
        tx.commit()?;

        info!(event_id, removed, written = rows.len(), "replaced attendees");
        Ok(rows.len())
    }

    /// Insert one attendee after checking required fields and duplicates.
    ///
    /// A blank registration number is allocated. Returns the stored record.
    pub fn add_attendee(&self, event_id: &str, record: AttendeeRecord) -> Result<AttendeeRecord> {
        let missing = self.validate_required(&record);
        if !missing.is_empty() {
            return Err(CheckinError::MissingFields {
                fields: missing.iter().map(|field| field.header().to_string()).collect(),
            });
        }

        let mut record = record;
        record.registration_number = record.registration_number.trim().to_string();
        record.email = record.email.trim().to_string();

        let mut db = self.db.lock();
        if record.registration_number.is_empty() {
            record.registration_number = allocate_registration_number(db.conn(), event_id);
        }
        check_duplicates(db.conn(), event_id, &record)?;

        let tx = db.conn_mut().transaction()?;
        ensure_event(&tx, event_id)?;
        insert_attendee(&tx, event_id, &record, &now_timestamp())
            .map_err(|err| duplicate_error(err, event_id, &record))?;
        tx.commit()?;

        debug!(event_id, registration_number = %record.registration_number, "added attendee");
        Ok(record)
    }

    /// Write only the fields present in `patch`. `updated_at` is always
    /// refreshed.
    pub fn update_attendee(
        &self,
        event_id: &str,
        registration_number: &str,
        patch: &AttendeePatch,
    ) -> Result<()> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        let mut set = |column: &'static str, value: Value| {
            assignments.push(column);
            values.push(value);
        };
        if let Some(reg) = &patch.registration_number {
            set("registration_number", Value::Text(reg.trim().to_string()));
        }
        if let Some(name) = &patch.name {
            set("name", Value::Text(name.clone()));
        }
        if let Some(company) = &patch.company {
            set("company", Value::Text(company.clone()));
        }
        if let Some(contact) = &patch.contact {
            set("contact", Value::Text(contact.clone()));
        }
        if let Some(email) = &patch.email {
            set("email", optional_text(email));
        }
        if let Some(invitation_type) = &patch.invitation_type {
            set("invitation_type", Value::Text(invitation_type.clone()));
        }
        if let Some(checked_in) = patch.checked_in {
            set("checked_in", Value::Integer(i64::from(checked_in)));
        }
        if let Some(checkin_time) = &patch.checkin_time {
            set(
                "checkin_time",
                checkin_time.as_deref().map_or(Value::Null, optional_text),
            );
        }
        set("updated_at", Value::Text(now_timestamp()));

        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(idx, column)| format!("{column} = ?{}", idx + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE attendees SET {set_clause} WHERE event_id = ?{} AND registration_number = ?{}",
            values.len() + 1,
            values.len() + 2
        );
        values.push(Value::Text(event_id.to_string()));
        values.push(Value::Text(registration_number.to_string()));

        let db = self.db.lock();
        let changed = db
            .conn()
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(|err| match unique_violation(&err) {
                Some(UniqueViolation::RegistrationNumber) => {
                    CheckinError::DuplicateRegistrationNumber {
                        event_id: event_id.to_string(),
                        registration_number: patch
                            .registration_number
                            .clone()
                            .unwrap_or_else(|| registration_number.to_string()),
                    }
                }
                Some(UniqueViolation::Email) => CheckinError::DuplicateEmail {
                    event_id: event_id.to_string(),
                    email: patch.email.clone().unwrap_or_default(),
                },
                _ => err.into(),
            })?;

        if changed == 0 {
            return Err(not_found(event_id, registration_number));
        }
        debug!(event_id, registration_number, columns = assignments.len(), "updated attendee");
        Ok(())
    }

    /// Check an attendee in (stamping the local time) or clear the check-in.
    pub fn set_checked_in(&self, event_id: &str, registration_number: &str, checked_in: bool) -> Result<()> {
        self.update_attendee(event_id, registration_number, &AttendeePatch::check_in(checked_in))?;
        info!(event_id, registration_number, checked_in, "check-in state changed");
        Ok(())
    }

    pub fn delete_attendee(&self, event_id: &str, registration_number: &str) -> Result<()> {
        let db = self.db.lock();
        let removed = db.conn().execute(
            "DELETE FROM attendees WHERE event_id = ?1 AND registration_number = ?2",
            params![event_id, registration_number],
        )?;
        if removed == 0 {
            return Err(not_found(event_id, registration_number));
        }
        info!(event_id, registration_number, "deleted attendee");
        Ok(())
    }

    /// Next `REG######` for the event.
    ///
    /// If the lookup fails the number is derived from the clock instead,
    /// which is not guaranteed to be increasing or unique.
    pub fn generate_registration_number(&self, event_id: &str) -> String {
        let db = self.db.lock();
        allocate_registration_number(db.conn(), event_id)
    }

    /// Required fields that are missing or blank in `record`.
    #[must_use]
    pub fn validate_required(&self, record: &AttendeeRecord) -> Vec<Field> {
        core::validate_required(record, &self.fields)
    }

    pub fn checkin_stats(&self, event_id: &str) -> Result<CheckinStats> {
        let db = self.db.lock();
        let (total, checked_in): (i64, i64) = db.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(checked_in), 0) FROM attendees WHERE event_id = ?1",
            [event_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let total = u64::try_from(total).unwrap_or_default();
        let checked_in = u64::try_from(checked_in).unwrap_or_default();
        Ok(CheckinStats {
            event_id: event_id.to_string(),
            total,
            checked_in,
            not_checked_in: total.saturating_sub(checked_in),
        })
    }

    /// Known event ids, sorted.
    pub fn list_events(&self) -> Result<Vec<String>> {
        let db = self.db.lock();
        let mut stmt = db.conn().prepare("SELECT id FROM events ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    /// Encode rows with the configured CSV columns.
    pub fn generate_csv(&self, rows: &[AttendeeRecord]) -> Result<String> {
        core::generate_csv(self.fields.csv_fields(), rows)
    }

    /// Decode a CSV, requiring the configured required columns.
    pub fn parse_csv(&self, input: &str) -> Result<Vec<AttendeeRecord>> {
        core::parse_csv(input, &self.fields)
    }
}

/// Make sure the `events` row referenced by `attendees.event_id` exists.
pub(crate) fn ensure_event(conn: &Connection, event_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO events (id, created_at) VALUES (?1, ?2)",
        params![event_id, now_timestamp()],
    )?;
    Ok(())
}

fn next_registration_number(conn: &Connection, event_id: &str) -> Result<u64> {
    let mut stmt = conn.prepare(
        "SELECT registration_number FROM attendees \
         WHERE event_id = ?1 AND registration_number LIKE 'REG%'",
    )?;
    let rows = stmt.query_map([event_id], |row| row.get::<_, String>(0))?;
    let mut max = 0;
    for row in rows {
        if let Some(value) = parse_registration_number(&row?) {
            max = max.max(value);
        }
    }
    Ok(max + 1)
}

fn allocate_registration_number(conn: &Connection, event_id: &str) -> String {
    match next_registration_number(conn, event_id) {
        Ok(next) => format_registration_number(next),
        Err(err) => {
            warn!(event_id, error = %err, "registration lookup failed, using clock-derived number");
            let millis = Utc::now().timestamp_millis().rem_euclid(1_000_000);
            format_registration_number(u64::try_from(millis).unwrap_or_default())
        }
    }
}

fn check_duplicates(conn: &Connection, event_id: &str, record: &AttendeeRecord) -> Result<()> {
    let email = Some(record.email.as_str()).filter(|email| !email.is_empty());
    let mut stmt = conn.prepare(
        "SELECT registration_number FROM attendees \
         WHERE event_id = ?1 AND (registration_number = ?2 OR email = ?3)",
    )?;
    let matches = stmt.query_map(params![event_id, record.registration_number, email], |row| {
        row.get::<_, String>(0)
    })?;

    let mut email_taken = false;
    for existing in matches {
        if existing? == record.registration_number {
            return Err(CheckinError::DuplicateRegistrationNumber {
                event_id: event_id.to_string(),
                registration_number: record.registration_number.clone(),
            });
        }
        email_taken = true;
    }
    if email_taken {
        return Err(CheckinError::DuplicateEmail {
            event_id: event_id.to_string(),
            email: record.email.clone(),
        });
    }
    Ok(())
}

fn insert_attendee(
    conn: &Connection,
    event_id: &str,
    record: &AttendeeRecord,
    now: &str,
) -> rusqlite::Result<usize> {
    let email = Some(record.email.trim()).filter(|email| !email.is_empty());
    conn.prepare_cached(INSERT_ATTENDEE)?.execute(params![
        event_id,
        record.registration_number,
        record.name,
        record.company,
        record.contact,
        email,
        record.invitation_type,
        record.checked_in,
        record.checkin_time,
        now,
    ])
}

fn optional_text(value: &str) -> Value {
    if value.trim().is_empty() {
        Value::Null
    } else {
        Value::Text(value.trim().to_string())
    }
}

fn duplicate_error(err: rusqlite::Error, event_id: &str, record: &AttendeeRecord) -> CheckinError {
    match unique_violation(&err) {
        Some(UniqueViolation::RegistrationNumber) => CheckinError::DuplicateRegistrationNumber {
            event_id: event_id.to_string(),
            registration_number: record.registration_number.clone(),
        },
        Some(UniqueViolation::Email) => CheckinError::DuplicateEmail {
            event_id: event_id.to_string(),
            email: record.email.clone(),
        },
        _ => err.into(),
    }
}

fn not_found(event_id: &str, registration_number: &str) -> CheckinError {
    CheckinError::AttendeeNotFound {
        event_id: event_id.to_string(),
        registration_number: registration_number.to_string(),
    }
}

fn attendee_from_row(row: &Row<'_>) -> rusqlite::Result<Attendee> {
    let email: Option<String> = row.get(4)?;
    Ok(Attendee {
        record: AttendeeRecord {
            registration_number: row.get(0)?,
            name: row.get(1)?,
            company: row.get(2)?,
            contact: row.get(3)?,
            email: email.unwrap_or_default(),
            invitation_type: row.get(5)?,
            checked_in: row.get(6)?,
            checkin_time: row.get(7)?,
        },
        event_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
