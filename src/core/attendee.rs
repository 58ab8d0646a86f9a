//! Attendee domain types.

use chrono::Local;
use serde::{Deserialize, Serialize};

use super::fields::{Field, FieldConfig};

/// Prefix of allocated registration numbers.
pub const REGISTRATION_PREFIX: &str = "REG";

/// Digits after the prefix.
pub const REGISTRATION_DIGITS: usize = 6;

/// Format used for `checkin_time` values written by the store.
pub const CHECKIN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One attendee in its external representation (CSV row, API payload).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeRecord {
    pub registration_number: String,
    pub name: String,
    pub company: String,
    pub contact: String,
    pub email: String,
    pub invitation_type: String,
    pub checked_in: bool,
    pub checkin_time: Option<String>,
}

impl AttendeeRecord {
    /// Textual value of one field, as written to CSV.
    #[must_use]
    pub fn value(&self, field: Field) -> String {
        match field {
            Field::RegistrationNumber => self.registration_number.clone(),
            Field::Name => self.name.clone(),
            Field::Company => self.company.clone(),
            Field::Contact => self.contact.clone(),
            Field::Email => self.email.clone(),
            Field::InvitationType => self.invitation_type.clone(),
            Field::CheckedIn => if self.checked_in { "Y" } else { "N" }.to_string(),
            Field::CheckinTime => self.checkin_time.clone().unwrap_or_default(),
        }
    }

    /// Set one field from its textual value.
    pub fn set_value(&mut self, field: Field, raw: &str) {
        match field {
            Field::RegistrationNumber => raw.clone_into(&mut self.registration_number),
            Field::Name => raw.clone_into(&mut self.name),
            Field::Company => raw.clone_into(&mut self.company),
            Field::Contact => raw.clone_into(&mut self.contact),
            Field::Email => raw.clone_into(&mut self.email),
            Field::InvitationType => raw.clone_into(&mut self.invitation_type),
            Field::CheckedIn => self.checked_in = parse_flag(raw),
            Field::CheckinTime => {
                self.checkin_time = if raw.trim().is_empty() {
                    None
                } else {
                    Some(raw.to_string())
                };
            }
        }
    }
}

/// A stored attendee, with the event it belongs to and row timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub event_id: String,
    #[serde(flatten)]
    pub record: AttendeeRecord,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update: only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeePatch {
    pub registration_number: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub invitation_type: Option<String>,
    pub checked_in: Option<bool>,
    /// `Some(None)` clears the check-in time.
    pub checkin_time: Option<Option<String>>,
}

impl AttendeePatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.registration_number.is_none()
            && self.name.is_none()
            && self.company.is_none()
            && self.contact.is_none()
            && self.email.is_none()
            && self.invitation_type.is_none()
            && self.checked_in.is_none()
            && self.checkin_time.is_none()
    }

    /// Patch that checks an attendee in now, or clears the check-in.
    #[must_use]
    pub fn check_in(checked_in: bool) -> Self {
        Self {
            checked_in: Some(checked_in),
            checkin_time: Some(checked_in.then(now_checkin_time)),
            ..Self::default()
        }
    }
}

/// Required fields that are missing or blank in `record`.
#[must_use]
pub fn validate_required(record: &AttendeeRecord, fields: &FieldConfig) -> Vec<Field> {
    fields
        .required()
        .iter()
        .copied()
        .filter(|field| record.value(*field).trim().is_empty())
        .collect()
}

#[must_use]
pub fn format_registration_number(sequence: u64) -> String {
    format!("{REGISTRATION_PREFIX}{sequence:0width$}", width = REGISTRATION_DIGITS)
}

/// Numeric part of a `REG`-prefixed registration number.
#[must_use]
pub fn parse_registration_number(value: &str) -> Option<u64> {
    let digits = value.strip_prefix(REGISTRATION_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[must_use]
pub fn now_checkin_time() -> String {
    Local::now().format(CHECKIN_TIME_FORMAT).to_string()
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "y" | "yes" | "true" | "1" | "o" | "checked" | "완료"
    )
}
