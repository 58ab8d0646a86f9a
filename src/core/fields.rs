//! External field names and the configured CSV column set.
//!
//! The legacy CSV files and the upload format use Korean column headers.
//! Every header resolves to a [`Field`], which knows its storage column.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CheckinError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    RegistrationNumber,
    Name,
    Company,
    Contact,
    Email,
    InvitationType,
    CheckedIn,
    CheckinTime,
}

impl Field {
    /// Every field in default CSV order.
    pub const ALL: [Self; 8] = [
        Self::RegistrationNumber,
        Self::Name,
        Self::Company,
        Self::Contact,
        Self::Email,
        Self::InvitationType,
        Self::CheckedIn,
        Self::CheckinTime,
    ];

    /// Header label used in CSV files.
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::RegistrationNumber => "등록번호",
            Self::Name => "고객명",
            Self::Company => "회사명",
            Self::Contact => "연락처",
            Self::Email => "이메일",
            Self::InvitationType => "초대/현장방문",
            Self::CheckedIn => "체크인",
            Self::CheckinTime => "체크인시간",
        }
    }

    /// Column name in the `attendees` table.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::RegistrationNumber => "registration_number",
            Self::Name => "name",
            Self::Company => "company",
            Self::Contact => "contact",
            Self::Email => "email",
            Self::InvitationType => "invitation_type",
            Self::CheckedIn => "checked_in",
            Self::CheckinTime => "checkin_time",
        }
    }

    /// Resolve a header label or column name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.header() == name || field.column().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl FromStr for Field {
    type Err = CheckinError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| CheckinError::Config(format!("unknown attendee field '{s}'")))
    }
}

/// Which columns a CSV carries, in order, and which of them must be filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConfig {
    csv_fields: Vec<Field>,
    required: Vec<Field>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            csv_fields: Field::ALL.to_vec(),
            required: vec![Field::Name, Field::Email],
        }
    }
}

impl FieldConfig {
    /// Build a field configuration; required fields must be part of the CSV set.
    pub fn new(csv_fields: Vec<Field>, required: Vec<Field>) -> Result<Self> {
        if csv_fields.is_empty() {
            return Err(CheckinError::Config("CSV field list is empty".to_string()));
        }
        if let Some(stray) = required.iter().find(|field| !csv_fields.contains(field)) {
            return Err(CheckinError::Config(format!(
                "required field '{stray}' is not one of the CSV fields"
            )));
        }
        Ok(Self {
            csv_fields: dedup(csv_fields),
            required: dedup(required),
        })
    }

    /// Build from header labels or column names, as found in config files.
    pub fn from_names<S: AsRef<str>>(csv_fields: &[S], required: &[S]) -> Result<Self> {
        let csv_fields = csv_fields
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<Field>>>()?;
        let required = required
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<Field>>>()?;
        Self::new(csv_fields, required)
    }

    #[must_use]
    pub fn csv_fields(&self) -> &[Field] {
        &self.csv_fields
    }

    #[must_use]
    pub fn required(&self) -> &[Field] {
        &self.required
    }
}

fn dedup(fields: Vec<Field>) -> Vec<Field> {
    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        if !out.contains(&field) {
            out.push(field);
        }
    }
    out
}
