//! CSV encoding and decoding of attendee rows.
//!
//! Values containing commas, quotes or line breaks are quoted on output and
//! unquoted on input, so embedded newlines survive a round trip.

use csv::{QuoteStyle, ReaderBuilder, Terminator, Trim, WriterBuilder};

use super::attendee::AttendeeRecord;
use super::fields::{Field, FieldConfig};
use crate::error::{CheckinError, Result};

const UTF8_BOM: char = '\u{feff}';

/// Encode rows with the given columns, header row first.
pub fn generate_csv(fields: &[Field], rows: &[AttendeeRecord]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(fields.iter().map(|field| field.header()))?;
    for row in rows {
        writer.write_record(fields.iter().map(|field| row.value(*field)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| CheckinError::Io(err.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|err| CheckinError::Validation(format!("generated CSV is not UTF-8: {err}")))
}

/// Decode a CSV whose header names the columns.
///
/// Fails with [`CheckinError::MissingColumns`] when a required column is
/// absent from the header. Unknown columns are ignored; short rows leave the
/// remaining fields empty. Empty lines are skipped, but a row whose values
/// are all blank is kept: with a single configured column that is exactly
/// what [`generate_csv`] writes for an empty record.
pub fn parse_csv(input: &str, config: &FieldConfig) -> Result<Vec<AttendeeRecord>> {
    let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::None)
        .from_reader(input.as_bytes());

    let columns: Vec<Option<Field>> = reader.headers()?.iter().map(Field::parse).collect();

    let missing: Vec<String> = config
        .required()
        .iter()
        .filter(|field| !columns.contains(&Some(**field)))
        .map(|field| field.header().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CheckinError::MissingColumns { columns: missing });
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row = AttendeeRecord::default();
        for (column, value) in columns.iter().zip(record.iter()) {
            if let Some(field) = column {
                row.set_value(*field, value);
            }
        }
        rows.push(row);
    }
    Ok(rows)
}
