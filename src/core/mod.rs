//! Core domain types: attendees, their external fields, and the CSV codec.

pub mod attendee;
pub mod codec;
pub mod fields;

pub use attendee::{
    Attendee, AttendeePatch, AttendeeRecord, CHECKIN_TIME_FORMAT, format_registration_number,
    parse_registration_number, validate_required,
};
pub use codec::{generate_csv, parse_csv};
pub use fields::{Field, FieldConfig};
