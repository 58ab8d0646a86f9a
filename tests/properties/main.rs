//! Property test suite entry point.

mod csv_roundtrip_tests;
mod registration_tests;
