//! Integration test suite entry point.
//!
//! Exercises the library end to end against a temporary data root.

mod backup_tests;
mod fixture;
mod migration_tests;
mod store_tests;
