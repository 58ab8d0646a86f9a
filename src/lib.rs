//! checkin: event attendee store with versioned migrations, one-time legacy
//! CSV import and scheduled gzip backups.

pub mod app;
pub mod backup;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;

pub use error::{CheckinError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
