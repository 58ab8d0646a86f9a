//! Shared test fixture: a temporary data root with a resolved context.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use checkin::app::AppContext;
use checkin::config::Config;
use checkin::core::AttendeeRecord;
use tempfile::TempDir;

pub const HEADER: &str = "등록번호,고객명,회사명,연락처,이메일,초대/현장방문,체크인,체크인시간";

pub struct TestFixture {
    /// Keeps the data root alive for the duration of the test
    _temp_dir: TempDir,
    pub root: PathBuf,
    pub ctx: AppContext,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Fixture whose config is adjusted before the context is built
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();

        let mut config = Config::default();
        config.storage.data_dir = root.clone();
        adjust(&mut config);
        let ctx = AppContext::from_config(config, false, None).expect("Failed to build context");

        Self {
            _temp_dir: temp_dir,
            root,
            ctx,
        }
    }

    /// Write a legacy `attendees.csv` for one event directory
    pub fn write_legacy_csv(&self, event_id: &str, rows: &[&str]) -> PathBuf {
        let dir = self.root.join(event_id);
        std::fs::create_dir_all(&dir).expect("Failed to create event dir");
        let path = dir.join("attendees.csv");
        let mut content = String::from(HEADER);
        content.push('\n');
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        std::fs::write(&path, content).expect("Failed to write legacy CSV");
        path
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.ctx.paths.backup_dir()
    }
}

pub fn attendee(registration_number: &str, name: &str, email: &str) -> AttendeeRecord {
    AttendeeRecord {
        registration_number: registration_number.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        ..AttendeeRecord::default()
    }
}

/// Backdate a file's modification time.
pub fn age_file(path: &Path, days: u64) {
    let file = std::fs::File::options()
        .write(true)
        .open(path)
        .expect("Failed to open file for mtime");
    let when = SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60);
    file.set_modified(when).expect("Failed to set mtime");
}
