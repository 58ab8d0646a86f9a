//! Backup manager: gzip snapshots of the database file, retention pruning
//! and restore with a safety copy.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{BackupConfig, DataPaths};
use crate::error::{CheckinError, Result};
use crate::storage::{BackupOutcome, BackupRecord, SharedDatabase};

const FILENAME_TIMESTAMP: &str = "%Y%m%d_%H%M%S";
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

static BACKUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^attendees_backup_(\d{8}_\d{6})\.db\.gz$").expect("backup filename pattern")
});

/// Backup filename for the given instant.
#[must_use]
pub fn backup_filename(at: DateTime<Local>) -> String {
    format!("attendees_backup_{}.db.gz", at.format(FILENAME_TIMESTAMP))
}

/// True when `name` is a bare backup filename (no path components).
#[must_use]
pub fn is_backup_filename(name: &str) -> bool {
    BACKUP_NAME.is_match(name)
}

/// A backup file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupInfo {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Timestamp encoded in the filename.
    pub created_at: Option<NaiveDateTime>,
    pub modified: DateTime<Utc>,
}

/// Result of a successful [`BackupManager::create_backup`].
#[derive(Debug, Clone, Serialize)]
pub struct CreatedBackup {
    pub backup: BackupInfo,
    pub source_bytes: u64,
    pub cleanup: CleanupReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub kept: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub restored: String,
    pub database_path: PathBuf,
    /// Copy of the live file taken before it was overwritten. `None` only
    /// when there was no live file.
    pub safety_copy: Option<PathBuf>,
    pub bytes: u64,
}

/// Outcome of the most recent backup attempt in this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastRun {
    pub finished_at: String,
    pub filename: String,
    pub status: BackupOutcome,
    pub error: Option<String>,
}

/// Creates, lists, prunes and restores backups of the attendee database.
///
/// Creation and restore hold an internal lock, so a manual backup waits for
/// a scheduled one instead of overlapping it.
#[derive(Debug)]
pub struct BackupManager {
    database_path: PathBuf,
    backup_dir: PathBuf,
    settings: BackupConfig,
    ledger: Option<SharedDatabase>,
    run_lock: Mutex<()>,
    last_run: Mutex<Option<LastRun>>,
}

impl BackupManager {
    #[must_use]
    pub fn new(paths: &DataPaths, settings: BackupConfig) -> Self {
        Self {
            database_path: paths.database_path(),
            backup_dir: paths.backup_dir(),
            settings,
            ledger: None,
            run_lock: Mutex::new(()),
            last_run: Mutex::new(None),
        }
    }

    /// Attach the store connection: used for the WAL checkpoint before a
    /// snapshot and, when enabled, for `backup_history` rows.
    #[must_use]
    pub fn with_ledger(mut self, db: SharedDatabase) -> Self {
        self.ledger = Some(db);
        self
    }

    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    #[must_use]
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    #[must_use]
    pub const fn settings(&self) -> &BackupConfig {
        &self.settings
    }

    #[must_use]
    pub fn last_run(&self) -> Option<LastRun> {
        self.last_run.lock().clone()
    }

    /// Snapshot the database file into a new gzip backup, record the
    /// outcome, then apply retention.
    ///
    /// Writers are not paused. The copy reflects whatever the main file
    /// holds while it is read, so it is only approximately point-in-time.
    pub fn create_backup(&self) -> Result<CreatedBackup> {
        let _guard = self.run_lock.lock();
        let filename = self.unused_filename();
        let path = self.backup_dir.join(&filename);

        self.checkpoint();
        let result = self.write_snapshot(&path);

        let (status, size, error_text) = match &result {
            Ok((written, _)) => (BackupOutcome::Success, *written, None),
            Err(err) => (BackupOutcome::Failed, 0, Some(err.to_string())),
        };
        self.record(&filename, status, size, error_text.clone());
        *self.last_run.lock() = Some(LastRun {
            finished_at: Local::now().to_rfc3339(),
            filename: filename.clone(),
            status,
            error: error_text,
        });

        let (size_bytes, source_bytes) = match result {
            Ok(sizes) => sizes,
            Err(err) => {
                error!(file = %filename, error = %err, "backup failed");
                return Err(err);
            }
        };
        info!(
            file = %filename,
            size_bytes,
            source_bytes,
            "backup created"
        );

        let cleanup = self.cleanup_old_backups().unwrap_or_else(|err| {
            warn!(error = %err, "backup retention cleanup failed");
            CleanupReport::default()
        });

        let modified = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);
        Ok(CreatedBackup {
            backup: BackupInfo {
                created_at: filename_timestamp(&filename),
                filename,
                path,
                size_bytes,
                modified,
            },
            source_bytes,
            cleanup,
        })
    }

    /// Apply both retention rules: drop files older than `retention_days`
    /// (0 disables the age rule) and keep at most `max_backups` newest files.
    /// A file that vanished before it could be deleted counts as removed.
    pub fn cleanup_old_backups(&self) -> Result<CleanupReport> {
        let backups = self.list_backups()?;
        let cutoff = self.retention_cutoff();

        let mut report = CleanupReport::default();
        for (idx, backup) in backups.into_iter().enumerate() {
            let expired = cutoff.is_some_and(|cutoff| SystemTime::from(backup.modified) < cutoff);
            let over_cap = idx >= self.settings.max_backups;
            if !expired && !over_cap {
                report.kept += 1;
                continue;
            }

            match fs::remove_file(&backup.path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(file = %backup.filename, "backup already gone");
                }
                Err(err) => return Err(err.into()),
            }
            debug!(file = %backup.filename, expired, over_cap, "pruned backup");
            report.removed.push(backup.filename);
        }

        if !report.removed.is_empty() {
            info!(removed = report.removed.len(), kept = report.kept, "pruned old backups");
        }
        Ok(report)
    }

    /// Backups matching the naming pattern, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry?;
            let filename = entry.file_name().to_string_lossy().to_string();
            if !is_backup_filename(&filename) {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            backups.push(BackupInfo {
                created_at: filename_timestamp(&filename),
                path: entry.path(),
                size_bytes: metadata.len(),
                modified: DateTime::<Utc>::from(metadata.modified()?),
                filename,
            });
        }

        backups.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(backups)
    }

    /// Replace the live database file with the contents of a backup.
    ///
    /// The current file (and its WAL) is copied aside first. The live
    /// database is not reopened or validated afterwards; whatever process
    /// holds it must be restarted.
    pub fn restore_backup(&self, filename: &str) -> Result<RestoreReport> {
        if !is_backup_filename(filename) {
            return Err(CheckinError::Validation(format!(
                "not a backup filename: {filename}"
            )));
        }
        let source = self.backup_dir.join(filename);
        if !source.is_file() {
            return Err(CheckinError::BackupNotFound(filename.to_string()));
        }

        let _guard = self.run_lock.lock();
        let safety_copy = self.write_safety_copy()?;

        let parent = self
            .database_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut staged = tempfile::NamedTempFile::new_in(parent)?;
        let mut decoder = GzDecoder::new(BufReader::new(File::open(&source)?));
        let bytes = io::copy(&mut decoder, staged.as_file_mut())
            .map_err(|err| CheckinError::Backup(format!("decompress {filename}: {err}")))?;
        staged.as_file().sync_all()?;

        fs::copy(staged.path(), &self.database_path)?;
        staged.close()?;

        for sidecar in ["-wal", "-shm"] {
            remove_if_exists(&sidecar_path(&self.database_path, sidecar))?;
        }

        info!(
            file = %filename,
            bytes,
            safety_copy = ?safety_copy,
            "database restored from backup"
        );
        Ok(RestoreReport {
            restored: filename.to_string(),
            database_path: self.database_path.clone(),
            safety_copy,
            bytes,
        })
    }

    /// Ledger rows, newest first. Empty when no store is attached.
    pub fn backup_history(&self, limit: usize) -> Result<Vec<BackupRecord>> {
        match &self.ledger {
            Some(db) => db.lock().list_backup_records(limit),
            None => Ok(Vec::new()),
        }
    }

    fn checkpoint(&self) {
        if let Some(db) = &self.ledger {
            if let Err(err) = db.lock().checkpoint_passive() {
                warn!(error = %err, "WAL checkpoint before backup failed");
            }
        }
    }

    /// Returns (compressed size, source size). Removes the partial file on
    /// failure.
    fn write_snapshot(&self, path: &Path) -> Result<(u64, u64)> {
        if !self.database_path.is_file() {
            return Err(CheckinError::Backup(format!(
                "database file {} does not exist",
                self.database_path.display()
            )));
        }
        fs::create_dir_all(&self.backup_dir)?;

        let target = File::options()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|err| CheckinError::Backup(format!("create {}: {err}", path.display())))?;

        let result = compress_into(&self.database_path, target);
        if result.is_err() {
            if let Err(err) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %err, "could not remove partial backup");
            }
        }
        let source_bytes = result?;
        let size = fs::metadata(path)?.len();
        Ok((size, source_bytes))
    }

    /// Backup name for the current second. Names have second resolution,
    /// so when the previous run finished within the same second, wait for
    /// the clock to move on. Called with `run_lock` held.
    fn unused_filename(&self) -> String {
        loop {
            let now = Local::now();
            let filename = backup_filename(now);
            if !self.backup_dir.join(&filename).exists() {
                return filename;
            }
            let into_second = Duration::from_nanos(u64::from(now.timestamp_subsec_nanos()));
            let wait = Duration::from_secs(1).saturating_sub(into_second);
            debug!(file = %filename, wait_ms = wait.as_millis(), "backup name taken, waiting");
            std::thread::sleep(wait + Duration::from_millis(1));
        }
    }

    fn write_safety_copy(&self) -> Result<Option<PathBuf>> {
        if !self.database_path.is_file() {
            return Ok(None);
        }
        fs::create_dir_all(&self.backup_dir)?;
        let stamp = Local::now().format(FILENAME_TIMESTAMP);
        let safety = self
            .backup_dir
            .join(format!("attendees_before_restore_{stamp}.db"));
        fs::copy(&self.database_path, &safety)?;

        let wal = sidecar_path(&self.database_path, "-wal");
        if wal.is_file() {
            fs::copy(&wal, sidecar_path(&safety, "-wal"))?;
        }
        debug!(path = %safety.display(), "wrote pre-restore safety copy");
        Ok(Some(safety))
    }

    fn record(&self, filename: &str, status: BackupOutcome, size_bytes: u64, error: Option<String>) {
        if !self.settings.record_history {
            return;
        }
        let Some(db) = &self.ledger else {
            return;
        };
        let record = BackupRecord {
            event_id: self.settings.event_id.clone(),
            created_at: crate::storage::sqlite::now_timestamp(),
            filename: filename.to_string(),
            size_bytes,
            status,
            error,
        };
        if let Err(err) = db.lock().insert_backup_record(&record) {
            warn!(file = %filename, error = %err, "could not record backup outcome");
        }
    }

    fn retention_cutoff(&self) -> Option<SystemTime> {
        if self.settings.retention_days == 0 {
            return None;
        }
        let window = Duration::from_secs(u64::from(self.settings.retention_days) * SECONDS_PER_DAY);
        SystemTime::now().checked_sub(window)
    }
}

fn compress_into(source: &Path, target: File) -> Result<u64> {
    let mut reader = BufReader::new(File::open(source)?);
    let mut encoder = GzEncoder::new(BufWriter::new(target), Compression::best());
    let copied = io::copy(&mut reader, &mut encoder)?;
    let mut writer = encoder.finish()?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(io::IntoInnerError::into_error)?
        .sync_all()?;
    Ok(copied)
}

fn filename_timestamp(filename: &str) -> Option<NaiveDateTime> {
    let stamp = BACKUP_NAME.captures(filename)?.get(1)?.as_str();
    NaiveDateTime::parse_from_str(stamp, FILENAME_TIMESTAMP).ok()
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AttendeeRecord, FieldConfig};
    use crate::storage::{AttendeeStore, Migrator};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        paths: DataPaths,
        store: AttendeeStore,
        manager: BackupManager,
    }

    fn fixture(rows: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::new(dir.path());
        let migrator = Migrator::new(paths.clone(), FieldConfig::default());
        let db = migrator.run_migrations().unwrap().into_shared();
        let store = AttendeeStore::new(db.clone(), FieldConfig::default());
        let records: Vec<AttendeeRecord> = (1..=rows)
            .map(|n| AttendeeRecord {
                registration_number: format!("REG{n:06}"),
                name: format!("참가자 {n}"),
                company: "Acme Corporation".into(),
                email: format!("guest{n}@example.com"),
                invitation_type: "초대".into(),
                ..AttendeeRecord::default()
            })
            .collect();
        store.write_attendees("expo", &records).unwrap();

        let manager = BackupManager::new(&paths, BackupConfig::default()).with_ledger(db);
        Fixture {
            _dir: dir,
            paths,
            store,
            manager,
        }
    }

    fn touch_backup(dir: &Path, name: &str, age_days: u64) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, b"not really gzip").unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_days * SECONDS_PER_DAY);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    #[test]
    fn filename_pattern() {
        let name = backup_filename(Local::now());
        assert!(is_backup_filename(&name));
        assert!(filename_timestamp(&name).is_some());
        assert!(!is_backup_filename("../attendees_backup_20250101_020000.db.gz"));
        assert!(!is_backup_filename("attendees_before_restore_20250101_020000.db"));
        assert!(!is_backup_filename("attendees_backup_2025_0200.db.gz"));
    }

    #[test]
    fn create_compresses_and_lists_first() {
        let fx = fixture(500);
        touch_backup(fx.manager.backup_dir(), "attendees_backup_20200101_020000.db.gz", 1);

        let created = fx.manager.create_backup().unwrap();
        assert!(created.backup.size_bytes > 0);
        assert!(created.backup.size_bytes < created.source_bytes);

        let listed = fx.manager.list_backups().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].filename, created.backup.filename);
        assert_eq!(listed[0].size_bytes, created.backup.size_bytes);

        let history = fx.manager.backup_history(10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, BackupOutcome::Success);
        assert_eq!(history[0].filename, created.backup.filename);
        assert_eq!(
            fx.manager.last_run().map(|run| run.status),
            Some(BackupOutcome::Success)
        );
    }

    #[test]
    fn back_to_back_backups_get_distinct_names() {
        let fx = fixture(5);

        let first = fx.manager.create_backup().unwrap();
        let second = fx.manager.create_backup().unwrap();
        assert_ne!(first.backup.filename, second.backup.filename);
        assert!(is_backup_filename(&second.backup.filename));

        let listed = fx.manager.list_backups().unwrap();
        assert_eq!(listed.len(), 2);

        let history = fx.manager.backup_history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|row| row.status == BackupOutcome::Success));
    }

    #[test]
    fn ledger_failure_does_not_fail_backup() {
        let fx = fixture(10);
        fx.store
            .database()
            .lock()
            .conn()
            .execute_batch("DROP TABLE backup_history;")
            .unwrap();

        let created = fx.manager.create_backup().unwrap();
        assert!(created.backup.path.exists());
    }

    #[test]
    fn missing_database_is_recorded_as_failure() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::new(dir.path());
        let manager = BackupManager::new(&paths, BackupConfig::default());

        let err = manager.create_backup().unwrap_err();
        assert!(matches!(err, CheckinError::Backup(_)));
        assert_eq!(
            manager.last_run().map(|run| run.status),
            Some(BackupOutcome::Failed)
        );
        assert!(manager.list_backups().unwrap().is_empty());
    }

    #[test]
    fn cleanup_applies_age_window() {
        let fx = fixture(1);
        let dir = fx.manager.backup_dir().to_path_buf();
        let old = touch_backup(&dir, "attendees_backup_20250101_020000.db.gz", 31);
        let recent = touch_backup(&dir, "attendees_backup_20250103_020000.db.gz", 29);

        let report = fx.manager.cleanup_old_backups().unwrap();
        assert_eq!(report.removed, vec!["attendees_backup_20250101_020000.db.gz"]);
        assert!(!old.exists());
        assert!(recent.exists());
    }

    #[test]
    fn cleanup_caps_count_within_window() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::new(dir.path());
        let settings = BackupConfig {
            max_backups: 2,
            ..BackupConfig::default()
        };
        let manager = BackupManager::new(&paths, settings);
        for day in 1..=4u64 {
            touch_backup(
                manager.backup_dir(),
                &format!("attendees_backup_2025010{day}_020000.db.gz"),
                10 - day,
            );
        }

        let report = manager.cleanup_old_backups().unwrap();
        assert_eq!(report.kept, 2);
        let names: Vec<String> = manager
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|b| b.filename)
            .collect();
        assert_eq!(
            names,
            vec![
                "attendees_backup_20250104_020000.db.gz",
                "attendees_backup_20250103_020000.db.gz",
            ]
        );
    }

    #[test]
    fn restore_writes_safety_copy_first() {
        let fx = fixture(3);
        let created = fx.manager.create_backup().unwrap();
        fx.store.write_attendees("expo", &[]).unwrap();

        // Restore runs with the store closed, as after a process restart.
        let Fixture {
            _dir,
            paths,
            store,
            manager,
        } = fx;
        drop(store);
        drop(manager);

        let manager = BackupManager::new(&paths, BackupConfig::default());
        let report = manager.restore_backup(&created.backup.filename).unwrap();
        let safety = report.safety_copy.unwrap();
        assert!(safety.exists());
        assert!(
            safety
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("attendees_before_restore_")
        );
        assert!(!manager.list_backups().unwrap().iter().any(|b| b.path == safety));

        let reopened = crate::storage::Database::open(paths.database_path()).unwrap();
        let count: i64 = reopened
            .conn()
            .query_row("SELECT COUNT(*) FROM attendees", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn restore_rejects_unknown_or_unsafe_names() {
        let fx = fixture(1);
        assert!(matches!(
            fx.manager.restore_backup("attendees_backup_19990101_000000.db.gz"),
            Err(CheckinError::BackupNotFound(_))
        ));
        assert!(matches!(
            fx.manager.restore_backup("../attendees.db"),
            Err(CheckinError::Validation(_))
        ));
    }
}
