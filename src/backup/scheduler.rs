//! Cron-driven backup scheduler.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Local;
use cron::Schedule;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::manager::{BackupManager, LastRun};
use crate::error::{CheckinError, Result};

/// Parse a cron expression. Five-field expressions (minute first) get a
/// leading seconds field of `0`.
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    let normalized = if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    };
    Schedule::from_str(&normalized).map_err(|err| CheckinError::InvalidSchedule {
        expression: expression.to_string(),
        reason: err.to_string(),
    })
}

/// Snapshot of scheduler and retention settings.
#[derive(Debug, Clone, Serialize)]
pub struct BackupStatus {
    pub running: bool,
    pub schedule: String,
    pub backup_dir: PathBuf,
    pub retention_days: u32,
    pub max_backups: usize,
    pub run_on_start: bool,
    pub next_run: Option<String>,
    pub last_run: Option<LastRun>,
}

/// Runs [`BackupManager::create_backup`] on a cron schedule.
///
/// Fires never overlap: the next fire time is computed only after the
/// previous backup finished.
#[derive(Debug)]
pub struct BackupScheduler {
    manager: Arc<BackupManager>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BackupScheduler {
    #[must_use]
    pub const fn new(manager: Arc<BackupManager>) -> Self {
        Self {
            manager,
            task: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn manager(&self) -> &Arc<BackupManager> {
        &self.manager
    }

    /// Start the schedule on the current tokio runtime.
    ///
    /// Returns `false` without doing anything if already running.
    pub fn start(&self) -> Result<bool> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("backup scheduler already running");
            return Ok(false);
        }

        let settings = self.manager.settings();
        let schedule = parse_schedule(&settings.schedule)?;
        let run_on_start = settings.run_on_start;
        let manager = Arc::clone(&self.manager);

        *task = Some(tokio::spawn(async move {
            if run_on_start {
                run_once(&manager).await;
            }
            loop {
                let Some(next) = schedule.upcoming(Local).next() else {
                    warn!("backup schedule has no future fire times");
                    break;
                };
                let wait = (next - Local::now()).to_std().unwrap_or_default();
                debug!(next = %next, "next scheduled backup");
                tokio::time::sleep(wait).await;
                run_once(&manager).await;
            }
        }));

        info!(
            schedule = %settings.schedule,
            run_on_start,
            "backup scheduler started"
        );
        Ok(true)
    }

    /// Stop future fires. A backup already in progress runs to completion.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("backup scheduler stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    #[must_use]
    pub fn status(&self) -> BackupStatus {
        let settings = self.manager.settings();
        let next_run = parse_schedule(&settings.schedule)
            .ok()
            .and_then(|schedule| schedule.upcoming(Local).next())
            .map(|next| next.to_rfc3339());
        BackupStatus {
            running: self.is_running(),
            schedule: settings.schedule.clone(),
            backup_dir: self.manager.backup_dir().to_path_buf(),
            retention_days: settings.retention_days,
            max_backups: settings.max_backups,
            run_on_start: settings.run_on_start,
            next_run,
            last_run: self.manager.last_run(),
        }
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run_once(manager: &Arc<BackupManager>) {
    let manager = Arc::clone(manager);
    match tokio::task::spawn_blocking(move || manager.create_backup()).await {
        Ok(Ok(created)) => {
            debug!(file = %created.backup.filename, "scheduled backup finished");
        }
        Ok(Err(err)) => error!(error = %err, "scheduled backup failed"),
        Err(err) => error!(error = %err, "scheduled backup task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{BackupConfig, DataPaths};
    use crate::storage::Database;
    use tempfile::TempDir;

    fn manager(dir: &TempDir, settings: BackupConfig) -> Arc<BackupManager> {
        let paths = DataPaths::new(dir.path());
        Database::open(paths.database_path()).unwrap();
        Arc::new(BackupManager::new(&paths, settings))
    }

    #[test]
    fn parses_five_and_six_field_expressions() {
        assert!(parse_schedule("0 2 * * *").is_ok());
        assert!(parse_schedule("30 0 2 * * *").is_ok());
        let err = parse_schedule("every day at two").unwrap_err();
        assert!(matches!(err, CheckinError::InvalidSchedule { .. }));
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_halts() {
        let dir = TempDir::new().unwrap();
        let scheduler = BackupScheduler::new(manager(&dir, BackupConfig::default()));

        assert!(scheduler.start().unwrap());
        assert!(!scheduler.start().unwrap());
        assert!(scheduler.status().running);
        assert!(scheduler.status().next_run.is_some());

        scheduler.stop();
        assert!(!scheduler.is_running());
        assert!(scheduler.start().unwrap());
        scheduler.stop();
    }

    #[tokio::test]
    async fn invalid_schedule_fails_start() {
        let dir = TempDir::new().unwrap();
        let settings = BackupConfig {
            schedule: "61 * * * *".into(),
            ..BackupConfig::default()
        };
        let scheduler = BackupScheduler::new(manager(&dir, settings));
        assert!(matches!(
            scheduler.start(),
            Err(CheckinError::InvalidSchedule { .. })
        ));
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn run_on_start_creates_a_backup() {
        let dir = TempDir::new().unwrap();
        let settings = BackupConfig {
            schedule: "0 0 1 1 *".into(),
            run_on_start: true,
            ..BackupConfig::default()
        };
        let scheduler = BackupScheduler::new(manager(&dir, settings));
        scheduler.start().unwrap();

        for _ in 0..200 {
            if scheduler.manager().last_run().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        scheduler.stop();

        let last_run = scheduler.status().last_run.unwrap();
        assert_eq!(last_run.status, crate::storage::BackupOutcome::Success);
        assert_eq!(scheduler.manager().list_backups().unwrap().len(), 1);
    }
}
