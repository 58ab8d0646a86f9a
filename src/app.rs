//! Application context shared by every command.

use std::path::PathBuf;

use crate::backup::BackupManager;
use crate::cli::Cli;
use crate::config::{Config, DataPaths};
use crate::core::FieldConfig;
use crate::error::Result;
use crate::storage::{AttendeeStore, Migrator};

/// Resolved configuration and data layout for one invocation.
///
/// Nothing is opened at construction; commands open the database through
/// [`AppContext::open_store`] so that read-only commands never create it.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    pub paths: DataPaths,
    pub fields: FieldConfig,
    pub robot_mode: bool,
    pub config_path: Option<PathBuf>,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref(), cli.data_dir.as_deref())?;
        Self::from_config(config, cli.robot, cli.config.clone())
    }

    pub fn from_config(config: Config, robot_mode: bool, config_path: Option<PathBuf>) -> Result<Self> {
        let fields = config.field_config()?;
        let paths = config.paths();
        Ok(Self {
            config,
            paths,
            fields,
            robot_mode,
            config_path,
        })
    }

    #[must_use]
    pub fn migrator(&self) -> Migrator {
        Migrator::new(self.paths.clone(), self.fields.clone())
    }

    /// Apply pending migrations and hand back a store on the live database.
    pub fn open_store(&self) -> Result<AttendeeStore> {
        let db = self.migrator().run_migrations()?.into_shared();
        Ok(AttendeeStore::new(db, self.fields.clone()))
    }

    /// Backup manager with the store attached as its ledger when the
    /// database already exists.
    pub fn backup_manager(&self) -> Result<BackupManager> {
        let manager = BackupManager::new(&self.paths, self.config.backup.clone());
        if !self.paths.database_path().exists() {
            return Ok(manager);
        }
        let store = self.open_store()?;
        Ok(manager.with_ledger(store.database().clone()))
    }

    /// Backup manager that never opens the database, for restore.
    #[must_use]
    pub fn detached_backup_manager(&self) -> BackupManager {
        BackupManager::new(&self.paths, self.config.backup.clone())
    }
}
