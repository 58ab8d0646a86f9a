use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::FieldConfig;
use crate::error::{CheckinError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub attendees: AttendeesConfig,
    #[serde(default)]
    pub backup: BackupConfig,
}

impl Config {
    /// Load defaults, then the TOML file, then environment overrides.
    ///
    /// The file is `explicit_path`, else `$CHECKIN_CONFIG`, else
    /// `config.toml` under `data_dir` (or the default `data`) when it
    /// exists. A `[storage] data_dir` inside that file does not move the
    /// lookup.
    pub fn load(explicit_path: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = data_dir {
            config.storage.data_dir = dir.to_path_buf();
        }

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("CHECKIN_CONFIG").ok().map(PathBuf::from));

        let path = explicit.unwrap_or_else(|| config.storage.data_dir.join("config.toml"));
        if let Some(patch) = Self::load_patch(&path)? {
            config.merge_patch(patch);
        }

        config.apply_env_overrides()?;

        // Command-line data dir beats both file and environment.
        if let Some(dir) = data_dir {
            config.storage.data_dir = dir.to_path_buf();
        }

        config.validate()?;
        Ok(config)
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| CheckinError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw).map_err(|err| {
            CheckinError::Config(format!("parse config {}: {err}", path.display()))
        })?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.storage {
            self.storage.merge(patch);
        }
        if let Some(patch) = patch.attendees {
            self.attendees.merge(patch);
        }
        if let Some(patch) = patch.backup {
            self.backup.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let env = EnvSource(lookup);

        if let Some(value) = env.string("CHECKIN_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(value);
        }
        if let Some(values) = env.list("CSV_FIELDS") {
            self.attendees.csv_fields = values;
        }
        if let Some(values) = env.list("REQUIRED_FIELDS") {
            self.attendees.required_fields = values;
        }
        if let Some(value) = env.parsed::<u32>("BACKUP_RETENTION_DAYS")? {
            self.backup.retention_days = value;
        }
        if let Some(value) = env.parsed::<usize>("BACKUP_MAX_COUNT")? {
            self.backup.max_backups = value;
        }
        if let Some(value) = env.string("BACKUP_SCHEDULE") {
            self.backup.schedule = value;
        }
        if let Some(value) = env.bool("BACKUP_ON_START") {
            self.backup.run_on_start = value;
        }
        if let Some(value) = env.bool("BACKUP_RECORD_HISTORY") {
            self.backup.record_history = value;
        }
        if let Some(value) = env.string("BACKUP_EVENT_ID") {
            self.backup.event_id = Some(value).filter(|v| !v.trim().is_empty());
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.backup.max_backups == 0 {
            return Err(CheckinError::Config(
                "backup.max_backups must be at least 1".to_string(),
            ));
        }
        self.field_config().map(|_| ())
    }

    /// Resolve the configured CSV columns.
    pub fn field_config(&self) -> Result<FieldConfig> {
        FieldConfig::from_names(&self.attendees.csv_fields, &self.attendees.required_fields)
    }

    #[must_use]
    pub fn paths(&self) -> DataPaths {
        DataPaths::from_config(&self.storage)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub database_file: String,
    #[serde(default)]
    pub backup_dir_name: String,
    #[serde(default)]
    pub legacy_csv_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            database_file: "attendees.db".to_string(),
            backup_dir_name: "backups".to_string(),
            legacy_csv_name: "attendees.csv".to_string(),
        }
    }
}

impl StorageConfig {
    fn merge(&mut self, patch: StoragePatch) {
        if let Some(value) = patch.data_dir {
            self.data_dir = value;
        }
        if let Some(value) = patch.database_file {
            self.database_file = value;
        }
        if let Some(value) = patch.backup_dir_name {
            self.backup_dir_name = value;
        }
        if let Some(value) = patch.legacy_csv_name {
            self.legacy_csv_name = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendeesConfig {
    /// CSV columns in order, by header label or column name.
    #[serde(default)]
    pub csv_fields: Vec<String>,
    /// Subset of `csv_fields` that must be non-blank.
    #[serde(default)]
    pub required_fields: Vec<String>,
}

impl Default for AttendeesConfig {
    fn default() -> Self {
        let defaults = FieldConfig::default();
        Self {
            csv_fields: defaults
                .csv_fields()
                .iter()
                .map(|field| field.header().to_string())
                .collect(),
            required_fields: defaults
                .required()
                .iter()
                .map(|field| field.header().to_string())
                .collect(),
        }
    }
}

impl AttendeesConfig {
    fn merge(&mut self, patch: AttendeesPatch) {
        if let Some(values) = patch.csv_fields {
            self.csv_fields = values;
        }
        if let Some(values) = patch.required_fields {
            self.required_fields = values;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Backups older than this many days are pruned.
    #[serde(default)]
    pub retention_days: u32,
    /// Newest backups kept regardless of age.
    #[serde(default)]
    pub max_backups: usize,
    /// Cron expression, five or six fields.
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub run_on_start: bool,
    /// Write outcome rows into `backup_history`.
    #[serde(default)]
    pub record_history: bool,
    #[serde(default)]
    pub event_id: Option<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            max_backups: 30,
            schedule: "0 2 * * *".to_string(),
            run_on_start: false,
            record_history: true,
            event_id: None,
        }
    }
}

impl BackupConfig {
    fn merge(&mut self, patch: BackupPatch) {
        if let Some(value) = patch.retention_days {
            self.retention_days = value;
        }
        if let Some(value) = patch.max_backups {
            self.max_backups = value;
        }
        if let Some(value) = patch.schedule {
            self.schedule = value;
        }
        if let Some(value) = patch.run_on_start {
            self.run_on_start = value;
        }
        if let Some(value) = patch.record_history {
            self.record_history = value;
        }
        if let Some(value) = patch.event_id {
            self.event_id = Some(value);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    storage: Option<StoragePatch>,
    attendees: Option<AttendeesPatch>,
    backup: Option<BackupPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    data_dir: Option<PathBuf>,
    database_file: Option<String>,
    backup_dir_name: Option<String>,
    legacy_csv_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AttendeesPatch {
    csv_fields: Option<Vec<String>>,
    required_fields: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct BackupPatch {
    retention_days: Option<u32>,
    max_backups: Option<usize>,
    schedule: Option<String>,
    run_on_start: Option<bool>,
    record_history: Option<bool>,
    event_id: Option<String>,
}

/// Filesystem layout under the data root.
///
/// Every subdirectory of the data root other than the backup directory is a
/// legacy per-event directory named after its event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    data_dir: PathBuf,
    database_file: String,
    backup_dir_name: String,
    legacy_csv_name: String,
}

impl DataPaths {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::from_config(&StorageConfig {
            data_dir: data_dir.into(),
            ..StorageConfig::default()
        })
    }

    fn from_config(storage: &StorageConfig) -> Self {
        Self {
            data_dir: storage.data_dir.clone(),
            database_file: storage.database_file.clone(),
            backup_dir_name: storage.backup_dir_name.clone(),
            legacy_csv_name: storage.legacy_csv_name.clone(),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join(&self.backup_dir_name)
    }

    #[must_use]
    pub fn backup_dir_name(&self) -> &str {
        &self.backup_dir_name
    }

    /// Legacy CSV inside one event directory.
    #[must_use]
    pub fn legacy_csv(&self, event_dir: &Path) -> PathBuf {
        event_dir.join(&self.legacy_csv_name)
    }
}

struct EnvSource<F>(F);

impl<F: Fn(&str) -> Option<String>> EnvSource<F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn bool(&self, key: &str) -> Option<bool> {
        (self.0)(key).map(|value| {
            matches!(
                value.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.0)(key) {
            Some(value) => value.trim().parse::<T>().map(Some).map_err(|err| {
                CheckinError::Config(format!("invalid {key} value {value}: {err}"))
            }),
            None => Ok(None),
        }
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        (self.0)(key).map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}
