use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DATA_FILE_ENV: &str = "DASHBOARD_STORE_FILE";
pub const EXPORT_DIR_ENV: &str = "DASHBOARD_STORE_EXPORT_DIR";
pub const LOG_DIR_ENV: &str = "DASHBOARD_STORE_LOG_DIR";

const DEFAULT_DATA_FILE: &str = "dashboards.json";
const BACKUP_SUFFIX: &str = ".backup";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    pub data_file: PathBuf,
    pub export_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::for_data_file(DEFAULT_DATA_FILE)
    }
}

impl StoreConfig {
    /// Derives the export and log directories from the data file location.
    pub fn for_data_file(data_file: impl Into<PathBuf>) -> Self {
        let data_file = data_file.into();
        let parent = data_dir(&data_file);
        Self {
            export_dir: parent.clone(),
            log_dir: parent.join("logs"),
            data_file,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty()).map(PathBuf::from);

        let mut config = Self::for_data_file(read(DATA_FILE_ENV).unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)));
        if let Some(export_dir) = read(EXPORT_DIR_ENV) {
            config.export_dir = export_dir;
        }
        if let Some(log_dir) = read(LOG_DIR_ENV) {
            config.log_dir = log_dir;
        }
        config
    }

    pub fn backup_file(&self) -> PathBuf {
        backup_path(&self.data_file)
    }
}

pub fn backup_path(data_file: &Path) -> PathBuf {
    let mut raw = data_file.as_os_str().to_os_string();
    raw.push(BACKUP_SUFFIX);
    PathBuf::from(raw)
}

fn data_dir(data_file: &Path) -> PathBuf {
    match data_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
