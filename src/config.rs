//! Application configuration.
//!
//! This is the TOML file for the demo application itself (where the settings store
//! lives, dialog title and size, logging). Panel state is not kept here; it goes to
//! the settings store.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use directories::ProjectDirs;

use crate::store::FileSettingsStore;

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(AppConfig),
    /// Config file missing (first run).
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub dialog: DialogConfig,
    pub log: LogConfig,
}

/// Settings store location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Settings file; the per-user config directory when unset.
    pub path: Option<PathBuf>,
}

/// Settings dialog appearance and behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    pub title: String,
    /// Settings key remembering the import/export folder.
    pub folder_key: String,
    pub width: f32,
    pub height: f32,
}

/// File logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub file_logging: bool,
    /// Log directory; the per-user data directory when unset.
    pub directory: Option<PathBuf>,
}

impl AppConfig {
    /// Config file path in the per-user config directory.
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "settings-dialog")
            .map(|dirs| dirs.config_dir().join("settings-dialog.toml"))
            .unwrap_or_else(|| PathBuf::from("settings-dialog.toml"))
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(config),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dialog.title.trim().is_empty() {
            return Err(ConfigError::Validation("Dialog title cannot be empty".to_string()));
        }
        if !(self.dialog.width > 0.0 && self.dialog.height > 0.0) {
            return Err(ConfigError::Validation(
                "Dialog width and height must be greater than 0".to_string(),
            ));
        }
        if let Some(path) = &self.store.path
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::Validation("Store path cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Settings store file to open.
    pub fn store_path(&self) -> PathBuf {
        self.store.path.clone().unwrap_or_else(FileSettingsStore::default_path)
    }

    /// Directory for log files.
    pub fn log_directory(&self) -> PathBuf {
        self.log.directory.clone().unwrap_or_else(|| {
            ProjectDirs::from("", "", "settings-dialog")
                .map(|dirs| dirs.data_dir().join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs"))
        })
    }
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            title: "Configuration".to_string(),
            folder_key: "test".to_string(),
            width: 400.0,
            height: 300.0,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_logging: true,
            directory: None,
        }
    }
}
