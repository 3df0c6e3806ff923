//! Platform settings store.
//!
//! The dialog and the path helpers only need string values keyed by name, so the
//! store is a small trait. `FileSettingsStore` keeps everything in one JSON object
//! file under the per-user config directory; `MemorySettingsStore` is the in-process
//! variant used by tests and embedders that do not want anything on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// Key/value settings storage shared by the dialog and its path helpers.
///
/// Values are durable as soon as `set` returns.
pub trait SettingsStore: Send + Sync {
    /// Read a string value. Missing and non-string entries read as `None`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a string value.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Settings store backed by a single JSON file.
pub struct FileSettingsStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl FileSettingsStore {
    /// Default store location in the per-user config directory.
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "settings-dialog")
            .map(|dirs| dirs.config_dir().join("settings.json"))
            .unwrap_or_else(|| PathBuf::from("settings.json"))
    }

    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                match serde_json::from_str::<Value>(&content)? {
                    Value::Object(map) => map,
                    _ => {
                        return Err(AppError::store(format!(
                            "{} does not contain a JSON object",
                            path.display()
                        )));
                    }
                }
            }
        } else {
            Map::new()
        };

        tracing::debug!("Opened settings store at {:?} ({} entries)", path, values.len());

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// An empty store that will write to `path` on the first `set`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: Mutex::new(Map::new()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, values: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = values.clone();
        next.insert(key.to_string(), Value::String(value.to_string()));
        self.write(&next)?;
        *values = next;
        Ok(())
    }
}

/// In-memory settings store. Counts writes per key.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
    writes: Mutex<HashMap<String, usize>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls seen for `key`.
    pub fn write_count(&self, key: &str) -> usize {
        let writes = self.writes.lock().unwrap_or_else(|e| e.into_inner());
        writes.get(key).copied().unwrap_or(0)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        *self
            .writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.to_string())
            .or_default() += 1;
        Ok(())
    }
}
