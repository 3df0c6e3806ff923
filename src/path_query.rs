//! Native file/directory picking with per-purpose folder memory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::store::SettingsStore;

/// What kind of path the user is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    OpenFile,
    SaveFile,
    PickDirectory,
}

impl PathMode {
    /// Dialog caption for the mode.
    pub fn caption(&self) -> &'static str {
        match self {
            PathMode::OpenFile => "Open File",
            PathMode::SaveFile => "Save File",
            PathMode::PickDirectory => "Open Directory",
        }
    }
}

/// File type filter shown by the native dialogs.
///
/// An empty extension list means "all files".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn new(name: impl Into<String>, extensions: &[&str]) -> Self {
        Self {
            name: name.into(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Filter accepting every file.
    pub fn all() -> Self {
        Self::new("All Files", &[])
    }

    /// Parse a glob style filter such as `*.json` or `Images (*.png *.jpg)`.
    pub fn parse(pattern: &str) -> Self {
        let (name, globs) = match (pattern.find('('), pattern.rfind(')')) {
            (Some(open), Some(close)) if open < close => (pattern[..open].trim(), &pattern[open + 1..close]),
            _ => (pattern.trim(), pattern),
        };

        let extensions: Vec<String> = globs
            .split(|c: char| c.is_whitespace() || c == ';')
            .filter_map(|glob| glob.trim().strip_prefix("*."))
            .filter(|ext| !ext.is_empty() && *ext != "*")
            .map(str::to_string)
            .collect();

        let name = if name.is_empty() { pattern.trim() } else { name };
        Self {
            name: name.to_string(),
            extensions,
        }
    }

    /// True when the filter does not restrict extensions.
    pub fn accepts_all(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Modal native dialogs. Every method returns `None` when the user cancels.
pub trait FilePicker {
    fn open_file(&self, dir: Option<&Path>, filter: &FileFilter) -> Option<PathBuf>;
    fn save_file(&self, dir: Option<&Path>, filter: &FileFilter) -> Option<PathBuf>;
    fn pick_directory(&self, dir: Option<&Path>) -> Option<PathBuf>;
}

/// `rfd` backed pickers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeFilePicker;

impl NativeFilePicker {
    fn dialog(mode: PathMode, dir: Option<&Path>, filter: Option<&FileFilter>) -> rfd::FileDialog {
        let mut dialog = rfd::FileDialog::new().set_title(mode.caption());
        if let Some(dir) = dir {
            dialog = dialog.set_directory(dir);
        }
        if let Some(filter) = filter
            && !filter.accepts_all()
        {
            dialog = dialog.add_filter(&filter.name, filter.extensions.as_slice());
        }
        dialog
    }
}

impl FilePicker for NativeFilePicker {
    fn open_file(&self, dir: Option<&Path>, filter: &FileFilter) -> Option<PathBuf> {
        Self::dialog(PathMode::OpenFile, dir, Some(filter)).pick_file()
    }

    fn save_file(&self, dir: Option<&Path>, filter: &FileFilter) -> Option<PathBuf> {
        Self::dialog(PathMode::SaveFile, dir, Some(filter)).save_file()
    }

    fn pick_directory(&self, dir: Option<&Path>) -> Option<PathBuf> {
        Self::dialog(PathMode::PickDirectory, dir, None).pick_folder()
    }
}

/// Wraps the native pickers and remembers the last folder used for one purpose.
///
/// The folder is written to the settings store under the purpose key when both a
/// store and a non-empty key are configured; otherwise it only lives as long as
/// this helper.
pub struct PathQuery {
    store: Option<Arc<dyn SettingsStore>>,
    purpose: String,
    filter: FileFilter,
    picker: Box<dyn FilePicker>,
    last_folder: Option<PathBuf>,
}

impl PathQuery {
    pub fn new(store: Option<Arc<dyn SettingsStore>>, purpose: impl Into<String>, filter: FileFilter) -> Self {
        Self {
            store,
            purpose: purpose.into(),
            filter,
            picker: Box::new(NativeFilePicker),
            last_folder: None,
        }
    }

    /// Replace the picker implementation.
    pub fn with_picker(mut self, picker: impl FilePicker + 'static) -> Self {
        self.picker = Box::new(picker);
        self
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    fn persistent_store(&self) -> Option<&Arc<dyn SettingsStore>> {
        if self.purpose.is_empty() {
            None
        } else {
            self.store.as_ref()
        }
    }

    /// Folder the next picker opens in.
    pub fn last_folder(&self) -> Option<PathBuf> {
        match self.persistent_store() {
            Some(store) => store.get(&self.purpose).filter(|f| !f.is_empty()).map(PathBuf::from),
            None => self.last_folder.clone(),
        }
    }

    /// Remember `folder` for the next picker invocation.
    pub fn remember_folder(&mut self, folder: &Path) {
        self.last_folder = Some(folder.to_path_buf());

        if let Some(store) = self.persistent_store()
            && let Err(e) = store.set(&self.purpose, &folder.to_string_lossy())
        {
            tracing::warn!("Failed to remember folder for '{}': {}", self.purpose, e);
        }
    }

    /// Ask the user for a path. `None` means the user cancelled.
    pub fn get_path(&mut self, mode: PathMode) -> Option<PathBuf> {
        let last_folder = self.last_folder();
        let dir = last_folder.as_deref();

        let path = match mode {
            PathMode::OpenFile => self.picker.open_file(dir, &self.filter),
            PathMode::SaveFile => self.picker.save_file(dir, &self.filter),
            PathMode::PickDirectory => self.picker.pick_directory(dir),
        }?;

        if path.as_os_str().is_empty() {
            return None;
        }

        let folder = match mode {
            PathMode::PickDirectory => Some(path.as_path()),
            PathMode::OpenFile | PathMode::SaveFile => path.parent(),
        };
        if let Some(folder) = folder
            && !folder.as_os_str().is_empty()
        {
            self.remember_folder(folder);
        }

        Some(path)
    }
}
