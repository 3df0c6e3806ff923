//! Tabbed settings dialog.
//!
//! The dialog owns the registered panels, derives the aggregate JSON document from
//! their live state and writes it to the settings store after every edit. Edits reach
//! the dialog through a channel: each panel listener sends its name and state, and the
//! dialog drains the channel once per frame (or on demand via `process_changes`).

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;

use chrono::{DateTime, Local};
use eframe::egui::{self, RichText};
use egui_phosphor::regular::{ARROW_COUNTER_CLOCKWISE, DOWNLOAD_SIMPLE, UPLOAD_SIMPLE};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::panels::ConfigPanel;
use crate::path_query::{FileFilter, FilePicker, PathMode, PathQuery};
use crate::store::SettingsStore;
use crate::ui::components::{colors, message_window};

/// Store key holding the aggregate document.
pub const CONFIG_KEY: &str = "config";

/// Whether edits are currently written through to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogMode {
    #[default]
    Normal,
    /// Panel state is being mass-assigned; change notifications are discarded.
    BulkRestoring,
}

/// Notification sent by a panel listener.
#[derive(Debug, Clone)]
pub struct PanelChanged {
    pub panel: String,
    pub state: Value,
}

struct Entry {
    name: String,
    panel: Box<dyn ConfigPanel>,
}

/// Host for named configuration panels.
pub struct SettingsDialog {
    title: String,
    default_size: [f32; 2],
    store: Arc<dyn SettingsStore>,
    path_query: PathQuery,
    entries: Vec<Entry>,
    tx: mpsc::Sender<PanelChanged>,
    rx: mpsc::Receiver<PanelChanged>,
    mode: DialogMode,
    open: bool,
    restored: bool,
    active_tab: usize,
    last_saved: Option<DateTime<Local>>,
    error_message: Option<String>,
}

impl SettingsDialog {
    /// Create a dialog persisting to `store`. `folder_key` is the purpose key used
    /// to remember the import/export folder.
    pub fn new(store: Arc<dyn SettingsStore>, folder_key: &str) -> Self {
        let (tx, rx) = mpsc::channel();
        let path_query = PathQuery::new(Some(store.clone()), folder_key, FileFilter::parse("*.json"));
        Self {
            title: "Configuration".to_string(),
            default_size: [400.0, 300.0],
            store,
            path_query,
            entries: Vec::new(),
            tx,
            rx,
            mode: DialogMode::Normal,
            open: false,
            restored: false,
            active_tab: 0,
            last_saved: None,
            error_message: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_default_size(mut self, width: f32, height: f32) -> Self {
        self.default_size = [width, height];
        self
    }

    /// Replace the native picker used for import/export.
    pub fn with_picker(mut self, picker: impl FilePicker + 'static) -> Self {
        let purpose = self.path_query.purpose().to_string();
        let filter = self.path_query.filter().clone();
        self.path_query = PathQuery::new(Some(self.store.clone()), purpose, filter).with_picker(picker);
        self
    }

    /// Add a panel as a new tab.
    ///
    /// # Panics
    /// If a panel with the same name is already registered.
    pub fn register_panel(&mut self, name: &str, mut panel: Box<dyn ConfigPanel>) {
        assert!(
            self.entries.iter().all(|e| e.name != name),
            "panel '{name}' is already registered"
        );

        let tx = self.tx.clone();
        let panel_name = name.to_string();
        panel.subscribe(Box::new(move |state: &Value| {
            let _ = tx.send(PanelChanged {
                panel: panel_name.clone(),
                state: state.clone(),
            });
        }));

        self.entries.push(Entry {
            name: name.to_string(),
            panel,
        });
    }

    /// Builder form of `register_panel`.
    pub fn with_panel(mut self, name: &str, panel: impl ConfigPanel + 'static) -> Self {
        self.register_panel(name, Box::new(panel));
        self
    }

    /// Panel names in tab order.
    pub fn panel_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Typed access to a registered panel.
    pub fn panel_mut<P: ConfigPanel + 'static>(&mut self, name: &str) -> Option<&mut P> {
        self.entries
            .iter_mut()
            .find(|e| e.name == name)
            .and_then(|e| e.panel.as_any_mut().downcast_mut::<P>())
    }

    pub fn mode(&self) -> DialogMode {
        self.mode
    }

    pub fn last_saved(&self) -> Option<DateTime<Local>> {
        self.last_saved
    }

    /// Aggregate document built from the live panel state.
    pub fn to_document(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.panel.get_state()))
            .collect()
    }

    /// Aggregate document as compact JSON text.
    pub fn serialize(&self) -> String {
        Value::Object(self.to_document()).to_string()
    }

    /// Load panel state from JSON text.
    ///
    /// Only a malformed document is an error. Unknown keys are ignored, panels
    /// without a key are left alone and a panel rejecting its state does not stop
    /// the others from loading.
    pub fn deserialize(&mut self, text: &str) -> Result<()> {
        let document = match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => map,
            other => {
                return Err(AppError::config(format!("expected a JSON object, got {other}")));
            }
        };

        for entry in &mut self.entries {
            let Some(state) = document.get(&entry.name) else {
                continue;
            };
            if let Err(e) = entry.panel.set_state(state) {
                tracing::error!("Failed to load '{}' settings: {}", entry.name, e);
            }
        }

        tracing::info!("Loaded config from settings");
        Ok(())
    }

    /// Reset every panel to its defaults.
    pub fn load_default(&mut self) {
        for entry in &mut self.entries {
            entry.panel.reset_to_default();
        }
        tracing::info!("Loaded default config");
    }

    /// Write the aggregate document to the store.
    pub fn persist_to_store(&mut self) -> Result<()> {
        self.store.set(CONFIG_KEY, &self.serialize())?;
        self.last_saved = Some(Local::now());
        tracing::info!("Saved config to settings");
        Ok(())
    }

    /// Load the stored document into the panels, then store it back once in
    /// normalized form. Falls back to defaults when nothing usable is stored.
    pub fn restore_from_store(&mut self) -> Result<()> {
        self.mode = DialogMode::BulkRestoring;

        match self.store.get(CONFIG_KEY).filter(|text| !text.is_empty()) {
            None => {
                tracing::warn!("No config in settings, loading defaults");
                self.load_default();
            }
            Some(text) => {
                if let Err(e) = self.deserialize(&text) {
                    tracing::error!("Stored config is unreadable, loading defaults: {}", e);
                    self.load_default();
                }
            }
        }

        self.discard_changes();
        self.mode = DialogMode::Normal;
        self.restored = true;
        self.persist_to_store()
    }

    /// Handle queued change notifications. Every notification persists the whole
    /// document. Returns the number of writes.
    pub fn process_changes(&mut self) -> usize {
        let mut writes = 0;
        while let Ok(change) = self.rx.try_recv() {
            tracing::debug!("'{}' changed: {}", change.panel, change.state);
            match self.persist_to_store() {
                Ok(()) => writes += 1,
                Err(e) => {
                    tracing::error!("Failed to save config to settings: {}", e);
                    self.error_message = Some(format!("Failed to save config to settings: {e}"));
                }
            }
        }
        writes
    }

    fn discard_changes(&mut self) {
        let discarded = self.rx.try_iter().count();
        if discarded > 0 {
            tracing::debug!("Discarded {} change notifications", discarded);
        }
    }

    /// Write the aggregate document to `path`.
    pub fn export_to(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&Value::Object(self.to_document()))?;
        std::fs::write(path, text)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Load the document in `path` into the panels and persist the result.
    pub fn import_from(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.deserialize(&text)?;
        self.discard_changes();
        self.persist_to_store()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(())
    }

    /// Ask for a target file and export. `Ok(None)` when the user cancels.
    pub fn export_to_file(&mut self) -> Result<Option<PathBuf>> {
        let Some(path) = self.path_query.get_path(PathMode::SaveFile) else {
            return Ok(None);
        };
        self.export_to(&path)?;
        Ok(Some(path))
    }

    /// Ask for a source file and import. `Ok(None)` when the user cancels.
    pub fn import_from_file(&mut self) -> Result<Option<PathBuf>> {
        let Some(path) = self.path_query.get_path(PathMode::OpenFile) else {
            return Ok(None);
        };
        self.import_from(&path)?;
        Ok(Some(path))
    }

    /// Reset the panel in the active tab and persist.
    pub fn reset_active_panel(&mut self) -> Result<()> {
        let Some(entry) = self.entries.get_mut(self.active_tab) else {
            return Ok(());
        };
        entry.panel.reset_to_default();
        tracing::info!("Reset '{}' to defaults", entry.name);
        self.discard_changes();
        self.persist_to_store()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Show the dialog. The stored config is loaded on the first open.
    pub fn open(&mut self) {
        if !self.restored
            && let Err(e) = self.restore_from_store()
        {
            tracing::error!("Failed to restore config: {}", e);
            self.error_message = Some(format!("Failed to load config from settings: {e}"));
        }
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// The "Settings" action for a menu or toolbar.
    pub fn menu_button(&mut self, ui: &mut egui::Ui) {
        if ui.button("Settings").clicked() {
            self.open();
        }
    }

    /// Poll every panel, then draw the dialog window when open.
    pub fn show(&mut self, ctx: &egui::Context) {
        for entry in &mut self.entries {
            entry.panel.poll(ctx);
        }

        if !self.open {
            return;
        }

        let mut open = self.open;
        egui::Window::new(self.title.clone())
            .open(&mut open)
            .default_size(self.default_size)
            .resizable(true)
            .collapsible(false)
            .show(ctx, |ui| {
                self.toolbar(ui);
                ui.separator();
                self.tabs(ui);
                ui.separator();

                egui::ScrollArea::vertical().show(ui, |ui| {
                    if let Some(entry) = self.entries.get_mut(self.active_tab) {
                        entry.panel.ui(ui);
                    }
                });

                self.process_changes();
                self.status_line(ui);
            });
        self.open = open;

        if let Some(error) = self.error_message.clone()
            && message_window(ctx, "Error", RichText::new(error).color(colors::ERROR))
        {
            self.error_message = None;
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button(format!("{DOWNLOAD_SIMPLE} Import")).clicked()
                && let Err(e) = self.import_from_file()
            {
                tracing::error!("Failed to load config from file: {}", e);
                self.error_message = Some(format!("Failed to load config from file: {e}"));
            }

            if ui.button(format!("{UPLOAD_SIMPLE} Export")).clicked()
                && let Err(e) = self.export_to_file()
            {
                tracing::error!("Failed to save config to file: {}", e);
                self.error_message = Some(format!("Failed to save config to file: {e}"));
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui
                    .button(format!("{ARROW_COUNTER_CLOCKWISE} Reset to Defaults"))
                    .clicked()
                    && let Err(e) = self.reset_active_panel()
                {
                    self.error_message = Some(format!("Failed to save config to settings: {e}"));
                }
            });
        });
    }

    fn tabs(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            for (index, entry) in self.entries.iter().enumerate() {
                ui.selectable_value(&mut self.active_tab, index, entry.name.as_str());
            }
        });
    }

    fn status_line(&self, ui: &mut egui::Ui) {
        if let Some(saved) = self.last_saved {
            ui.label(
                RichText::new(format!("Saved at {}", saved.format("%H:%M:%S")))
                    .color(colors::NEUTRAL)
                    .small(),
            );
        }
    }
}
