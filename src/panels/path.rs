//! Single path selector panel.

use std::any::Any;

use eframe::egui;
use egui_phosphor::regular::FOLDER_OPEN;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChangeNotifier, ConfigPanel, FieldError, PanelError, as_object, finish_set_state, read_field};
use crate::path_query::{FileFilter, FilePicker, PathMode, PathQuery};
use crate::ui::components::colors;

/// Stored state of a path panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathState {
    pub path: String,
}

impl PathState {
    /// Longest accepted path, in characters.
    pub const MAX_LEN: usize = 100;

    fn check(path: &str) -> Result<(), PanelError> {
        if path.chars().count() > Self::MAX_LEN {
            return Err(PanelError::TooLong {
                field: "path".to_string(),
                max: Self::MAX_LEN,
            });
        }
        Ok(())
    }
}

/// Text field plus a browse button.
///
/// The picker uses an ephemeral folder memory: the last folder is kept for this
/// panel only and never written to the settings store.
pub struct PathPanel {
    state: PathState,
    mode: PathMode,
    editable: bool,
    query: PathQuery,
    notifier: ChangeNotifier,
    error: Option<String>,
}

impl PathPanel {
    pub fn new(filter: FileFilter, mode: PathMode) -> Self {
        Self {
            state: PathState::default(),
            mode,
            editable: true,
            query: PathQuery::new(None, "", filter),
            notifier: ChangeNotifier::new(),
            error: None,
        }
    }

    /// Only allow changing the path through the picker.
    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    /// Replace the native picker.
    pub fn with_picker(mut self, picker: impl FilePicker + 'static) -> Self {
        let filter = self.query.filter().clone();
        self.query = PathQuery::new(None, "", filter).with_picker(picker);
        self
    }

    pub fn path(&self) -> &str {
        &self.state.path
    }

    pub fn mode(&self) -> PathMode {
        self.mode
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// User edit of the path. Notifies listeners when the text changes.
    pub fn set_path(&mut self, path: impl Into<String>) -> Result<(), PanelError> {
        let path = path.into();
        PathState::check(&path)?;
        if path == self.state.path {
            return Ok(());
        }
        self.state.path = path;
        self.notify();
        Ok(())
    }

    /// Open the picker and take its answer. Returns `false` on cancel.
    pub fn browse(&mut self) -> Result<bool, PanelError> {
        let Some(selected) = self.query.get_path(self.mode) else {
            return Ok(false);
        };
        self.set_path(selected.to_string_lossy())?;
        Ok(true)
    }

    fn notify(&mut self) {
        let state = self.get_state();
        self.notifier.notify(&state);
    }
}

impl ConfigPanel for PathPanel {
    fn get_state(&self) -> Value {
        serde_json::json!({ "path": self.state.path })
    }

    fn set_state(&mut self, value: &Value) -> Result<(), PanelError> {
        let map = as_object(value)?;
        let mut errors = Vec::new();

        if let Some(path) = read_field::<String>(map, "path", &mut errors) {
            let muted = self.notifier.mute();
            if let Err(e) = self.set_path(path) {
                errors.push(FieldError::new("path", e.to_string()));
            }
            self.notifier.restore(muted);
        }

        finish_set_state("path", errors)
    }

    fn reset_to_default(&mut self) {
        self.state = PathState::default();
        self.error = None;
    }

    fn subscribe(&mut self, listener: Box<dyn FnMut(&Value)>) {
        self.notifier.subscribe(listener);
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let edit = egui::TextEdit::singleline(&mut self.state.path)
                .char_limit(PathState::MAX_LEN)
                .interactive(self.editable)
                .desired_width(ui.available_width() - 40.0);
            if ui.add(edit).changed() {
                self.error = None;
                self.notify();
            }

            if ui.button(FOLDER_OPEN).on_hover_text(self.mode.caption()).clicked() {
                self.error = self.browse().err().map(|e| e.to_string());
            }
        });

        if let Some(error) = &self.error {
            ui.colored_label(colors::ERROR, error);
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
