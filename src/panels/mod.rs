//! Configuration panels hosted by the settings dialog.

pub mod database;
pub mod key_value;
pub mod path;

use std::any::Any;
use std::fmt;

use eframe::egui;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

pub use database::{DatabaseConfig, DatabasePanel};
pub use key_value::{KeyValuePanel, KvValue};
pub use path::{PathPanel, PathState};

/// A field that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Errors raised when a panel rejects a state or an edit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PanelError {
    /// The stored value is not a JSON object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(String),

    /// Some fields were rejected; the others were applied.
    #[error("invalid fields: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    InvalidFields(Vec<FieldError>),

    /// The panel has no field with this key.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// A text value exceeds the field's length limit.
    #[error("'{field}' is limited to {max} characters")]
    TooLong { field: String, max: usize },
}

type Listener = Box<dyn FnMut(&Value)>;

/// Callback list for change notifications.
///
/// While muted, `notify` is a no-op. Panels mute themselves around programmatic
/// bulk assignment.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: Vec<Listener>,
    muted: bool,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Value) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn notify(&mut self, state: &Value) {
        if self.muted {
            return;
        }
        for listener in &mut self.listeners {
            listener(state);
        }
    }

    /// Mute notifications, returning the previous mute state.
    pub fn mute(&mut self) -> bool {
        std::mem::replace(&mut self.muted, true)
    }

    /// Restore a mute state returned by `mute`.
    pub fn restore(&mut self, muted: bool) {
        self.muted = muted;
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listeners.len())
            .field("muted", &self.muted)
            .finish()
    }
}

/// The surface the settings dialog needs from a configuration panel.
pub trait ConfigPanel {
    /// Current field values.
    fn get_state(&self) -> Value;

    /// Restore fields from `value`.
    ///
    /// Every valid field is applied. Fields that fail validation keep their previous
    /// value and are reported in `PanelError::InvalidFields`. A non-object value
    /// leaves the panel untouched.
    fn set_state(&mut self, value: &Value) -> Result<(), PanelError>;

    /// Restore factory defaults.
    fn reset_to_default(&mut self);

    /// Register a listener called with the full state after every edit.
    fn subscribe(&mut self, listener: Box<dyn FnMut(&Value)>);

    /// Draw the panel form.
    fn ui(&mut self, ui: &mut egui::Ui);

    /// Per-frame housekeeping, run for every panel whether or not it is visible.
    fn poll(&mut self, _ctx: &egui::Context) {}

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Borrow `value` as an object or fail with `NotAnObject`.
pub(crate) fn as_object(value: &Value) -> Result<&Map<String, Value>, PanelError> {
    value.as_object().ok_or_else(|| {
        let kind = match value {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::String(_) => "a string",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
        };
        PanelError::NotAnObject(kind.to_string())
    })
}

/// Decode `key` from `map` if present. Absent keys yield `None`; bad values are
/// pushed onto `errors`.
pub(crate) fn read_field<T: DeserializeOwned>(
    map: &Map<String, Value>,
    key: &str,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    let raw = map.get(key)?;
    match serde_json::from_value::<T>(raw.clone()) {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(FieldError::new(key, e.to_string()));
            None
        }
    }
}

/// Turn collected field errors into the `set_state` result, logging them.
pub(crate) fn finish_set_state(panel: &str, errors: Vec<FieldError>) -> Result<(), PanelError> {
    if errors.is_empty() {
        return Ok(());
    }
    for error in &errors {
        tracing::warn!("{} panel rejected {}", panel, error);
    }
    Err(PanelError::InvalidFields(errors))
}
