//! Generic key/value panel built from a list of typed fields.

use std::any::Any;
use std::ops::RangeInclusive;

use eframe::egui;
use serde_json::{Map, Value};

use super::{ChangeNotifier, ConfigPanel, FieldError, PanelError, as_object, finish_set_state};

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum KvValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl KvValue {
    pub fn to_json(&self) -> Value {
        match self {
            KvValue::Text(s) => Value::String(s.clone()),
            KvValue::Integer(i) => Value::from(*i),
            KvValue::Float(f) => Value::from(*f),
            KvValue::Bool(b) => Value::Bool(*b),
        }
    }
}

impl From<&str> for KvValue {
    fn from(value: &str) -> Self {
        KvValue::Text(value.to_string())
    }
}

impl From<i64> for KvValue {
    fn from(value: i64) -> Self {
        KvValue::Integer(value)
    }
}

impl From<f64> for KvValue {
    fn from(value: f64) -> Self {
        KvValue::Float(value)
    }
}

impl From<bool> for KvValue {
    fn from(value: bool) -> Self {
        KvValue::Bool(value)
    }
}

#[derive(Debug, Clone)]
enum FieldKind {
    /// `single_word` rejects empty text and any whitespace.
    Text { single_word: bool },
    Integer(RangeInclusive<i64>),
    Float(RangeInclusive<f64>),
    Bool,
}

impl FieldKind {
    fn coerce(&self, raw: &Value) -> Result<KvValue, String> {
        match self {
            FieldKind::Text { single_word } => {
                let text = raw.as_str().ok_or("expected a string")?;
                if *single_word && (text.is_empty() || text.chars().any(char::is_whitespace)) {
                    return Err("must be a single word".to_string());
                }
                Ok(KvValue::Text(text.to_string()))
            }
            FieldKind::Integer(range) => {
                let value = raw.as_i64().ok_or("expected an integer")?;
                if !range.contains(&value) {
                    return Err(format!("must be between {} and {}", range.start(), range.end()));
                }
                Ok(KvValue::Integer(value))
            }
            FieldKind::Float(range) => {
                let value = raw.as_f64().ok_or("expected a number")?;
                if !range.contains(&value) {
                    return Err(format!("must be between {} and {}", range.start(), range.end()));
                }
                Ok(KvValue::Float(value))
            }
            FieldKind::Bool => raw.as_bool().map(KvValue::Bool).ok_or_else(|| "expected a boolean".to_string()),
        }
    }

    /// Whether partially typed text may stay in the editor. A word field may be
    /// empty while the user retypes it.
    fn accepts_input(&self, text: &str) -> bool {
        match self {
            FieldKind::Text { single_word: true } => !text.chars().any(char::is_whitespace),
            _ => true,
        }
    }
}

#[derive(Debug, Clone)]
struct Field {
    key: String,
    label: String,
    kind: FieldKind,
    default: KvValue,
    value: KvValue,
}

/// Panel whose state is a flat JSON object, one entry per declared field.
#[derive(Default)]
pub struct KeyValuePanel {
    fields: Vec<Field>,
    notifier: ChangeNotifier,
}

impl KeyValuePanel {
    pub fn new() -> Self {
        Self::default()
    }

    fn field(mut self, key: &str, label: &str, kind: FieldKind, default: KvValue) -> Self {
        assert!(
            self.fields.iter().all(|f| f.key != key),
            "field '{key}' declared twice"
        );
        self.fields.push(Field {
            key: key.to_string(),
            label: label.to_string(),
            kind,
            value: default.clone(),
            default,
        });
        self
    }

    pub fn text(self, key: &str, label: &str, default: &str) -> Self {
        self.field(key, label, FieldKind::Text { single_word: false }, default.into())
    }

    /// Text field that only accepts a non-empty value without whitespace.
    pub fn word(self, key: &str, label: &str, default: &str) -> Self {
        self.field(key, label, FieldKind::Text { single_word: true }, default.into())
    }

    pub fn integer(self, key: &str, label: &str, default: i64, range: RangeInclusive<i64>) -> Self {
        self.field(key, label, FieldKind::Integer(range), default.into())
    }

    pub fn float(self, key: &str, label: &str, default: f64, range: RangeInclusive<f64>) -> Self {
        self.field(key, label, FieldKind::Float(range), default.into())
    }

    pub fn boolean(self, key: &str, label: &str, default: bool) -> Self {
        self.field(key, label, FieldKind::Bool, default.into())
    }

    pub fn value(&self, key: &str) -> Option<&KvValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }

    /// User edit of one field.
    pub fn set_value(&mut self, key: &str, value: impl Into<KvValue>) -> Result<(), PanelError> {
        let value: KvValue = value.into();
        self.apply(key, &value.to_json())
    }

    /// Validate `raw` for `key` and store it, notifying when the value changed.
    fn apply(&mut self, key: &str, raw: &Value) -> Result<(), PanelError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.key == key)
            .ok_or_else(|| PanelError::UnknownField(key.to_string()))?;

        let value = field
            .kind
            .coerce(raw)
            .map_err(|reason| PanelError::InvalidFields(vec![FieldError::new(key, reason)]))?;

        if field.value != value {
            field.value = value;
            self.notify();
        }
        Ok(())
    }

    fn notify(&mut self) {
        let state = self.get_state();
        self.notifier.notify(&state);
    }

    fn field_ui(ui: &mut egui::Ui, field: &mut Field) -> bool {
        match (&field.kind, &mut field.value) {
            (FieldKind::Text { .. }, KvValue::Text(current)) => {
                let mut text = current.clone();
                if ui.text_edit_singleline(&mut text).changed() && field.kind.accepts_input(&text) {
                    *current = text;
                    return true;
                }
                false
            }
            (FieldKind::Integer(range), KvValue::Integer(current)) => {
                ui.add(egui::DragValue::new(current).range(range.clone())).changed()
            }
            (FieldKind::Float(range), KvValue::Float(current)) => ui
                .add(egui::DragValue::new(current).range(range.clone()).speed(0.1))
                .changed(),
            (FieldKind::Bool, KvValue::Bool(current)) => ui.checkbox(current, "").changed(),
            _ => false,
        }
    }
}

impl ConfigPanel for KeyValuePanel {
    fn get_state(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.key.clone(), f.value.to_json()))
            .collect();
        Value::Object(map)
    }

    fn set_state(&mut self, value: &Value) -> Result<(), PanelError> {
        let map = as_object(value)?;
        let keys: Vec<String> = self.fields.iter().map(|f| f.key.clone()).collect();
        let mut errors = Vec::new();

        let muted = self.notifier.mute();
        for key in keys {
            let Some(raw) = map.get(&key) else {
                continue;
            };
            match self.apply(&key, raw) {
                Ok(()) => {}
                Err(PanelError::InvalidFields(rejected)) => errors.extend(rejected),
                Err(e) => errors.push(FieldError::new(&key, e.to_string())),
            }
        }
        self.notifier.restore(muted);

        finish_set_state("key/value", errors)
    }

    fn reset_to_default(&mut self) {
        for field in &mut self.fields {
            field.value = field.default.clone();
        }
    }

    fn subscribe(&mut self, listener: Box<dyn FnMut(&Value)>) {
        self.notifier.subscribe(listener);
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        let mut changed = false;

        egui::Grid::new(ui.id().with("key_value_grid"))
            .num_columns(2)
            .spacing([10.0, 8.0])
            .show(ui, |ui| {
                for field in &mut self.fields {
                    ui.label(format!("{}:", field.label));
                    changed |= Self::field_ui(ui, field);
                    ui.end_row();
                }
            });

        if changed {
            self.notify();
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
