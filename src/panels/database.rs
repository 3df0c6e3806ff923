//! InfluxDB connection panel.

use std::any::Any;
use std::time::Duration;

use eframe::egui::{self, RichText};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChangeNotifier, ConfigPanel, FieldError, PanelError, as_object, finish_set_state, read_field};
use crate::connection_check::{CheckResult, ConnectionCheck};
use crate::error::{AppError, Result};
use crate::ui::components::{colors, message_window};

/// InfluxDB connection settings.
///
/// `timeout` and `flush_delay` are both in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub measurement: String,
    pub force_ssl: bool,
    pub debug: bool,
    pub flush_delay: f64,
    pub timeout: u32,
}

impl DatabaseConfig {
    /// Upper bound for `timeout`, in seconds.
    pub const MAX_TIMEOUT: u32 = 60_000;
    /// Upper bound for `flush_delay`, in seconds.
    pub const MAX_FLUSH_DELAY: f64 = 60_000.0;

    /// HTTP timeout. Zero disables it.
    pub fn timeout_duration(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(u64::from(self.timeout)))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            token: String::new(),
            org: String::new(),
            bucket: String::new(),
            measurement: String::new(),
            force_ssl: false,
            debug: false,
            flush_delay: 1.0,
            timeout: 10,
        }
    }
}

/// Modal message raised by the connection test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestMessage {
    Success(String),
    Failure(String),
    Busy(String),
}

impl TestMessage {
    fn from_result(result: CheckResult) -> Self {
        match result {
            Ok(()) => TestMessage::Success("Connection successful.".to_string()),
            Err(e) => TestMessage::Failure(e.to_string()),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TestMessage::Success(_) => "Success",
            TestMessage::Failure(_) => "Error",
            TestMessage::Busy(_) => "Busy",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            TestMessage::Success(text) | TestMessage::Failure(text) | TestMessage::Busy(text) => text,
        }
    }
}

/// Connection parameters plus a "Test config" action.
pub struct DatabasePanel {
    config: DatabaseConfig,
    notifier: ChangeNotifier,
    check: ConnectionCheck,
    message: Option<TestMessage>,
}

impl Default for DatabasePanel {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabasePanel {
    pub fn new() -> Self {
        Self {
            config: DatabaseConfig::default(),
            notifier: ChangeNotifier::new(),
            check: ConnectionCheck::new(),
            message: None,
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Apply a user edit. Listeners are notified when a field actually changed.
    pub fn update(&mut self, edit: impl FnOnce(&mut DatabaseConfig)) {
        let before = self.config.clone();
        edit(&mut self.config);
        self.config.timeout = self.config.timeout.min(DatabaseConfig::MAX_TIMEOUT);
        if !self.config.flush_delay.is_finite() {
            self.config.flush_delay = before.flush_delay;
        }
        self.config.flush_delay = self.config.flush_delay.clamp(0.0, DatabaseConfig::MAX_FLUSH_DELAY);

        if self.config != before {
            self.notify();
        }
    }

    pub fn is_testing(&self) -> bool {
        self.check.is_running()
    }

    /// Message waiting to be shown, if any.
    pub fn message(&self) -> Option<&TestMessage> {
        self.message.as_ref()
    }

    pub fn dismiss_message(&mut self) {
        self.message = None;
    }

    /// Start a connection test against the current settings.
    pub fn request_test(&mut self) -> Result<()> {
        let started = self.check.start(self.config.clone());
        self.test_started(started)
    }

    /// Start a test running `probe` on the worker instead of the network check.
    pub fn request_test_with<F>(&mut self, probe: F) -> Result<()>
    where
        F: FnOnce() -> CheckResult + Send + 'static,
    {
        let started = self.check.start_with(probe);
        self.test_started(started)
    }

    /// A request while a test is in flight is rejected and raises the busy notice.
    fn test_started(&mut self, started: Result<()>) -> Result<()> {
        match started {
            Ok(()) => {
                tracing::info!("Testing connection to {}", self.config.url);
                Ok(())
            }
            Err(AppError::AlreadyRunning) => {
                self.message = Some(TestMessage::Busy(AppError::AlreadyRunning.to_string()));
                Err(AppError::AlreadyRunning)
            }
            Err(e) => {
                self.message = Some(TestMessage::Failure(e.to_string()));
                Err(e)
            }
        }
    }

    /// Collect a finished test. Returns `true` when a result arrived.
    pub fn poll_test(&mut self) -> bool {
        match self.check.poll() {
            Some(result) => {
                match &result {
                    Ok(()) => tracing::info!("Connection test to {} succeeded", self.config.url),
                    Err(e) => tracing::warn!("Connection test to {} failed: {}", self.config.url, e),
                }
                self.message = Some(TestMessage::from_result(result));
                true
            }
            None => false,
        }
    }

    fn notify(&mut self) {
        let state = self.get_state();
        self.notifier.notify(&state);
    }

    fn text_row(ui: &mut egui::Ui, label: &str, value: &mut String, password: bool) -> bool {
        ui.label(label);
        let changed = ui
            .add(egui::TextEdit::singleline(value).password(password))
            .changed();
        ui.end_row();
        changed
    }
}

impl ConfigPanel for DatabasePanel {
    fn get_state(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }

    /// Fields are applied one by one; each change is announced like a user edit.
    fn set_state(&mut self, value: &Value) -> std::result::Result<(), PanelError> {
        let map = as_object(value)?;
        let mut errors = Vec::new();

        if let Some(url) = read_field::<String>(map, "url", &mut errors) {
            self.update(|c| c.url = url);
        }
        if let Some(token) = read_field::<String>(map, "token", &mut errors) {
            self.update(|c| c.token = token);
        }
        if let Some(org) = read_field::<String>(map, "org", &mut errors) {
            self.update(|c| c.org = org);
        }
        if let Some(bucket) = read_field::<String>(map, "bucket", &mut errors) {
            self.update(|c| c.bucket = bucket);
        }
        if let Some(measurement) = read_field::<String>(map, "measurement", &mut errors) {
            self.update(|c| c.measurement = measurement);
        }
        if let Some(force_ssl) = read_field::<bool>(map, "force_ssl", &mut errors) {
            self.update(|c| c.force_ssl = force_ssl);
        }
        if let Some(debug) = read_field::<bool>(map, "debug", &mut errors) {
            self.update(|c| c.debug = debug);
        }
        if let Some(flush_delay) = read_field::<f64>(map, "flush_delay", &mut errors) {
            if flush_delay.is_finite() && (0.0..=DatabaseConfig::MAX_FLUSH_DELAY).contains(&flush_delay) {
                self.update(|c| c.flush_delay = flush_delay);
            } else {
                errors.push(FieldError::new(
                    "flush_delay",
                    format!("must be between 0 and {}", DatabaseConfig::MAX_FLUSH_DELAY),
                ));
            }
        }
        if let Some(timeout) = read_field::<u32>(map, "timeout", &mut errors) {
            if timeout <= DatabaseConfig::MAX_TIMEOUT {
                self.update(|c| c.timeout = timeout);
            } else {
                errors.push(FieldError::new(
                    "timeout",
                    format!("must be at most {}", DatabaseConfig::MAX_TIMEOUT),
                ));
            }
        }

        finish_set_state("database", errors)
    }

    fn reset_to_default(&mut self) {
        self.config = DatabaseConfig::default();
    }

    fn subscribe(&mut self, listener: Box<dyn FnMut(&Value)>) {
        self.notifier.subscribe(listener);
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        let mut edited = self.config.clone();
        let mut changed = false;

        egui::Grid::new("influx_settings_grid")
            .num_columns(2)
            .spacing([10.0, 8.0])
            .show(ui, |ui| {
                changed |= Self::text_row(ui, "URL:", &mut edited.url, false);
                changed |= Self::text_row(ui, "Token:", &mut edited.token, true);
                changed |= Self::text_row(ui, "Org:", &mut edited.org, false);
                changed |= Self::text_row(ui, "Bucket:", &mut edited.bucket, false);
                changed |= Self::text_row(ui, "Measurement:", &mut edited.measurement, false);
            });

        ui.add_space(5.0);

        egui::CollapsingHeader::new("Advanced options")
            .default_open(false)
            .show(ui, |ui| {
                egui::Grid::new("influx_advanced_grid")
                    .num_columns(2)
                    .spacing([10.0, 8.0])
                    .show(ui, |ui| {
                        ui.label("Force SSL:");
                        changed |= ui.checkbox(&mut edited.force_ssl, "Force SSL").changed();
                        ui.end_row();

                        ui.label("Flush Delay:");
                        changed |= ui
                            .add(
                                egui::DragValue::new(&mut edited.flush_delay)
                                    .range(0.0..=DatabaseConfig::MAX_FLUSH_DELAY)
                                    .speed(0.1)
                                    .suffix("s"),
                            )
                            .changed();
                        ui.end_row();

                        ui.label("Timeout:");
                        changed |= ui
                            .add(
                                egui::DragValue::new(&mut edited.timeout)
                                    .range(0..=DatabaseConfig::MAX_TIMEOUT)
                                    .suffix("s"),
                            )
                            .changed();
                        ui.end_row();

                        ui.label("Debug:");
                        changed |= ui.checkbox(&mut edited.debug, "Debug").changed();
                        ui.end_row();
                    });
            });

        if changed {
            self.update(|c| *c = edited);
        }

        ui.add_space(10.0);

        ui.horizontal(|ui| {
            let testing = self.is_testing();
            let label = if testing { "Testing..." } else { "Test config" };
            if ui.add_enabled(!testing, egui::Button::new(label)).clicked() {
                let _ = self.request_test();
            }
            if testing {
                ui.spinner();
            }
        });
    }

    fn poll(&mut self, ctx: &egui::Context) {
        self.poll_test();
        if self.is_testing() {
            ctx.request_repaint();
        }

        if let Some(message) = self.message.clone() {
            let color = match message {
                TestMessage::Success(_) => colors::SUCCESS,
                TestMessage::Failure(_) => colors::ERROR,
                TestMessage::Busy(_) => colors::WARNING,
            };
            if message_window(ctx, message.title(), RichText::new(message.text()).color(color)) {
                self.dismiss_message();
            }
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc;
    use std::time::Instant;

    use serde_json::json;

    use super::*;
    use crate::influx::ConnectionError;

    fn wait_for_message(panel: &mut DatabasePanel) -> TestMessage {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !panel.poll_test() {
            assert!(Instant::now() < deadline, "connection test did not finish");
            std::thread::sleep(Duration::from_millis(5));
        }
        panel.message().cloned().unwrap()
    }

    #[test]
    fn test_state_round_trip() {
        let state = json!({
            "url": "https://influx.example.com",
            "token": "secret",
            "org": "lab",
            "bucket": "metrics",
            "measurement": "temperature",
            "force_ssl": true,
            "debug": true,
            "flush_delay": 2.5,
            "timeout": 30
        });

        let mut panel = DatabasePanel::new();
        panel.set_state(&state).unwrap();

        assert_eq!(panel.get_state(), state);
        assert_eq!(panel.config().timeout_duration(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_field_keeps_previous_value() {
        let mut panel = DatabasePanel::new();
        let result = panel.set_state(&json!({"bucket": "metrics", "timeout": "soon", "flush_delay": -1.0}));

        let Err(PanelError::InvalidFields(errors)) = result else {
            panic!("expected field errors, got {result:?}");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["flush_delay", "timeout"]);

        assert_eq!(panel.config().bucket, "metrics");
        assert_eq!(panel.config().timeout, DatabaseConfig::default().timeout);
        assert_eq!(panel.config().flush_delay, DatabaseConfig::default().flush_delay);
    }

    #[test]
    fn test_set_state_announces_each_changed_field() {
        let mut panel = DatabasePanel::new();
        let seen = Rc::new(RefCell::new(0));
        let counter = seen.clone();
        panel.subscribe(Box::new(move |_: &Value| *counter.borrow_mut() += 1));

        panel
            .set_state(&json!({"url": "http://localhost:8086", "org": "lab", "bucket": "b"}))
            .unwrap();

        assert_eq!(*seen.borrow(), 2);
    }

    #[test]
    fn test_update_clamps_ranges() {
        let mut panel = DatabasePanel::new();
        panel.update(|c| {
            c.timeout = 100_000;
            c.flush_delay = f64::NAN;
        });
        assert_eq!(panel.config().timeout, DatabaseConfig::MAX_TIMEOUT);
        assert_eq!(panel.config().flush_delay, 1.0);
    }

    #[test]
    fn test_only_one_test_at_a_time() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let mut panel = DatabasePanel::new();

        panel
            .request_test_with(move || {
                let _ = release_rx.recv();
                Ok(())
            })
            .unwrap();
        assert!(panel.is_testing());

        let second = panel.request_test_with(|| Err(ConnectionError::InvalidToken));
        assert!(matches!(second, Err(AppError::AlreadyRunning)));
        assert_eq!(
            panel.message(),
            Some(&TestMessage::Busy("A connection test is already running.".to_string()))
        );

        panel.dismiss_message();
        release_tx.send(()).unwrap();
        assert_eq!(
            wait_for_message(&mut panel),
            TestMessage::Success("Connection successful.".to_string())
        );
        assert!(!panel.is_testing());
    }

    #[test]
    fn test_failure_message() {
        let mut panel = DatabasePanel::new();
        panel
            .request_test_with(|| Err(ConnectionError::InvalidToken))
            .unwrap();

        let message = wait_for_message(&mut panel);
        assert_eq!(message.title(), "Error");
        assert_eq!(message.text(), "The specified token is invalid.");

        panel.dismiss_message();
        assert_eq!(panel.message(), None);
    }
}
