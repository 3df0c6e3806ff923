//! Unit tests for the settings dialog.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui;

use serde_json::{Value, json};

use super::{CONFIG_KEY, DialogMode, SettingsDialog};
use crate::panels::database::TestMessage;
use crate::panels::{DatabaseConfig, DatabasePanel, KeyValuePanel, KvValue, PathPanel};
use crate::path_query::testing::ScriptedPicker;
use crate::path_query::{FileFilter, PathMode};
use crate::store::{MemorySettingsStore, SettingsStore};

fn db_defaults() -> Value {
    serde_json::to_value(DatabaseConfig::default()).unwrap()
}

fn dialog_with(store: &Arc<MemorySettingsStore>) -> SettingsDialog {
    SettingsDialog::new(store.clone(), "test")
        .with_panel("path", PathPanel::new(FileFilter::all(), PathMode::PickDirectory))
        .with_panel("db", DatabasePanel::new())
}

fn stored(store: &MemorySettingsStore) -> Value {
    serde_json::from_str(&store.get(CONFIG_KEY).expect("config stored")).unwrap()
}

#[test]
fn test_empty_store_scenario() {
    let store = Arc::new(MemorySettingsStore::new());
    let mut dialog = dialog_with(&store);

    dialog.restore_from_store().unwrap();
    assert_eq!(
        serde_json::from_str::<Value>(&dialog.serialize()).unwrap(),
        json!({"path": {"path": ""}, "db": db_defaults()})
    );

    dialog.panel_mut::<PathPanel>("path").unwrap().set_path("/tmp/x").unwrap();
    assert_eq!(dialog.process_changes(), 1);

    let expected = json!({"path": {"path": "/tmp/x"}, "db": db_defaults()});
    assert_eq!(serde_json::from_str::<Value>(&dialog.serialize()).unwrap(), expected);
    assert_eq!(stored(&store), expected);
}

#[test]
fn test_serialize_follows_registration_order() {
    let store = Arc::new(MemorySettingsStore::new());
    let dialog = SettingsDialog::new(store, "test")
        .with_panel("zeta", KeyValuePanel::new().boolean("on", "On", true))
        .with_panel("alpha", PathPanel::new(FileFilter::all(), PathMode::OpenFile));

    assert_eq!(dialog.panel_names(), vec!["zeta", "alpha"]);
    assert_eq!(dialog.serialize(), r#"{"zeta":{"on":true},"alpha":{"path":""}}"#);
}

#[test]
fn test_round_trip_between_dialogs() {
    let store = Arc::new(MemorySettingsStore::new());
    let mut source = dialog_with(&store);
    source
        .deserialize(
            &json!({
                "path": {"path": "/srv/data"},
                "db": {
                    "url": "https://influx.example.com",
                    "token": "t0k3n",
                    "org": "lab",
                    "bucket": "metrics",
                    "measurement": "temperature",
                    "force_ssl": true,
                    "debug": false,
                    "flush_delay": 0.25,
                    "timeout": 45
                }
            })
            .to_string(),
        )
        .unwrap();

    let text = source.serialize();
    let mut target = dialog_with(&Arc::new(MemorySettingsStore::new()));
    target.deserialize(&text).unwrap();

    assert_eq!(target.serialize(), text);
}

#[test]
fn test_unknown_panel_is_ignored() {
    let store = Arc::new(MemorySettingsStore::new());
    let mut dialog = dialog_with(&store);

    dialog
        .deserialize(r#"{"unknown_panel": {"x": 1}, "path": {"path": "/opt"}}"#)
        .unwrap();

    assert_eq!(dialog.to_document()["path"], json!({"path": "/opt"}));
    assert_eq!(dialog.to_document()["db"], db_defaults());
}

#[test]
fn test_missing_keys_leave_panels_alone() {
    let store = Arc::new(MemorySettingsStore::new());
    let mut dialog = dialog_with(&store);
    dialog.panel_mut::<PathPanel>("path").unwrap().set_path("/keep/me").unwrap();
    let before = dialog.serialize();

    dialog.deserialize("{}").unwrap();

    assert_eq!(dialog.serialize(), before);
}

#[test]
fn test_empty_store_resets_to_defaults() {
    let store = Arc::new(MemorySettingsStore::new());
    let mut dialog = dialog_with(&store);
    dialog.panel_mut::<PathPanel>("path").unwrap().set_path("/keep/me").unwrap();
    dialog
        .panel_mut::<DatabasePanel>("db")
        .unwrap()
        .update(|c| c.bucket = "metrics".to_string());

    dialog.restore_from_store().unwrap();

    assert_eq!(
        dialog.to_document(),
        *json!({"path": {"path": ""}, "db": db_defaults()}).as_object().unwrap()
    );
}

#[test]
fn test_restore_persists_exactly_once() {
    let store = Arc::new(MemorySettingsStore::new());
    store
        .set(
            CONFIG_KEY,
            &json!({
                "path": {"path": "/data"},
                "db": {"url": "http://db:8086", "org": "lab", "bucket": "b", "timeout": 3, "debug": true}
            })
            .to_string(),
        )
        .unwrap();
    let mut dialog = dialog_with(&store);

    dialog.restore_from_store().unwrap();

    assert_eq!(dialog.mode(), DialogMode::Normal);
    assert_eq!(store.write_count(CONFIG_KEY), 2);
    assert_eq!(dialog.process_changes(), 0);
    assert_eq!(store.write_count(CONFIG_KEY), 2);

    let config = dialog.panel_mut::<DatabasePanel>("db").unwrap().config().clone();
    assert_eq!(config.url, "http://db:8086");
    assert_eq!(config.timeout, 3);
    assert!(config.debug);
    assert!(dialog.last_saved().is_some());
}

#[test]
fn test_restore_normalizes_stored_document() {
    let store = Arc::new(MemorySettingsStore::new());
    store
        .set(CONFIG_KEY, r#"{"legacy": true, "path": {"path": "/data"}}"#)
        .unwrap();
    let mut dialog = dialog_with(&store);

    dialog.restore_from_store().unwrap();

    assert_eq!(stored(&store), json!({"path": {"path": "/data"}, "db": db_defaults()}));
}

#[test]
fn test_bad_panel_does_not_block_others() {
    let store = Arc::new(MemorySettingsStore::new());
    let mut dialog = dialog_with(&store);
    let long_path = "p".repeat(200);

    dialog
        .deserialize(&json!({"path": {"path": long_path}, "db": {"bucket": "ok"}}).to_string())
        .unwrap();

    assert_eq!(dialog.to_document()["path"], json!({"path": ""}));
    assert_eq!(dialog.to_document()["db"]["bucket"], json!("ok"));

    dialog.deserialize(r#"{"path": "not an object", "db": {"org": "lab"}}"#).unwrap();
    assert_eq!(dialog.to_document()["db"]["org"], json!("lab"));
}

#[test]
fn test_malformed_store_falls_back_to_defaults() {
    let store = Arc::new(MemorySettingsStore::new());
    store.set(CONFIG_KEY, "{not json").unwrap();
    let mut dialog = dialog_with(&store);

    dialog.restore_from_store().unwrap();

    assert_eq!(stored(&store), json!({"path": {"path": ""}, "db": db_defaults()}));
}

#[test]
fn test_deserialize_rejects_non_object() {
    let store = Arc::new(MemorySettingsStore::new());
    let mut dialog = dialog_with(&store);

    assert!(dialog.deserialize("[1, 2]").is_err());
    assert!(dialog.deserialize("garbage").is_err());
}

#[test]
fn test_each_edit_persists() {
    let store = Arc::new(MemorySettingsStore::new());
    let mut dialog = dialog_with(&store);
    dialog.restore_from_store().unwrap();
    let after_restore = store.write_count(CONFIG_KEY);

    let panel = dialog.panel_mut::<DatabasePanel>("db").unwrap();
    panel.update(|c| c.org = "lab".to_string());
    panel.update(|c| c.bucket = "metrics".to_string());

    assert_eq!(dialog.process_changes(), 2);
    assert_eq!(store.write_count(CONFIG_KEY), after_restore + 2);
    assert_eq!(stored(&store)["db"]["bucket"], json!("metrics"));
}

#[test]
#[should_panic(expected = "already registered")]
fn test_duplicate_panel_name_panics() {
    let store = Arc::new(MemorySettingsStore::new());
    let _ = dialog_with(&store).with_panel("db", DatabasePanel::new());
}

#[test]
fn test_export_then_import() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("exported.json");
    let file_str = file.to_str().unwrap();

    let store = Arc::new(MemorySettingsStore::new());
    let picker = ScriptedPicker::new();
    picker.answer(Some(file_str)).answer(Some(file_str));

    let mut source = dialog_with(&store).with_picker(picker.clone());
    source.panel_mut::<PathPanel>("path").unwrap().set_path("/exported").unwrap();
    assert_eq!(source.export_to_file().unwrap(), Some(file.clone()));
    assert_eq!(store.get("test").as_deref(), dir.path().to_str());

    let target_store = Arc::new(MemorySettingsStore::new());
    let mut target = dialog_with(&target_store).with_picker(picker.clone());
    assert_eq!(target.import_from_file().unwrap(), Some(file.clone()));

    assert_eq!(target.serialize(), source.serialize());
    assert_eq!(stored(&target_store)["path"], json!({"path": "/exported"}));
}

#[test]
fn test_cancelled_picker_is_a_no_op() {
    let store = Arc::new(MemorySettingsStore::new());
    let picker = ScriptedPicker::new();
    picker.answer(None).answer(None);
    let mut dialog = dialog_with(&store).with_picker(picker);

    assert_eq!(dialog.export_to_file().unwrap(), None);
    assert_eq!(dialog.import_from_file().unwrap(), None);
    assert_eq!(store.get("test"), None);
    assert_eq!(store.write_count(CONFIG_KEY), 0);
}

#[test]
fn test_import_of_broken_file_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("broken.json");
    std::fs::write(&file, "{\"path\": ").unwrap();

    let store = Arc::new(MemorySettingsStore::new());
    let mut dialog = dialog_with(&store);

    assert!(dialog.import_from(&file).is_err());
    assert!(dialog.import_from(&dir.path().join("missing.json")).is_err());
    assert_eq!(store.write_count(CONFIG_KEY), 0);
}

#[test]
fn test_open_restores_once() {
    let store = Arc::new(MemorySettingsStore::new());
    store.set(CONFIG_KEY, r#"{"path": {"path": "/first"}}"#).unwrap();
    let mut dialog = dialog_with(&store);

    dialog.open();
    assert!(dialog.is_open());
    assert_eq!(dialog.to_document()["path"], json!({"path": "/first"}));

    dialog.close();
    store.set(CONFIG_KEY, r#"{"path": {"path": "/second"}}"#).unwrap();
    dialog.open();
    assert_eq!(dialog.to_document()["path"], json!({"path": "/first"}));
}

#[test]
fn test_reset_active_panel() {
    let store = Arc::new(MemorySettingsStore::new());
    let mut dialog = SettingsDialog::new(store.clone(), "test").with_panel(
        "general",
        KeyValuePanel::new().integer("value", "Value", 0, 0..=10),
    );
    dialog
        .panel_mut::<KeyValuePanel>("general")
        .unwrap()
        .set_value("value", 4_i64)
        .unwrap();

    dialog.reset_active_panel().unwrap();

    assert_eq!(
        dialog.panel_mut::<KeyValuePanel>("general").unwrap().value("value"),
        Some(&KvValue::Integer(0))
    );
    assert_eq!(stored(&store), json!({"general": {"value": 0}}));
    assert_eq!(dialog.process_changes(), 0);
}

#[test]
fn test_connection_result_arrives_while_other_tab_is_active() {
    let store = Arc::new(MemorySettingsStore::new());
    let mut dialog = dialog_with(&store);
    dialog
        .panel_mut::<DatabasePanel>("db")
        .unwrap()
        .request_test_with(|| Ok(()))
        .unwrap();

    let ctx = egui::Context::default();
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let _ = ctx.run(egui::RawInput::default(), |ctx| dialog.show(ctx));
        if !dialog.panel_mut::<DatabasePanel>("db").unwrap().is_testing() {
            break;
        }
        assert!(Instant::now() < deadline, "connection test did not finish");
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(dialog.panel_names()[0], "path");
    assert!(!dialog.is_open());
    assert_eq!(
        dialog.panel_mut::<DatabasePanel>("db").unwrap().message(),
        Some(&TestMessage::Success("Connection successful.".to_string()))
    );
}
