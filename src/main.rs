//! Settings dialog demo - tabbed configuration panels with persisted state.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use eframe::egui;
use settings_dialog as app;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use app::config::{AppConfig, ConfigLoadResult};
use app::panels::{DatabasePanel, KeyValuePanel, PathPanel};
use app::path_query::{FileFilter, PathMode};
use app::store::{FileSettingsStore, SettingsStore};
use app::ui::SettingsApp;
use app::SettingsDialog;

/// Tabbed settings dialog demo.
#[derive(Parser)]
#[command(name = "settings-dialog")]
struct Cli {
    /// Keep config, settings and logs in the current directory (dev mode)
    #[arg(long)]
    dev: bool,

    /// Application config file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(|| {
        if cli.dev {
            PathBuf::from("settings-dialog.toml")
        } else {
            AppConfig::default_path()
        }
    });

    let (mut config, load_note) = match AppConfig::try_load(&config_path) {
        ConfigLoadResult::Loaded(config) => (config, None),
        ConfigLoadResult::Missing => {
            let config = AppConfig::default();
            let note = match config.save(&config_path) {
                Ok(()) => format!("Config missing, wrote defaults to {}", config_path.display()),
                Err(e) => format!("Config missing, using defaults (could not write it: {e})"),
            };
            (config, Some(note))
        }
        ConfigLoadResult::Invalid(e) => (AppConfig::default(), Some(format!("Config invalid, using defaults: {e}"))),
    };
    if cli.dev {
        config.store.path.get_or_insert_with(|| PathBuf::from("settings.json"));
        config.log.directory.get_or_insert_with(|| PathBuf::from("logs"));
    }

    // Initialize logging
    let _log_guard = init_logging(&config)?;

    tracing::info!("Settings dialog starting...");
    tracing::info!("Config path: {:?}", config_path);
    if let Some(note) = load_note {
        tracing::warn!("{}", note);
    }

    let store_path = config.store_path();
    let store = match FileSettingsStore::open(&store_path) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open settings at {:?}, starting empty: {}", store_path, e);
            FileSettingsStore::empty(&store_path)
        }
    };
    tracing::info!("Settings store: {:?}", store.path());
    let store: Arc<dyn SettingsStore> = Arc::new(store);

    let dialog = build_dialog(store, &config);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Settings Dialog")
            .with_inner_size([800.0, 600.0])
            .with_min_inner_size([500.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Settings Dialog",
        options,
        Box::new(|cc| Ok(Box::new(SettingsApp::new(cc, dialog)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run the UI: {e}"))
}

/// Register the demo panels.
fn build_dialog(store: Arc<dyn SettingsStore>, config: &AppConfig) -> SettingsDialog {
    let general = KeyValuePanel::new()
        .integer("value", "Value", 0, 0..=99)
        .word("default", "Default", "Hello");

    SettingsDialog::new(store, &config.dialog.folder_key)
        .with_title(config.dialog.title.clone())
        .with_default_size(config.dialog.width, config.dialog.height)
        .with_panel("general", general)
        .with_panel(
            "path",
            PathPanel::new(FileFilter::parse("*.lock"), PathMode::PickDirectory),
        )
        .with_panel("db", DatabasePanel::new())
}

/// Log to stderr, and to a daily file when enabled.
fn init_logging(config: &AppConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = if config.log.file_logging {
        let directory = config.log_directory();
        std::fs::create_dir_all(&directory)
            .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

        let appender = tracing_appender::rolling::daily(directory, "settings-dialog.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}
