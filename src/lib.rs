pub mod config;
pub mod connection_check;
pub mod dialog;
pub mod error;
pub mod influx;
pub mod panels;
pub mod path_query;
pub mod store;
pub mod ui;

pub use dialog::SettingsDialog;
pub use error::{AppError, Result};
