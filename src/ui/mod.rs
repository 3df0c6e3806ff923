//! GUI shell and shared widgets.

pub mod app;
pub mod components;

pub use app::SettingsApp;
