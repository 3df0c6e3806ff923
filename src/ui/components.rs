//! Shared UI components.

use eframe::egui::{self, Color32, RichText, Ui, WidgetText};

/// Status indicator colors.
pub mod colors {
    use super::Color32;

    pub const SUCCESS: Color32 = Color32::from_rgb(100, 200, 100);
    pub const ERROR: Color32 = Color32::from_rgb(255, 100, 100);
    pub const WARNING: Color32 = Color32::from_rgb(255, 200, 100);
    pub const NEUTRAL: Color32 = Color32::from_rgb(150, 150, 150);
}

/// Centered message window with an OK button.
///
/// Returns `true` when OK was clicked.
pub fn message_window(ctx: &egui::Context, title: &str, text: impl Into<WidgetText>) -> bool {
    let mut acknowledged = false;
    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(text);
            ui.add_space(10.0);
            if ui.button("OK").clicked() {
                acknowledged = true;
            }
        });
    acknowledged
}

/// Render a panel header with title.
pub fn panel_header(ui: &mut Ui, title: &str) {
    ui.heading(RichText::new(title).size(24.0));
    ui.add_space(10.0);
    ui.separator();
    ui.add_space(20.0);
}
