//! Demo application hosting the settings dialog.

use eframe::egui::{self, RichText};
use egui_phosphor::regular::GEAR;

use crate::dialog::SettingsDialog;

use super::components::{colors, panel_header};

/// Main window: a toolbar with the "Settings" action and a live view of the
/// aggregate config document.
pub struct SettingsApp {
    dialog: SettingsDialog,
}

impl SettingsApp {
    pub fn new(cc: &eframe::CreationContext<'_>, dialog: SettingsDialog) -> Self {
        let mut fonts = egui::FontDefinitions::default();
        egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
        cc.egui_ctx.set_fonts(fonts);

        Self { dialog }
    }

    fn show_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new(GEAR).size(16.0));
                self.dialog.menu_button(ui);
            });
        });
    }

    fn show_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| match self.dialog.last_saved() {
                Some(saved) => {
                    ui.label(RichText::new("Saved").color(colors::SUCCESS));
                    ui.label(saved.format("%Y-%m-%d %H:%M:%S").to_string());
                }
                None => {
                    ui.label(RichText::new("Not loaded").color(colors::NEUTRAL));
                }
            });
        });
    }
}

impl eframe::App for SettingsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.show_toolbar(ctx);
        self.show_status_bar(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            panel_header(ui, "Current configuration");

            if self.dialog.last_saved().is_none() {
                ui.label("Open Settings to load the stored configuration.");
                return;
            }

            let document = serde_json::to_string_pretty(&self.dialog.to_document()).unwrap_or_default();
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.label(RichText::new(document).monospace());
            });
        });

        self.dialog.show(ctx);
    }
}
