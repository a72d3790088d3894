use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use flexdms_lab::analysis::calibration::Feature;
use flexdms_lab::data::model::Channel;

use crate::state::{AppState, Tab};

// ---------------------------------------------------------------------------
// Left side panel – settings
// ---------------------------------------------------------------------------

/// Render the left settings panel. Changes take effect on "Recompute".
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Settings");
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            let cfg = &mut state.config;

            egui::CollapsingHeader::new(RichText::new("Log filter").strong())
                .default_open(true)
                .show(ui, |ui: &mut Ui| {
                    channel_combo(ui, "log_filter_channel", &mut cfg.log.filter.channel);
                    bounds(ui, &mut cfg.log.filter.lower, &mut cfg.log.filter.upper);
                    optional_rows(ui, "Max rows", &mut cfg.log.max_rows);
                });

            egui::CollapsingHeader::new(RichText::new("Calibration").strong())
                .default_open(true)
                .show(ui, |ui: &mut Ui| {
                    let cal = &mut cfg.calibration;
                    egui::ComboBox::from_id_salt("feature")
                        .selected_text(format!("{:?}", cal.feature))
                        .show_ui(ui, |ui: &mut Ui| {
                            ui.selectable_value(&mut cal.feature, Feature::Detrended, "Detrended");
                            ui.selectable_value(&mut cal.feature, Feature::Normalized, "Normalized");
                        });
                    ui.horizontal(|ui: &mut Ui| {
                        ui.label("Degree");
                        ui.add(egui::DragValue::new(&mut cal.degree).range(1..=8));
                        ui.label("Folds");
                        ui.add(egui::DragValue::new(&mut cal.folds).range(2..=20));
                    });
                    ui.horizontal(|ui: &mut Ui| {
                        ui.label("Inference window");
                        ui.add(egui::DragValue::new(&mut cal.infer_window).range(1..=1000));
                    });
                    ui.horizontal(|ui: &mut Ui| {
                        ui.label("Inference threshold");
                        ui.add(
                            egui::DragValue::new(&mut cal.infer_threshold)
                                .speed(0.005)
                                .max_decimals(3),
                        );
                    });
                    ui.label("Test log bounds");
                    bounds(ui, &mut cal.filter.lower, &mut cal.filter.upper);
                });

            egui::CollapsingHeader::new(RichText::new("Threshold").strong())
                .default_open(true)
                .show(ui, |ui: &mut Ui| {
                    ui.horizontal(|ui: &mut Ui| {
                        ui.label("Value");
                        ui.add(egui::DragValue::new(&mut cfg.threshold.value).speed(0.1));
                    });
                    optional_rows(ui, "Max rows", &mut cfg.threshold.max_rows);
                });

            egui::CollapsingHeader::new(RichText::new("Playback").strong())
                .default_open(false)
                .show(ui, |ui: &mut Ui| {
                    let pb = &mut cfg.playback;
                    for channel in Channel::ALL {
                        let mut on = pb.channels.contains(&channel);
                        if ui.checkbox(&mut on, channel.label()).changed() {
                            if on {
                                pb.channels.push(channel);
                            } else {
                                pb.channels.retain(|c| *c != channel);
                            }
                        }
                    }
                    let mut window = pb.smoothing_window.unwrap_or(1);
                    ui.horizontal(|ui: &mut Ui| {
                        ui.label("Moving average");
                        ui.add(egui::DragValue::new(&mut window).range(1..=500));
                    });
                    pb.smoothing_window = (window > 1).then_some(window);
                });

            ui.separator();
            if ui.button("Recompute").clicked() {
                state.recompute();
            }
        });
}

fn channel_combo(ui: &mut Ui, id: &str, channel: &mut Channel) {
    egui::ComboBox::from_id_salt(id)
        .selected_text(channel.label())
        .show_ui(ui, |ui: &mut Ui| {
            for c in Channel::ALL {
                ui.selectable_value(channel, c, c.label());
            }
        });
}

fn bounds(ui: &mut Ui, lower: &mut f64, upper: &mut f64) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Lower");
        ui.add(egui::DragValue::new(lower).speed(0.1));
        ui.label("Upper");
        ui.add(egui::DragValue::new(upper).speed(0.1));
    });
}

fn optional_rows(ui: &mut Ui, label: &str, rows: &mut Option<usize>) {
    ui.horizontal(|ui: &mut Ui| {
        let mut limited = rows.is_some();
        ui.checkbox(&mut limited, label);
        if !limited {
            *rows = None;
            return;
        }
        let n = rows.get_or_insert(1000);
        ui.add(egui::DragValue::new(n).range(1..=usize::MAX));
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open log…").clicked() {
                open_log_dialog(state);
                ui.close_menu();
            }
            if ui.button("Open table…").clicked() {
                open_table_dialog(state);
                ui.close_menu();
            }
            if ui.button("Open model…").clicked() {
                open_model_dialog(state);
                ui.close_menu();
            }
            let can_save = state.calibration.is_some();
            if ui
                .add_enabled(can_save, egui::Button::new("Save model…"))
                .clicked()
            {
                save_model_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        for tab in Tab::ALL {
            if ui.selectable_label(state.tab == tab, tab.title()).clicked() {
                state.tab = tab;
            }
        }

        ui.separator();

        if let Some(run) = &state.resistance {
            ui.label(format!(
                "{} rows loaded, {} in range",
                run.log.len(),
                run.series.len()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_log_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open sensor log")
        .add_filter("Logs", &["txt", "log", "csv"])
        .pick_file();
    if let Some(path) = file {
        state.set_log(path);
    }
}

pub fn open_table_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open calibration table")
        .add_filter("CSV", &["csv"])
        .pick_file();
    if let Some(path) = file {
        state.set_table(path);
    }
}

pub fn open_model_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open calibration model")
        .add_filter("JSON", &["json"])
        .pick_file();
    if let Some(path) = file {
        state.set_model(path);
    }
}

pub fn save_model_dialog(state: &mut AppState) {
    let Some(run) = &state.calibration else {
        return;
    };
    let file = rfd::FileDialog::new()
        .set_title("Save calibration model")
        .add_filter("JSON", &["json"])
        .set_file_name("calibration.json")
        .save_file();
    if let Some(path) = file {
        if let Err(e) = run.calibration.save(&path) {
            log::error!("Failed to save model: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}
