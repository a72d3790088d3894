use eframe::egui;

use crate::state::{AppState, Tab};
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct FlexDmsApp {
    pub state: AppState,
}

impl FlexDmsApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for FlexDmsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.state.tab == Tab::Playback {
            let total = self
                .state
                .playback
                .as_ref()
                .and_then(|run| run.traces.iter().map(|t| t.len()).max())
                .unwrap_or(0);
            let now = ctx.input(|i| i.time);
            self.state.player.tick(now, total);
        }

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: settings ----
        egui::SidePanel::left("settings_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: active tab ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::central_view(ui, &mut self.state);
        });
    }
}
