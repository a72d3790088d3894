pub mod panels;
pub mod plot;

use eframe::egui::Color32;

pub fn color32(rgb: [u8; 3]) -> Color32 {
    Color32::from_rgb(rgb[0], rgb[1], rgb[2])
}
