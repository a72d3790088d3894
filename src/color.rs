use std::collections::BTreeMap;

use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::Channel;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct RGB colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<[u8; 3]> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.45);
            let rgb: Srgb = hsl.into_color();
            [
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            ]
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Channel → colour
// ---------------------------------------------------------------------------

/// Fixed colour per log channel, shared by the viewer and rendered video.
#[derive(Debug, Clone)]
pub struct ChannelColors {
    mapping: BTreeMap<Channel, [u8; 3]>,
}

impl Default for ChannelColors {
    fn default() -> Self {
        let mapping = Channel::ALL
            .iter()
            .copied()
            .zip(generate_palette(Channel::ALL.len()))
            .collect();
        ChannelColors { mapping }
    }
}

impl ChannelColors {
    pub fn color_for(&self, channel: Channel) -> [u8; 3] {
        self.mapping.get(&channel).copied().unwrap_or([128, 128, 128])
    }
}
