use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::calibration::{CalibrationParams, Feature};
use crate::analysis::diagnostics::DEFAULT_BINS;
use crate::analysis::sweep::SweepParams;
use crate::analysis::threshold::DEFAULT_THRESHOLD;
use crate::data::model::Channel;

pub const DEFAULT_CONFIG_PATH: &str = "flexdms-lab.toml";

/// Row limits as written in TOML, where `0` stands for no limit.
mod row_limit {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.unwrap_or(0) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
        let rows = usize::deserialize(deserializer)?;
        Ok((rows > 0).then_some(rows))
    }
}

/// Bounds applied to one log channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "FilterConfig::default_channel")]
    pub channel: Channel,
    #[serde(default = "FilterConfig::default_lower")]
    pub lower: f64,
    #[serde(default = "FilterConfig::default_upper")]
    pub upper: f64,
}

impl FilterConfig {
    fn default_channel() -> Channel {
        Channel::Resistance
    }
    fn default_lower() -> f64 {
        38.0
    }
    fn default_upper() -> f64 {
        58.0
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            channel: Self::default_channel(),
            lower: Self::default_lower(),
            upper: Self::default_upper(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LogConfig {
    /// Keep only the first N accepted rows. `0` in TOML means unlimited.
    #[serde(default, with = "row_limit")]
    pub max_rows: Option<usize>,
    #[serde(default)]
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "CalibrationConfig::default_resistance_column")]
    pub resistance_column: String,
    #[serde(default = "CalibrationConfig::default_angle_column")]
    pub angle_column: String,
    #[serde(default = "CalibrationConfig::default_degree")]
    pub degree: usize,
    #[serde(default)]
    pub feature: Feature,
    #[serde(default = "CalibrationConfig::default_folds")]
    pub folds: usize,
    #[serde(default = "CalibrationConfig::default_seed")]
    pub seed: u64,
    /// Direction threshold on the raw training differences.
    #[serde(default)]
    pub train_threshold: f64,
    #[serde(default = "CalibrationConfig::default_infer_threshold")]
    pub infer_threshold: f64,
    #[serde(default = "CalibrationConfig::default_infer_window")]
    pub infer_window: usize,
    #[serde(default = "CalibrationConfig::default_max_rows", with = "row_limit")]
    pub max_rows: Option<usize>,
    /// Test-log filter used before prediction.
    #[serde(default = "CalibrationConfig::default_filter")]
    pub filter: FilterConfig,
}

impl CalibrationConfig {
    fn default_resistance_column() -> String {
        "R".to_string()
    }
    fn default_angle_column() -> String {
        "Angle(rad)".to_string()
    }
    fn default_degree() -> usize {
        3
    }
    fn default_folds() -> usize {
        5
    }
    fn default_seed() -> u64 {
        42
    }
    fn default_infer_threshold() -> f64 {
        0.05
    }
    fn default_infer_window() -> usize {
        50
    }
    fn default_filter() -> FilterConfig {
        FilterConfig {
            lower: 42.0,
            upper: 52.0,
            ..FilterConfig::default()
        }
    }
    fn default_max_rows() -> Option<usize> {
        Some(4900)
    }

    pub fn params(&self) -> CalibrationParams {
        CalibrationParams {
            degree: self.degree,
            feature: self.feature,
            training: SweepParams {
                threshold: self.train_threshold,
                smoothing_window: None,
            },
            folds: self.folds,
            seed: self.seed,
        }
    }

    pub fn inference(&self) -> SweepParams {
        SweepParams {
            threshold: self.infer_threshold,
            smoothing_window: Some(self.infer_window),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            resistance_column: Self::default_resistance_column(),
            angle_column: Self::default_angle_column(),
            degree: Self::default_degree(),
            feature: Feature::default(),
            folds: Self::default_folds(),
            seed: Self::default_seed(),
            train_threshold: 0.0,
            infer_threshold: Self::default_infer_threshold(),
            infer_window: Self::default_infer_window(),
            max_rows: Self::default_max_rows(),
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "DiagnosticsConfig::default_columns")]
    pub columns: Vec<String>,
    #[serde(default = "DiagnosticsConfig::default_split_column")]
    pub split_column: String,
    #[serde(default = "DiagnosticsConfig::default_alpha")]
    pub alpha: f64,
    #[serde(default = "DiagnosticsConfig::default_bins")]
    pub bins: usize,
}

impl DiagnosticsConfig {
    fn default_columns() -> Vec<String> {
        vec!["h".to_string(), "Angle(rad)".to_string(), "R".to_string()]
    }
    fn default_split_column() -> String {
        "R".to_string()
    }
    fn default_alpha() -> f64 {
        0.05
    }
    fn default_bins() -> usize {
        DEFAULT_BINS
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            columns: Self::default_columns(),
            split_column: Self::default_split_column(),
            alpha: Self::default_alpha(),
            bins: Self::default_bins(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "ThresholdConfig::default_value")]
    pub value: f64,
    #[serde(default = "ThresholdConfig::default_max_rows", with = "row_limit")]
    pub max_rows: Option<usize>,
}

impl ThresholdConfig {
    fn default_value() -> f64 {
        DEFAULT_THRESHOLD
    }
    fn default_max_rows() -> Option<usize> {
        Some(1341)
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            value: Self::default_value(),
            max_rows: Self::default_max_rows(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "PlaybackConfig::default_channels")]
    pub channels: Vec<Channel>,
    /// Centred moving average applied before playback; `None` or 1 disables it.
    #[serde(default)]
    pub smoothing_window: Option<usize>,
    #[serde(default = "PlaybackConfig::default_fps")]
    pub fps: u32,
    /// Samples added per frame.
    #[serde(default = "PlaybackConfig::default_stride")]
    pub stride: usize,
    #[serde(default = "PlaybackConfig::default_codec")]
    pub codec: String,
    #[serde(default = "PlaybackConfig::default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "PlaybackConfig::default_width")]
    pub width: u32,
    #[serde(default = "PlaybackConfig::default_height")]
    pub height: u32,
    /// Output video; relative paths resolve next to the executable.
    #[serde(default = "PlaybackConfig::default_output")]
    pub output: PathBuf,
    /// TTF/OTF font for captions and axis labels; frames have no text without it.
    #[serde(default)]
    pub font: Option<PathBuf>,
}

impl PlaybackConfig {
    fn default_channels() -> Vec<Channel> {
        vec![Channel::Resistance]
    }
    fn default_fps() -> u32 {
        30
    }
    fn default_stride() -> usize {
        1
    }
    fn default_codec() -> String {
        "libx264".to_string()
    }
    fn default_ffmpeg() -> String {
        "ffmpeg".to_string()
    }
    fn default_width() -> u32 {
        640
    }
    fn default_height() -> u32 {
        480
    }
    fn default_output() -> PathBuf {
        PathBuf::from("MyVideo3.mp4")
    }

    /// `output` resolved against the executable's directory when relative.
    pub fn resolved_output(&self) -> PathBuf {
        if self.output.is_absolute() {
            return self.output.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .map(|dir| dir.join(&self.output))
            .unwrap_or_else(|| self.output.clone())
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            channels: Self::default_channels(),
            smoothing_window: None,
            fps: Self::default_fps(),
            stride: Self::default_stride(),
            codec: Self::default_codec(),
            ffmpeg: Self::default_ffmpeg(),
            width: Self::default_width(),
            height: Self::default_height(),
            output: Self::default_output(),
            font: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub threshold: ThresholdConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl AppConfig {
    /// Read the TOML file at `path`. A missing file gives the defaults; an
    /// unreadable or malformed one is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        if !path.exists() {
            log::info!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg = toml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(cfg)
    }

    /// Like [`AppConfig::load`] but falls back to defaults on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("{err:#}. Using defaults.");
                Self::default()
            }
        }
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
