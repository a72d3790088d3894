use std::path::PathBuf;

use anyhow::Result;

use flexdms_lab::analysis::calibration::SweepCalibration;
use flexdms_lab::color::ChannelColors;
use flexdms_lab::config::AppConfig;
use flexdms_lab::data::loader::{load_sensor_log, load_table};
use flexdms_lab::pipeline::{
    self, CalibrationRun, CalibrationSource, DiagnosticsRun, PlaybackRun, ResistanceRun,
    ThresholdRun,
};

// ---------------------------------------------------------------------------
// Tabs and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Resistance,
    Calibration,
    Prediction,
    Diagnostics,
    Threshold,
    Playback,
}

impl Tab {
    pub const ALL: [Tab; 6] = [
        Tab::Resistance,
        Tab::Calibration,
        Tab::Prediction,
        Tab::Diagnostics,
        Tab::Threshold,
        Tab::Playback,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Resistance => "Resistance",
            Tab::Calibration => "Calibration",
            Tab::Prediction => "Prediction",
            Tab::Diagnostics => "Diagnostics",
            Tab::Threshold => "Threshold",
            Tab::Playback => "Playback",
        }
    }
}

/// The result of one command-line run, handed to the viewer.
pub enum Outcome {
    Resistance(ResistanceRun),
    Calibration(CalibrationRun),
    Diagnostics(DiagnosticsRun),
    Threshold(ThresholdRun),
    Playback(PlaybackRun),
}

/// Playback animation cursor.
#[derive(Debug, Clone)]
pub struct Player {
    pub playing: bool,
    /// Samples currently shown (fractional while advancing).
    pub position: f64,
    /// Samples per second.
    pub speed: f64,
    pub last_tick: Option<f64>,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            playing: false,
            position: 0.0,
            speed: 30.0,
            last_tick: None,
        }
    }
}

impl Player {
    pub fn rewind(&mut self) {
        self.position = 0.0;
        self.last_tick = None;
    }

    /// Advance to wall-clock `now` (seconds); stops at `total` samples.
    pub fn tick(&mut self, now: f64, total: usize) {
        if !self.playing {
            self.last_tick = None;
            return;
        }
        if let Some(last) = self.last_tick {
            self.position += (now - last) * self.speed;
        }
        self.last_tick = Some(now);
        if self.position >= total as f64 {
            self.position = total as f64;
            self.playing = false;
        }
    }

    pub fn visible(&self, total: usize) -> usize {
        (self.position.floor() as usize).min(total)
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: AppConfig,

    /// Sensor log shared by the log-based tabs.
    pub log_path: Option<PathBuf>,
    /// Calibration / diagnostics table.
    pub table_path: Option<PathBuf>,
    /// Saved calibration used instead of fitting on the table.
    pub model_path: Option<PathBuf>,

    pub resistance: Option<ResistanceRun>,
    pub calibration: Option<CalibrationRun>,
    pub diagnostics: Option<DiagnosticsRun>,
    pub threshold: Option<ThresholdRun>,
    pub playback: Option<PlaybackRun>,

    pub player: Player,
    pub tab: Tab,
    pub colors: ChannelColors,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            log_path: None,
            table_path: None,
            model_path: None,
            resistance: None,
            calibration: None,
            diagnostics: None,
            threshold: None,
            playback: None,
            player: Player::default(),
            tab: Tab::Resistance,
            colors: ChannelColors::default(),
            status_message: None,
        }
    }

    /// Show the result of a command-line run.
    pub fn install(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Resistance(run) => {
                self.resistance = Some(run);
                self.tab = Tab::Resistance;
            }
            Outcome::Calibration(run) => {
                self.tab = if run.test.is_some() {
                    Tab::Prediction
                } else {
                    Tab::Calibration
                };
                self.calibration = Some(run);
            }
            Outcome::Diagnostics(run) => {
                self.diagnostics = Some(run);
                self.tab = Tab::Diagnostics;
            }
            Outcome::Threshold(run) => {
                self.threshold = Some(run);
                self.tab = Tab::Threshold;
            }
            Outcome::Playback(run) => {
                self.playback = Some(run);
                self.player.rewind();
                self.player.playing = true;
                self.tab = Tab::Playback;
            }
        }
    }

    pub fn set_log(&mut self, path: PathBuf) {
        self.log_path = Some(path);
        self.recompute();
    }

    pub fn set_table(&mut self, path: PathBuf) {
        self.table_path = Some(path);
        self.recompute();
    }

    pub fn set_model(&mut self, path: PathBuf) {
        self.model_path = Some(path);
        self.recompute();
    }

    /// Rerun every analysis whose inputs are set, reporting the first error.
    pub fn recompute(&mut self) {
        let mut errors = Vec::new();
        if let Err(e) = self.recompute_log_runs() {
            errors.push(e);
        }
        if let Err(e) = self.recompute_calibration() {
            errors.push(e);
        }
        if let Err(e) = self.recompute_diagnostics() {
            errors.push(e);
        }

        self.status_message = errors.first().map(|e| {
            log::error!("{e:#}");
            format!("Error: {e:#}")
        });
    }

    fn recompute_log_runs(&mut self) -> Result<()> {
        let Some(path) = self.log_path.clone() else {
            return Ok(());
        };
        let cfg = &self.config;

        self.resistance = None;
        self.threshold = None;
        self.playback = None;

        let log = load_sensor_log(&path, cfg.log.max_rows)?;
        self.resistance = Some(pipeline::run_resistance(log.clone(), &cfg.log.filter)?);
        self.playback = Some(pipeline::run_playback(log, &cfg.log.filter, &cfg.playback)?);
        self.player.rewind();

        let log = load_sensor_log(&path, cfg.threshold.max_rows)?;
        self.threshold = Some(pipeline::run_threshold(
            log,
            &cfg.log.filter,
            cfg.threshold.value,
        )?);
        Ok(())
    }

    fn recompute_calibration(&mut self) -> Result<()> {
        let cfg = &self.config.calibration;
        let source = match (&self.model_path, &self.table_path) {
            (Some(model), _) => CalibrationSource::Saved(SweepCalibration::load(model)?),
            (None, Some(table)) => CalibrationSource::Fit(load_table(table)?),
            (None, None) => return Ok(()),
        };
        self.calibration = None;
        let test_log = match &self.log_path {
            Some(path) => Some(load_sensor_log(path, cfg.max_rows)?),
            None => None,
        };
        self.calibration = Some(pipeline::run_calibration(source, test_log, cfg)?);
        Ok(())
    }

    fn recompute_diagnostics(&mut self) -> Result<()> {
        let Some(path) = &self.table_path else {
            return Ok(());
        };
        self.diagnostics = None;
        self.diagnostics = Some(pipeline::load_diagnostics(path, &self.config.diagnostics)?);
        Ok(())
    }
}
