//! One function per analysis: load → filter → analyse.
//!
//! Each run returns a plain result struct that the console report and the
//! viewer both render. An empty filter result is not an error; the run
//! carries the empty series and the dependent analysis is `None`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::analysis::calibration::{Prediction, SweepCalibration, TrainingSet};
use crate::analysis::diagnostics::{ColumnDiagnostics, HalfSplitComparison};
use crate::analysis::signal::moving_average_same;
use crate::analysis::threshold::{ThresholdSpan, measure_threshold};
use crate::color::ChannelColors;
use crate::config::{CalibrationConfig, DiagnosticsConfig, FilterConfig, PlaybackConfig};
use crate::data::filter::{FilteredSeries, RangeFilter, filter_by_range};
use crate::data::loader::{load_sensor_log, load_table};
use crate::data::model::{Channel, SensorLog, Table};
use crate::video::{Trace, VideoSettings};

pub const EMPTY_FILTER_MESSAGE: &str = "No rows remain after filtering.";

// ---------------------------------------------------------------------------
// Resistance over time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ResistanceRun {
    pub log: SensorLog,
    pub filter: RangeFilter,
    pub series: FilteredSeries,
}

impl ResistanceRun {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

pub fn range_filter(cfg: &FilterConfig) -> Result<RangeFilter> {
    RangeFilter::new(cfg.channel, cfg.lower, cfg.upper).context("building range filter")
}

pub fn run_resistance(log: SensorLog, cfg: &FilterConfig) -> Result<ResistanceRun> {
    let filter = range_filter(cfg)?;
    let series = filter_by_range(&log, &filter);
    if series.is_empty() {
        log::warn!("{EMPTY_FILTER_MESSAGE}");
    }
    Ok(ResistanceRun {
        log,
        filter,
        series,
    })
}

pub fn load_resistance(path: &Path, max_rows: Option<usize>, cfg: &FilterConfig) -> Result<ResistanceRun> {
    run_resistance(load_sensor_log(path, max_rows)?, cfg)
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Where the calibration polynomials come from.
#[derive(Debug, Clone)]
pub enum CalibrationSource {
    /// Fit on a table with resistance and angle columns.
    Fit(Table),
    /// A previously saved model.
    Saved(SweepCalibration),
}

/// Angle predictions for a filtered test log.
#[derive(Debug, Clone)]
pub struct TestPrediction {
    pub run: ResistanceRun,
    /// `None` when nothing survived the filter or prediction failed.
    pub prediction: Option<Prediction>,
    /// Why prediction failed on a non-empty series.
    pub failure: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CalibrationRun {
    pub calibration: SweepCalibration,
    /// Present when the model was fitted in this run.
    pub training: Option<TrainingSet>,
    pub test: Option<TestPrediction>,
}

pub fn run_calibration(
    source: CalibrationSource,
    test_log: Option<SensorLog>,
    cfg: &CalibrationConfig,
) -> Result<CalibrationRun> {
    let (calibration, training) = match source {
        CalibrationSource::Fit(table) => {
            let (resistance, angle) = table
                .paired(&cfg.resistance_column, &cfg.angle_column)
                .context("selecting calibration columns")?;
            let (cal, training) = SweepCalibration::fit(&resistance, &angle, &cfg.params())
                .context("fitting calibration")?;
            (cal, Some(training))
        }
        CalibrationSource::Saved(cal) => (cal, None),
    };

    let test = match test_log {
        Some(log) => {
            let run = run_resistance(log, &cfg.filter)?;
            let mut failure = None;
            let prediction = if run.is_empty() {
                None
            } else {
                let resistance = run.series.channel(Channel::Resistance);
                match calibration.predict(&resistance, &cfg.inference()) {
                    Ok(prediction) => Some(prediction),
                    Err(e) => {
                        log::warn!("Cannot predict angles for the test log: {e}");
                        failure = Some(e.to_string());
                        None
                    }
                }
            };
            Some(TestPrediction {
                run,
                prediction,
                failure,
            })
        }
        None => None,
    };

    Ok(CalibrationRun {
        calibration,
        training,
        test,
    })
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DiagnosticsRun {
    pub columns: Vec<ColumnDiagnostics>,
    pub split: HalfSplitComparison,
    pub alpha: f64,
}

pub fn run_diagnostics(table: &Table, cfg: &DiagnosticsConfig) -> Result<DiagnosticsRun> {
    let mut columns = Vec::with_capacity(cfg.columns.len());
    for name in &cfg.columns {
        let values = table.column_dropna(name)?;
        columns.push(ColumnDiagnostics::compute(name, &values, cfg.bins));
    }

    let (first, second) = table.split_half(&cfg.split_column)?;
    let split = HalfSplitComparison::compute(&cfg.split_column, &first, &second);
    log::info!(
        "Diagnostics for {} columns, split of '{}' into {} + {}",
        columns.len(),
        cfg.split_column,
        split.first_len,
        split.second_len
    );

    Ok(DiagnosticsRun {
        columns,
        split,
        alpha: cfg.alpha,
    })
}

pub fn load_diagnostics(path: &Path, cfg: &DiagnosticsConfig) -> Result<DiagnosticsRun> {
    run_diagnostics(&load_table(path)?, cfg)
}

// ---------------------------------------------------------------------------
// Threshold duration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ThresholdRun {
    pub run: ResistanceRun,
    pub threshold: f64,
    pub span: Option<ThresholdSpan>,
}

pub fn run_threshold(log: SensorLog, filter: &FilterConfig, threshold: f64) -> Result<ThresholdRun> {
    let run = run_resistance(log, filter)?;
    let values = run.series.channel(filter.channel);
    let span = measure_threshold(&run.series.times, &values, threshold);
    match &span {
        Some(s) => log::info!(
            "Above {threshold} for {:.3} s (std {:.4})",
            s.duration,
            s.std_dev.unwrap_or(f64::NAN)
        ),
        None if !run.is_empty() => log::info!("Nothing above {threshold}"),
        None => {}
    }
    Ok(ThresholdRun {
        run,
        threshold,
        span,
    })
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PlaybackRun {
    pub run: ResistanceRun,
    pub traces: Vec<Trace>,
}

pub fn run_playback(log: SensorLog, filter: &FilterConfig, cfg: &PlaybackConfig) -> Result<PlaybackRun> {
    let run = run_resistance(log, filter)?;
    let colors = ChannelColors::default();
    let window = cfg.smoothing_window.unwrap_or(1);

    let traces = if run.is_empty() {
        Vec::new()
    } else {
        cfg.channels
            .iter()
            .map(|&channel| Trace {
                label: channel.label().to_string(),
                color: colors.color_for(channel),
                times: run.series.times.clone(),
                values: moving_average_same(&run.series.channel(channel), window),
            })
            .collect()
    };
    Ok(PlaybackRun { run, traces })
}

/// Video settings for a playback run; the y axis spans the filter bounds.
pub fn video_settings(filter: &FilterConfig, cfg: &PlaybackConfig) -> VideoSettings {
    VideoSettings {
        fps: cfg.fps,
        codec: cfg.codec.clone(),
        ffmpeg: cfg.ffmpeg.clone(),
        width: cfg.width,
        height: cfg.height,
        stride: cfg.stride,
        y_range: (filter.lower, filter.upper),
        title: "Sensor playback".to_string(),
        y_label: "Filtered Value".to_string(),
        font: cfg.font.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::parse_sensor_log;

    fn log_from(rows: &[(u32, f64)]) -> SensorLog {
        let text: String = rows
            .iter()
            .map(|(ms, r)| format!("00:00:{:02}:{:03},1.6,0.05,{r},2,-2,40,50\n", ms / 1000, ms % 1000))
            .collect();
        parse_sensor_log(text.as_bytes(), None).unwrap()
    }

    #[test]
    fn resistance_run_filters_inclusively() {
        let log = log_from(&[(0, 37.9), (10, 38.0), (20, 45.0), (30, 58.0), (40, 58.1)]);
        let run = run_resistance(log, &FilterConfig::default()).unwrap();
        assert_eq!(run.series.len(), 3);
        assert_eq!(run.series.times, vec![0.01, 0.02, 0.03]);
    }

    #[test]
    fn inverted_bounds_are_an_error() {
        let cfg = FilterConfig {
            lower: 50.0,
            upper: 40.0,
            ..Default::default()
        };
        assert!(run_resistance(SensorLog::default(), &cfg).is_err());
    }

    #[test]
    fn threshold_run_on_empty_filter_has_no_span() {
        let log = log_from(&[(0, 10.0), (10, 11.0)]);
        let run = run_threshold(log, &FilterConfig::default(), 46.7).unwrap();
        assert!(run.run.is_empty());
        assert!(run.span.is_none());
    }

    fn hysteresis_table() -> Table {
        let mut r = Vec::new();
        let mut angle = Vec::new();
        for cycle in 0..3 {
            for i in 0..40 {
                let a = i as f64 * 0.03;
                angle.push(a);
                r.push(42.0 + 10.0 * a - 0.2 + 0.001 * cycle as f64);
            }
            for i in (0..40).rev() {
                let a = i as f64 * 0.03;
                angle.push(a);
                r.push(42.0 + 10.0 * a + 0.2 + 0.001 * cycle as f64);
            }
        }
        Table::from_columns(vec![("R".to_string(), r), ("Angle(rad)".to_string(), angle)])
    }

    #[test]
    fn resting_test_log_keeps_the_fit() {
        let rows: Vec<(u32, f64)> = (0..200)
            .map(|i| (i * 10, if i % 10 == 0 { 45.01 } else { 45.0 }))
            .collect();
        let cfg = CalibrationConfig {
            feature: crate::analysis::calibration::Feature::Normalized,
            ..Default::default()
        };
        let run = run_calibration(
            CalibrationSource::Fit(hysteresis_table()),
            Some(log_from(&rows)),
            &cfg,
        )
        .unwrap();
        assert!(run.training.is_some());
        let test = run.test.as_ref().unwrap();
        assert_eq!(test.run.series.len(), 200);
        assert!(test.prediction.is_none());
        assert!(test.failure.is_some());
    }

    #[test]
    fn playback_smooths_selected_channels() {
        let log = log_from(&[(0, 40.0), (10, 43.0), (20, 46.0), (30, 49.0)]);
        let cfg = PlaybackConfig {
            channels: vec![Channel::Resistance, Channel::RTop],
            smoothing_window: Some(3),
            ..Default::default()
        };
        let run = run_playback(log, &FilterConfig::default(), &cfg).unwrap();
        assert_eq!(run.traces.len(), 2);
        assert_eq!(run.traces[0].values.len(), 4);
        assert!((run.traces[0].values[1] - 43.0).abs() < 1e-9);
        assert!((run.traces[1].values[1] - 50.0).abs() < 1e-9);
    }
}
