//! File-based runs of the pipelines: a log synthesized through the front-end
//! model and a calibration table written as CSV.

use std::fs;
use std::path::PathBuf;

use flexdms_lab::analysis::calibration::SweepCalibration;
use flexdms_lab::analysis::frontend::{FrontEnd, FrontEndConfig};
use flexdms_lab::config::{AppConfig, CalibrationConfig, FilterConfig};
use flexdms_lab::data::loader::{load_sensor_log, load_table};
use flexdms_lab::data::model::Channel;
use flexdms_lab::data::timestamp::format_timestamp;
use flexdms_lab::pipeline::{self, CalibrationSource};
use flexdms_lab::report;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("flexdms_it_{name}_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Resistance ramp 40 → 56 → 40 pushed through the signal chain.
fn write_log(path: &PathBuf, steps: usize) {
    let mut front_end = FrontEnd::new(FrontEndConfig::default());
    let mut text = String::from("# header line\n");
    for i in 0..steps {
        let phase = i as f64 / steps as f64;
        let level = if phase < 0.5 { phase * 2.0 } else { 2.0 - phase * 2.0 };
        let target = 40.0 + 16.0 * level;
        let voltage = {
            let cfg = front_end.config();
            cfg.input_voltage(cfg.bridge_voltage(target))
        };
        if let Some(sample) = front_end.process_voltage(voltage) {
            text.push_str(&format!(
                "{},{}\n",
                format_timestamp(i as f64 * 0.01),
                sample.format_row()
            ));
        }
    }
    fs::write(path, text).unwrap();
}

/// Four bend cycles with a small up/down hysteresis.
fn write_table(path: &PathBuf) {
    let mut text = String::from("h,Angle(rad),R\n");
    for i in 0..240 {
        let phase = (i % 60) as f64 / 60.0;
        let (level, rising) = if phase < 0.5 {
            (phase * 2.0, true)
        } else {
            (2.0 - phase * 2.0, false)
        };
        let angle = 1.2 * level;
        let offset = if rising { -0.3 } else { 0.3 };
        let r = 42.0 + 10.0 * angle + offset * level;
        text.push_str(&format!("{:.3},{angle:.5},{r:.4}\n", 50.0 * level));
    }
    fs::write(path, text).unwrap();
}

#[test]
fn synthesized_log_loads_and_filters() {
    let dir = scratch_dir("log");
    let path = dir.join("log.txt");
    write_log(&path, 400);

    let log = load_sensor_log(&path, None).unwrap();
    assert_eq!(log.len(), 400);
    assert_eq!(log.report.dropped_count(), 1);

    let filter = FilterConfig {
        channel: Channel::Resistance,
        lower: 38.0,
        upper: 58.0,
    };
    let run = pipeline::run_resistance(log.clone(), &filter).unwrap();
    assert!(!run.is_empty());
    for v in run.series.channel(Channel::Resistance) {
        assert!((38.0..=58.0).contains(&v));
    }

    let threshold = pipeline::run_threshold(log, &filter, 50.0).unwrap();
    let span = threshold.span.as_ref().expect("ramp crosses 50");
    assert!(span.duration > 0.0);
    assert!(report::threshold(&threshold).contains("Time duration above threshold"));
}

#[test]
fn row_limit_truncates_the_log() {
    let dir = scratch_dir("limit");
    let path = dir.join("log.txt");
    write_log(&path, 100);

    let log = load_sensor_log(&path, Some(30)).unwrap();
    assert_eq!(log.len(), 30);
}

#[test]
fn calibration_survives_save_and_load() {
    let dir = scratch_dir("cal");
    let table_path = dir.join("table.csv");
    let log_path = dir.join("log.txt");
    let model_path = dir.join("model.json");
    write_table(&table_path);
    write_log(&log_path, 600);

    let cfg = CalibrationConfig::default();
    let fitted = pipeline::run_calibration(
        CalibrationSource::Fit(load_table(&table_path).unwrap()),
        None,
        &cfg,
    )
    .unwrap();
    assert!(fitted.training.is_some());
    assert!(fitted.calibration.up.cv_mse.is_some());
    fitted.calibration.save(&model_path).unwrap();

    let loaded = SweepCalibration::load(&model_path).unwrap();
    assert_eq!(loaded, fitted.calibration);

    let test_log = load_sensor_log(&log_path, cfg.max_rows).unwrap();
    let run = pipeline::run_calibration(CalibrationSource::Saved(loaded), Some(test_log), &cfg)
        .unwrap();
    assert!(run.training.is_none());
    let test = run.test.expect("test log given");
    let prediction = test.prediction.expect("rows inside the calibration filter");
    assert_eq!(prediction.angles.len(), test.run.series.len());
    assert!(prediction.angles.iter().all(|a| a.is_finite()));
}

#[test]
fn diagnostics_run_on_the_calibration_table() {
    let dir = scratch_dir("stats");
    let path = dir.join("table.csv");
    write_table(&path);

    let cfg = AppConfig::default();
    let run = pipeline::load_diagnostics(&path, &cfg.diagnostics).unwrap();
    assert_eq!(run.columns.len(), 3);
    assert_eq!(run.split.first_len + run.split.second_len, 240);
    assert!(run.columns.iter().all(|c| c.histogram.is_some()));
    assert!(report::diagnostics(&run).contains("Shapiro-Wilk"));
}

#[test]
fn missing_column_is_an_error() {
    let dir = scratch_dir("missing");
    let path = dir.join("table.csv");
    fs::write(&path, "a,b\n1,2\n3,4\n").unwrap();

    let cfg = AppConfig::default();
    assert!(pipeline::load_diagnostics(&path, &cfg.diagnostics).is_err());
    assert!(pipeline::run_calibration(
        CalibrationSource::Fit(load_table(&path).unwrap()),
        None,
        &cfg.calibration,
    )
    .is_err());
}
