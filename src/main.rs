mod app;
mod cli;
mod state;
mod ui;

use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser};
use eframe::egui;

use flexdms_lab::analysis::calibration::SweepCalibration;
use flexdms_lab::config::AppConfig;
use flexdms_lab::data::loader::{load_sensor_log, load_table};
use flexdms_lab::pipeline::{self, CalibrationSource};
use flexdms_lab::report;
use flexdms_lab::video::{VideoSink, encode_video};

use app::FlexDmsApp;
use cli::{Args, Command};
use state::{AppState, Outcome};

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = AppConfig::load(&args.config)?;
    args.apply_overrides(&mut config);

    let outcome = match &args.command {
        Some(command) => Some(execute(command, &config)?),
        None => None,
    };

    if args.nogui {
        if outcome.is_none() {
            Args::command().print_help()?;
        }
        return Ok(());
    }

    let mut state = AppState::new(config);
    if let Some(command) = &args.command {
        remember_inputs(&mut state, command);
    }
    if let Some(outcome) = outcome {
        state.install(outcome);
    }
    run_viewer(state)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Run one command, print its report and return the result for the viewer.
fn execute(command: &Command, cfg: &AppConfig) -> Result<Outcome> {
    match command {
        Command::Resistance { log } => {
            let run = pipeline::load_resistance(log, cfg.log.max_rows, &cfg.log.filter)?;
            print!("{}", report::resistance(&run));
            Ok(Outcome::Resistance(run))
        }
        Command::Calibrate {
            table,
            log,
            save,
            model,
        } => {
            let cal_cfg = &cfg.calibration;
            let source = match (model, table) {
                (Some(model), _) => CalibrationSource::Saved(SweepCalibration::load(model)?),
                (None, Some(table)) => CalibrationSource::Fit(load_table(table)?),
                (None, None) => return Err(anyhow!("a TABLE or --model is required")),
            };
            let test_log = log
                .as_deref()
                .map(|path| load_sensor_log(path, cal_cfg.max_rows))
                .transpose()?;

            let run = pipeline::run_calibration(source, test_log, cal_cfg)?;
            if let Some(path) = save {
                run.calibration.save(path)?;
                println!("Saved calibration to {}", path.display());
            }
            print!("{}", report::calibration(&run));
            Ok(Outcome::Calibration(run))
        }
        Command::Stats { table } => {
            let run = pipeline::load_diagnostics(table, &cfg.diagnostics)?;
            print!("{}", report::diagnostics(&run));
            Ok(Outcome::Diagnostics(run))
        }
        Command::Threshold { log, .. } => {
            let sensor_log = load_sensor_log(log, cfg.threshold.max_rows)?;
            let run = pipeline::run_threshold(sensor_log, &cfg.log.filter, cfg.threshold.value)?;
            print!("{}", report::threshold(&run));
            Ok(Outcome::Threshold(run))
        }
        Command::Playback { log, video, frames } => {
            let sensor_log = load_sensor_log(log, cfg.log.max_rows)?;
            let run = pipeline::run_playback(sensor_log, &cfg.log.filter, &cfg.playback)?;
            print!("{}", report::playback(&run));

            let sink = match (video, frames) {
                (Some(path), _) => Some(VideoSink::Ffmpeg(
                    path.clone().unwrap_or_else(|| cfg.playback.resolved_output()),
                )),
                (None, Some(dir)) => Some(VideoSink::PngFrames(dir.clone())),
                (None, None) => None,
            };
            if let Some(sink) = sink {
                let settings = pipeline::video_settings(&cfg.log.filter, &cfg.playback);
                let written = encode_video(&run.traces, &settings, &sink, report_progress)
                    .with_context(|| format!("rendering {}", sink.path().display()))?;
                println!("Wrote {written} frames to {}", sink.path().display());
            }
            Ok(Outcome::Playback(run))
        }
    }
}

fn report_progress(done: usize, total: usize) {
    let step = (total / 10).max(1);
    if done % step == 0 || done == total {
        log::info!("Rendering: {}% ({done}/{total})", done * 100 / total.max(1));
    }
}

/// Point the viewer at the command's input files so settings changes can
/// recompute.
fn remember_inputs(state: &mut AppState, command: &Command) {
    match command {
        Command::Resistance { log } | Command::Threshold { log, .. } | Command::Playback { log, .. } => {
            state.log_path = Some(log.clone());
        }
        Command::Calibrate {
            table, log, model, ..
        } => {
            state.table_path = table.clone();
            state.log_path = log.clone();
            state.model_path = model.clone();
        }
        Command::Stats { table } => {
            state.table_path = Some(table.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Viewer
// ---------------------------------------------------------------------------

fn run_viewer(state: AppState) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "FlexDMS Lab – Sensor Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(FlexDmsApp::new(state)))),
    )
    .map_err(|e| anyhow!("viewer failed: {e}"))
}
