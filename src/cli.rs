use std::path::PathBuf;

use clap::{Parser, Subcommand};

use flexdms_lab::config::{AppConfig, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to config TOML
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Print the report and exit without opening the viewer
    #[arg(long, default_value_t = false)]
    pub nogui: bool,

    /// Lower filter bound (overrides config)
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub lower: Option<f64>,

    /// Upper filter bound (overrides config)
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub upper: Option<f64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Plot the filtered resistance channel over time
    Resistance {
        #[arg(value_name = "LOG")]
        log: PathBuf,
    },
    /// Fit up/down sweep polynomials and optionally predict angles for a log
    Calibrate {
        /// Table with resistance and angle columns (not needed with --model)
        #[arg(value_name = "TABLE", required_unless_present = "model")]
        table: Option<PathBuf>,
        /// Sensor log to predict angles for
        #[arg(long)]
        log: Option<PathBuf>,
        /// Save the fitted model as JSON
        #[arg(long)]
        save: Option<PathBuf>,
        /// Use a saved model instead of fitting
        #[arg(long, conflicts_with = "save")]
        model: Option<PathBuf>,
    },
    /// Normality, variance and distribution tests on a table
    Stats {
        #[arg(value_name = "TABLE")]
        table: PathBuf,
    },
    /// Time spent above a resistance threshold
    Threshold {
        #[arg(value_name = "LOG")]
        log: PathBuf,
        /// Threshold value (overrides config)
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Animated playback, optionally rendered to video or PNG frames
    Playback {
        #[arg(value_name = "LOG")]
        log: PathBuf,
        /// Encode the animation with ffmpeg, to the configured output unless a
        /// path is given
        #[arg(long, value_name = "PATH")]
        video: Option<Option<PathBuf>>,
        /// Write PNG frames to this directory
        #[arg(long, conflicts_with = "video")]
        frames: Option<PathBuf>,
    },
}

impl Args {
    /// Fold command-line overrides into the loaded config.
    pub fn apply_overrides(&self, cfg: &mut AppConfig) {
        let filter = match self.command {
            Some(Command::Calibrate { .. }) => &mut cfg.calibration.filter,
            _ => &mut cfg.log.filter,
        };
        if let Some(lower) = self.lower {
            filter.lower = lower;
        }
        if let Some(upper) = self.upper {
            filter.upper = upper;
        }
        if let Some(Command::Threshold {
            threshold: Some(t), ..
        }) = self.command
        {
            cfg.threshold.value = t;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_target_the_command_filter() {
        let args = Args::parse_from(["flexdms-lab", "calibrate", "table.csv", "--lower", "41"]);
        let mut cfg = AppConfig::default();
        args.apply_overrides(&mut cfg);
        assert_eq!(cfg.calibration.filter.lower, 41.0);
        assert_eq!(cfg.log.filter.lower, 38.0);

        let args = Args::parse_from([
            "flexdms-lab",
            "--nogui",
            "threshold",
            "log.txt",
            "--threshold",
            "47.5",
            "--upper",
            "50",
        ]);
        let mut cfg = AppConfig::default();
        args.apply_overrides(&mut cfg);
        assert!(args.nogui);
        assert_eq!(cfg.threshold.value, 47.5);
        assert_eq!(cfg.log.filter.upper, 50.0);
    }

    #[test]
    fn calibrate_needs_table_or_model() {
        assert!(Args::try_parse_from(["flexdms-lab", "calibrate"]).is_err());
        let args = Args::try_parse_from(["flexdms-lab", "calibrate", "--model", "m.json"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Calibrate { table: None, model: Some(_), .. })
        ));
    }

    #[test]
    fn video_flag_takes_an_optional_path() {
        let args = Args::parse_from(["flexdms-lab", "playback", "log.txt", "--video", "out.mp4"]);
        assert!(matches!(
            args.command,
            Some(Command::Playback { video: Some(Some(_)), .. })
        ));
    }

    #[test]
    fn bare_video_flag_uses_configured_output() {
        let args = Args::parse_from(["flexdms-lab", "playback", "log.txt", "--video"]);
        match args.command {
            Some(Command::Playback { video: Some(None), frames: None, .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }
}
