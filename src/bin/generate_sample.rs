use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use flexdms_lab::analysis::frontend::{FrontEnd, FrontEndConfig};
use flexdms_lab::data::timestamp::format_timestamp;

const LOG_PATH: &str = "sample_log.txt";
const TABLE_PATH: &str = "sample_calibration.csv";

/// Seconds of logging.
const DURATION_S: f64 = 60.0;
/// Bend cycle period in seconds.
const CYCLE_S: f64 = 6.0;
/// Largest bend angle in radians.
const MAX_ANGLE: f64 = 1.2;
/// Sensor resistance at rest and its change per radian.
const R_REST: f64 = 42.0;
const R_PER_RAD: f64 = 10.0;
/// Resistance lag between loading and unloading.
const HYSTERESIS: f64 = 0.6;
const SENSOR_LENGTH_MM: f64 = 50.0;

/// Triangle wave in `[0, 1]` and whether it is rising.
fn triangle(t: f64, period: f64) -> (f64, bool) {
    let phase = (t / period).fract();
    if phase < 0.5 {
        (phase * 2.0, true)
    } else {
        (2.0 - phase * 2.0, false)
    }
}

fn sensor_resistance(angle: f64, rising: bool) -> f64 {
    let offset = if rising { -HYSTERESIS / 2.0 } else { HYSTERESIS / 2.0 };
    R_REST + R_PER_RAD * angle + offset * (angle / MAX_ANGLE).min(1.0)
}

fn write_log(rng: &mut StdRng) -> Result<usize> {
    let config = FrontEndConfig::default();
    let period_s = config.period_ms as f64 / 1000.0;
    let oversampling = config.oversampling;
    let mut front_end = FrontEnd::new(config);
    let adc_noise = Normal::new(0.0, 0.8)?;

    let file = File::create(LOG_PATH).with_context(|| format!("creating {LOG_PATH}"))?;
    let mut out = BufWriter::new(file);

    let steps = (DURATION_S / period_s) as usize;
    let mut rows = 0;
    for step in 0..steps {
        let t = step as f64 * period_s;
        let (level, rising) = triangle(t, CYCLE_S);
        let target = sensor_resistance(level * MAX_ANGLE, rising);

        let cfg = front_end.config();
        let counts = cfg.voltage_to_counts(cfg.input_voltage(cfg.bridge_voltage(target)));
        let max = cfg.adc_max_counts;
        let burst: Vec<u16> = (0..oversampling)
            .map(|_| (counts + adc_noise.sample(rng)).round().clamp(0.0, max) as u16)
            .collect();

        if let Some(sample) = front_end.process(&burst) {
            writeln!(out, "{},{}", format_timestamp(t), sample.format_row())?;
            rows += 1;
        }
    }
    out.flush()?;
    Ok(rows)
}

fn write_table(rng: &mut StdRng) -> Result<usize> {
    let noise = Normal::new(0.0, 0.15)?;
    let mut writer = csv::Writer::from_path(TABLE_PATH)
        .with_context(|| format!("creating {TABLE_PATH}"))?;
    writer.write_record(["h", "Angle(rad)", "R"])?;

    // Four slow bend cycles sampled at 60 points each.
    let points_per_cycle = 60;
    let mut rows = 0;
    for i in 0..4 * points_per_cycle {
        let (level, rising) = triangle(i as f64, points_per_cycle as f64);
        let angle = level * MAX_ANGLE;
        let h = SENSOR_LENGTH_MM * (1.0 - angle.cos()) / angle.max(1e-9);
        let r = sensor_resistance(angle, rising) + noise.sample(rng);
        writer.write_record([format!("{h:.3}"), format!("{angle:.5}"), format!("{r:.3}")])?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

fn main() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(42);

    let log_rows = write_log(&mut rng)?;
    println!("Wrote {log_rows} log rows to {LOG_PATH}");

    let table_rows = write_table(&mut rng)?;
    println!("Wrote {table_rows} calibration rows to {TABLE_PATH}");
    Ok(())
}
