//! Plain-text console reports for each pipeline run.

use std::fmt::Write;

use crate::analysis::diagnostics::SHAPIRO_ACCURATE_MAX;
use crate::analysis::sweep::{Direction, count_directions};
use crate::data::model::ParseReport;
use crate::data::timestamp::format_timestamp;
use crate::pipeline::{
    CalibrationRun, DiagnosticsRun, EMPTY_FILTER_MESSAGE, PlaybackRun, ResistanceRun, ThresholdRun,
};

fn parse_summary(out: &mut String, report: &ParseReport) {
    let _ = writeln!(
        out,
        "Rows: {} accepted, {} dropped, {} truncated",
        report.accepted,
        report.dropped_count(),
        report.truncated
    );
    for row in report.dropped.iter().take(5) {
        let _ = writeln!(out, "  line {}: {}", row.line, row.reason);
    }
    if report.dropped_count() > 5 {
        let _ = writeln!(out, "  ... {} more", report.dropped_count() - 5);
    }
}

fn series_summary(out: &mut String, run: &ResistanceRun) {
    parse_summary(out, &run.log.report);
    let f = &run.filter;
    let _ = writeln!(
        out,
        "Filter: {} in [{}, {}] -> {} rows",
        f.channel,
        f.lower,
        f.upper,
        run.series.len()
    );
    match run.series.time_span() {
        Some((t0, t1)) => {
            let _ = writeln!(
                out,
                "Time: {} .. {} ({:.3} s)",
                format_timestamp(t0),
                format_timestamp(t1),
                t1 - t0
            );
        }
        None => {
            let _ = writeln!(out, "{EMPTY_FILTER_MESSAGE}");
        }
    }
}

pub fn resistance(run: &ResistanceRun) -> String {
    let mut out = String::new();
    series_summary(&mut out, run);
    out
}

pub fn calibration(run: &CalibrationRun) -> String {
    let mut out = String::new();
    let cal = &run.calibration;
    let _ = writeln!(out, "Feature: {:?}, degree {}", cal.feature, cal.degree);

    if let Some(training) = &run.training {
        let (up, down) = count_directions(&training.directions);
        let _ = writeln!(out, "Training samples: {up} up, {down} down");
    }
    for direction in [Direction::Up, Direction::Down] {
        let branch = cal.branch(direction);
        let name = match direction {
            Direction::Up => "Up",
            Direction::Down => "Down",
        };
        let _ = writeln!(out, "{name}-sweep polynomial: {}", branch.poly);
        match branch.cv_mse {
            Some(mse) => {
                let _ = writeln!(out, "{name} sweep average MSE: {mse:.6}");
            }
            None => {
                let _ = writeln!(out, "{name} sweep average MSE: n/a");
            }
        }
    }

    if let Some(test) = &run.test {
        let _ = writeln!(out, "\nTest log");
        series_summary(&mut out, &test.run);
        if let Some(pred) = &test.prediction {
            let (up, down) = count_directions(&pred.directions);
            let _ = writeln!(out, "Predicted {} angles ({up} up, {down} down)", pred.angles.len());
            if let Some((lo, hi)) = crate::analysis::signal::min_max(&pred.angles) {
                let _ = writeln!(out, "Angle range: {lo:.4} .. {hi:.4} rad");
            }
        }
        if let Some(reason) = &test.failure {
            let _ = writeln!(out, "No angle prediction: {reason}");
        }
    }
    out
}

pub fn diagnostics(run: &DiagnosticsRun) -> String {
    let mut out = String::new();
    for col in &run.columns {
        match col.shapiro {
            Some(sw) => {
                let _ = writeln!(
                    out,
                    "Shapiro-Wilk test for {}: W = {:.3}, p-value = {:.3}",
                    col.column, sw.w, sw.p_value
                );
                if col.shapiro_is_approximate() {
                    let _ = writeln!(
                        out,
                        "   (p-value may be inaccurate for N = {} > {SHAPIRO_ACCURATE_MAX})",
                        col.samples
                    );
                }
                if let Some(verdict) = col.verdict(run.alpha) {
                    let _ = writeln!(out, "-> {verdict}\n");
                }
            }
            None => {
                let _ = writeln!(
                    out,
                    "Shapiro-Wilk test for {}: not applicable to {} samples\n",
                    col.column, col.samples
                );
            }
        }
    }

    let split = &run.split;
    let _ = writeln!(out, "Levene's test for equality of variances in {}:", split.column);
    match split.levene {
        Some(r) => {
            let _ = writeln!(out, "Statistic = {:.6}, p-value = {:.3}", r.statistic, r.p_value);
            if let Some(v) = split.levene_verdict(run.alpha) {
                let _ = writeln!(out, "-> {v}\n");
            }
        }
        None => {
            let _ = writeln!(out, "not applicable\n");
        }
    }

    let _ = writeln!(out, "Kolmogorov-Smirnov test for {}:", split.column);
    match split.ks {
        Some(r) => {
            let _ = writeln!(out, "Statistic = {:.6}, p-value = {:.3}", r.statistic, r.p_value);
            if let Some(v) = split.ks_verdict(run.alpha) {
                let _ = writeln!(out, "-> {v}");
            }
        }
        None => {
            let _ = writeln!(out, "not applicable");
        }
    }
    out
}

pub fn threshold(run: &ThresholdRun) -> String {
    let mut out = String::new();
    series_summary(&mut out, &run.run);
    if run.run.is_empty() {
        return out;
    }
    match &run.span {
        Some(span) => {
            let _ = writeln!(
                out,
                "Time duration above threshold: {} seconds",
                span.duration
            );
            let _ = writeln!(
                out,
                "Standard deviation of values in time frame: {}",
                span.std_dev.unwrap_or(f64::NAN)
            );
        }
        None => {
            let _ = writeln!(out, "No crossings above and below the threshold found.");
        }
    }
    out
}

pub fn playback(run: &PlaybackRun) -> String {
    let mut out = String::new();
    series_summary(&mut out, &run.run);
    for trace in &run.traces {
        let _ = writeln!(out, "Trace {}: {} samples", trace.label, trace.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::data::loader::parse_sensor_log;
    use crate::pipeline::{run_resistance, run_threshold};

    const LOG: &str = "\
00:00:00:000,1.6,0.05,45.0,2,-2,40,50
00:00:00:010,1.6,0.05,47.0,2,-2,40,50
garbage line
00:00:00:020,1.6,0.05,48.0,2,-2,40,50
00:00:00:030,1.6,0.05,45.5,2,-2,40,50
";

    #[test]
    fn resistance_report_mentions_drops() {
        let log = parse_sensor_log(LOG.as_bytes(), None).unwrap();
        let run = run_resistance(log, &FilterConfig::default()).unwrap();
        let text = resistance(&run);
        assert!(text.contains("4 accepted, 1 dropped"), "{text}");
        assert!(text.contains("line 3"), "{text}");
    }

    #[test]
    fn empty_filter_is_reported() {
        let log = parse_sensor_log(LOG.as_bytes(), None).unwrap();
        let cfg = FilterConfig {
            lower: 100.0,
            upper: 200.0,
            ..Default::default()
        };
        let run = run_threshold(log, &cfg, 46.7).unwrap();
        let text = threshold(&run);
        assert!(text.contains(EMPTY_FILTER_MESSAGE), "{text}");
        assert!(!text.contains("No crossings"), "{text}");
    }

    #[test]
    fn calibration_report_keeps_fit_when_prediction_fails() {
        use crate::config::CalibrationConfig;
        use crate::data::model::Table;
        use crate::pipeline::{CalibrationSource, run_calibration};

        let mut r = Vec::new();
        let mut angle = Vec::new();
        for _ in 0..3 {
            for i in (0..40).chain((0..40).rev()) {
                angle.push(i as f64 * 0.03);
            }
        }
        for (k, a) in angle.iter().enumerate() {
            let rising = (k % 80) < 40;
            r.push(42.0 + 10.0 * a + if rising { -0.2 } else { 0.2 });
        }
        let table = Table::from_columns(vec![("R".to_string(), r), ("Angle(rad)".to_string(), angle)]);
        let resting: String = (0..100)
            .map(|i| format!("00:00:{:02}:{:03},1.6,0.05,45.0,2,-2,40,50\n", i / 100, (i % 100) * 10))
            .collect();
        let test_log = parse_sensor_log(resting.as_bytes(), None).unwrap();

        let run = run_calibration(
            CalibrationSource::Fit(table),
            Some(test_log),
            &CalibrationConfig::default(),
        )
        .unwrap();
        let text = calibration(&run);
        assert!(text.contains("Up-sweep polynomial:"), "{text}");
        assert!(text.contains("Down sweep average MSE:"), "{text}");
        assert!(text.contains("No angle prediction:"), "{text}");
    }

    #[test]
    fn diagnostics_report_flags_large_samples() {
        use crate::config::DiagnosticsConfig;
        use crate::data::model::Table;
        use crate::pipeline::run_diagnostics;

        let r: Vec<f64> = (0..6000).map(|i| 45.0 + ((i * 37) % 101) as f64 * 0.01).collect();
        let angle: Vec<f64> = (0..6000).map(|i| (i % 50) as f64 * 0.02).collect();
        let h: Vec<f64> = angle.iter().map(|a| a * 40.0).collect();
        let table = Table::from_columns(vec![
            ("h".to_string(), h),
            ("Angle(rad)".to_string(), angle),
            ("R".to_string(), r),
        ]);

        let run = run_diagnostics(&table, &DiagnosticsConfig::default()).unwrap();
        let text = diagnostics(&run);
        assert!(!text.contains("not applicable to 6000"), "{text}");
        assert!(text.contains("Shapiro-Wilk test for R: W = "), "{text}");
        assert!(text.contains("p-value may be inaccurate for N = 6000 > 5000"), "{text}");
    }

    #[test]
    fn threshold_report_prints_duration() {
        let log = parse_sensor_log(LOG.as_bytes(), None).unwrap();
        let run = run_threshold(log, &FilterConfig::default(), 46.7).unwrap();
        let text = threshold(&run);
        assert!(text.contains("Time duration above threshold: 0.01 seconds"), "{text}");
        // only the first crossing (47.0) lies before the last one
        assert!(text.contains("Standard deviation of values in time frame: 0\n"), "{text}");
    }
}
