use super::signal::{mean, std_dev};

pub const DEFAULT_THRESHOLD: f64 = 46.7;

/// Span between the first and the last sample above a threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSpan {
    pub threshold: f64,
    pub first: usize,
    pub last: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    /// Population standard deviation over `first..last`, excluding the last
    /// crossing. `None` when both crossings are the same sample.
    pub std_dev: Option<f64>,
    /// Mean over the same window as `std_dev`.
    pub mean: Option<f64>,
    /// Samples strictly above the threshold.
    pub above_count: usize,
}

impl ThresholdSpan {
    /// `(time, value)` points inside the span.
    pub fn window_points(&self, times: &[f64], values: &[f64]) -> Vec<[f64; 2]> {
        times[self.first..=self.last]
            .iter()
            .zip(&values[self.first..=self.last])
            .map(|(t, v)| [*t, *v])
            .collect()
    }
}

/// Locate the threshold span. `None` when no value exceeds the threshold.
///
/// Samples between `first` and `last` that dip below the threshold are still
/// part of the span.
pub fn measure_threshold(times: &[f64], values: &[f64], threshold: f64) -> Option<ThresholdSpan> {
    let n = times.len().min(values.len());
    let values = &values[..n];
    let first = values.iter().position(|v| *v > threshold)?;
    let last = values.iter().rposition(|v| *v > threshold)?;
    let above_count = values.iter().filter(|v| **v > threshold).count();

    let window = &values[first..last];
    let span = ThresholdSpan {
        threshold,
        first,
        last,
        start_time: times[first],
        end_time: times[last],
        duration: times[last] - times[first],
        std_dev: std_dev(window),
        mean: mean(window),
        above_count,
    };
    log::debug!(
        "Threshold {threshold}: samples {first}..={last}, {:.3} s",
        span.duration
    );
    Some(span)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn known_crossings() {
        let times: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
        let values = [45.0, 46.0, 47.0, 48.0, 46.0, 49.0, 47.0, 45.0, 44.0, 45.0];
        let span = measure_threshold(&times, &values, 46.7).unwrap();
        assert_eq!((span.first, span.last), (2, 6));
        assert!(close(span.duration, 2.0));
        assert_eq!(span.above_count, 4);

        // window 47, 48, 46, 49 (last crossing excluded): mean 47.5,
        // population variance (0.25 + 0.25 + 2.25 + 2.25) / 4 = 1.25
        assert!(close(span.mean.unwrap(), 47.5));
        assert!(close(span.std_dev.unwrap(), 1.25f64.sqrt()));
        assert_eq!(span.window_points(&times, &values).len(), 5);
    }

    #[test]
    fn single_crossing_has_zero_duration() {
        let times = [0.0, 1.0, 2.0];
        let span = measure_threshold(&times, &[40.0, 50.0, 40.0], 46.7).unwrap();
        assert_eq!(span.duration, 0.0);
        assert_eq!(span.std_dev, None);
        assert_eq!(span.mean, None);
    }

    #[test]
    fn nothing_above_threshold() {
        assert!(measure_threshold(&[0.0, 1.0], &[46.7, 40.0], 46.7).is_none());
        assert!(measure_threshold(&[], &[], 46.7).is_none());
    }
}
