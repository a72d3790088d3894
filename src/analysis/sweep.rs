use std::fmt;

use serde::{Deserialize, Serialize};

use super::signal::{diff, rolling_mean_centered};

/// Direction of a resistance sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// How successive differences turn into labels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepParams {
    /// A (smoothed) difference strictly above this is `Up`.
    pub threshold: f64,
    /// Centered rolling-mean window applied to the differences.
    pub smoothing_window: Option<usize>,
}

impl SweepParams {
    /// Raw sign of the difference, as used for training data.
    pub fn raw() -> Self {
        SweepParams {
            threshold: 0.0,
            smoothing_window: None,
        }
    }
}

/// Label every position whose (smoothed) difference is defined.
pub fn sweep_labels(values: &[f64], params: &SweepParams) -> Vec<Option<Direction>> {
    let d = diff(values);
    let d = match params.smoothing_window {
        Some(w) if w > 1 => rolling_mean_centered(&d, w),
        _ => d,
    };
    d.into_iter()
        .map(|v| {
            v.map(|v| {
                if v > params.threshold {
                    Direction::Up
                } else {
                    Direction::Down
                }
            })
        })
        .collect()
}

/// Label every position. Undefined positions take the next defined label,
/// trailing ones the last defined label; with no defined label at all the
/// series is treated as `Down`.
pub fn classify_sweeps(values: &[f64], params: &SweepParams) -> Vec<Direction> {
    let labels = sweep_labels(values, params);

    let mut out = vec![Direction::Down; labels.len()];
    let mut next: Option<Direction> = None;
    for (slot, label) in out.iter_mut().zip(&labels).rev() {
        if label.is_some() {
            next = *label;
        }
        if let Some(d) = next {
            *slot = d;
        }
    }

    // trailing gap: carry the last defined label forward
    if let Some(last_defined) = labels.iter().rposition(Option::is_some) {
        let carry = out[last_defined];
        for slot in &mut out[last_defined + 1..] {
            *slot = carry;
        }
    }
    out
}

/// Number of `(up, down)` labels.
pub fn count_directions(labels: &[Direction]) -> (usize, usize) {
    let up = labels.iter().filter(|d| **d == Direction::Up).count();
    (up, labels.len() - up)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smoothed() -> SweepParams {
        SweepParams {
            threshold: 0.05,
            smoothing_window: Some(10),
        }
    }

    #[test]
    fn increasing_series_is_all_up() {
        let values: Vec<f64> = (0..100).map(|i| 40.0 + 0.1 * i as f64).collect();
        assert!(classify_sweeps(&values, &SweepParams::raw())
            .iter()
            .all(|d| *d == Direction::Up));
        assert!(classify_sweeps(&values, &smoothed())
            .iter()
            .all(|d| *d == Direction::Up));
    }

    #[test]
    fn decreasing_series_is_all_down() {
        let values: Vec<f64> = (0..100).map(|i| 50.0 - 0.1 * i as f64).collect();
        assert!(classify_sweeps(&values, &SweepParams::raw())
            .iter()
            .all(|d| *d == Direction::Down));
        assert!(classify_sweeps(&values, &smoothed())
            .iter()
            .all(|d| *d == Direction::Down));
    }

    #[test]
    fn raw_labels_leave_first_sample_undefined() {
        let labels = sweep_labels(&[1.0, 2.0, 1.5, 1.5], &SweepParams::raw());
        assert_eq!(
            labels,
            vec![None, Some(Direction::Up), Some(Direction::Down), Some(Direction::Down)]
        );
    }

    #[test]
    fn triangle_sweep_switches_direction() {
        let mut values: Vec<f64> = (0..50).map(|i| 40.0 + 0.2 * i as f64).collect();
        values.extend((0..50).map(|i| 50.0 - 0.2 * i as f64));
        let labels = classify_sweeps(&values, &smoothed());
        assert_eq!(labels[10], Direction::Up);
        assert_eq!(labels[80], Direction::Down);
        let (up, down) = count_directions(&labels);
        assert_eq!(up + down, values.len());
        assert!(up > 40 && down > 40, "up {up}, down {down}");
    }

    #[test]
    fn small_steps_below_threshold_are_down() {
        let values: Vec<f64> = (0..30).map(|i| 40.0 + 0.01 * i as f64).collect();
        assert!(classify_sweeps(&values, &smoothed())
            .iter()
            .all(|d| *d == Direction::Down));
    }

    #[test]
    fn degenerate_inputs() {
        assert!(classify_sweeps(&[], &smoothed()).is_empty());
        assert_eq!(classify_sweeps(&[1.0], &SweepParams::raw()), vec![Direction::Down]);
    }
}
