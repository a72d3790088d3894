//! Series helpers shared by the analyses: differences, rolling means,
//! detrending, robust scaling, and summary statistics.

use super::error::AnalysisError;

/// Successive differences; the first element has no predecessor.
pub fn diff(values: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(values.windows(2).map(|w| Some(w[1] - w[0])));
    out
}

/// Centered rolling mean with a full-window requirement.
///
/// Position `i` averages `[i - window/2, i + (window-1)/2]`. The result is
/// `None` when the window leaves the series or covers an undefined value.
pub fn rolling_mean_centered(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let n = values.len();
    if window == 0 {
        return vec![None; n];
    }
    let back = window / 2;
    let ahead = (window - 1) / 2;

    (0..n)
        .map(|i| {
            if i < back || i + ahead >= n {
                return None;
            }
            let slice = &values[i - back..=i + ahead];
            let mut sum = 0.0;
            for v in slice {
                sum += (*v)?;
            }
            Some(sum / window as f64)
        })
        .collect()
}

/// Moving average with zero padding that keeps the input length. Output `i`
/// sums the window ending at `i + (window - 1) / 2`; samples past either end
/// count as zero.
pub fn moving_average_same(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if window <= 1 || n == 0 {
        return values.to_vec();
    }
    let lead = (window - 1) / 2;
    (0..n)
        .map(|i| {
            let hi = i + lead;
            let lo = hi.saturating_sub(window - 1);
            let sum: f64 = values[lo..=hi.min(n - 1)].iter().sum();
            sum / window as f64
        })
        .collect()
}

/// Remove the least-squares line fitted against the sample index.
pub fn detrend_linear(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = mean(values).unwrap_or(0.0);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    values
        .iter()
        .enumerate()
        .map(|(i, &y)| y - (y_mean + slope * (i as f64 - x_mean)))
        .collect()
}

/// Percentile with linear interpolation between closest ranks, `q` in 0..=100.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// `(x - median) / IQR`.
pub fn robust_normalize(values: &[f64]) -> Result<Vec<f64>, AnalysisError> {
    let (Some(med), Some(q1), Some(q3)) = (
        median(values),
        percentile(values, 25.0),
        percentile(values, 75.0),
    ) else {
        return Err(AnalysisError::InsufficientData {
            what: "robust normalization",
            needed: 1,
            got: 0,
        });
    };
    let iqr = q3 - q1;
    if iqr.abs() < f64::EPSILON {
        return Err(AnalysisError::DegenerateScale);
    }
    Ok(values.iter().map(|v| (v - med) / iqr).collect())
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Mean squared error of paired slices.
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return None;
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Some(sum / actual.len() as f64)
}

/// `n` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Min and max of the finite values.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn diff_leaves_first_undefined() {
        assert_eq!(diff(&[1.0, 3.0, 2.0]), vec![None, Some(2.0), Some(-1.0)]);
        assert!(diff(&[]).is_empty());
    }

    #[test]
    fn rolling_mean_even_window_alignment() {
        let values: Vec<Option<f64>> = (0..6).map(|i| Some(i as f64)).collect();
        // window 4 at i covers [i-2, i+1]
        let out = rolling_mean_centered(&values, 4);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(1.5));
        assert_eq!(out[4], Some(3.5));
        assert_eq!(out[5], None);
    }

    #[test]
    fn rolling_mean_propagates_undefined() {
        let values = vec![None, Some(1.0), Some(2.0), Some(3.0)];
        let out = rolling_mean_centered(&values, 3);
        assert_eq!(out, vec![None, None, Some(2.0), None]);
    }

    #[test]
    fn moving_average_same_matches_convolution() {
        let out = moving_average_same(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        let expected = [1.0, 2.0, 3.0, 4.0, 3.0];
        for (o, e) in out.iter().zip(expected) {
            assert!(close(*o, e), "{out:?}");
        }
        // even window leans backwards
        let out = moving_average_same(&[4.0, 4.0, 4.0, 4.0], 2);
        assert_eq!(out, vec![2.0, 4.0, 4.0, 4.0]);
    }

    #[test]
    fn detrend_removes_a_line() {
        let values: Vec<f64> = (0..10).map(|i| 3.0 + 0.5 * i as f64).collect();
        assert!(detrend_linear(&values).iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn percentiles_interpolate_linearly() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!(close(percentile(&v, 25.0).unwrap(), 1.75));
        assert!(close(median(&v).unwrap(), 2.5));
        assert!(close(percentile(&v, 75.0).unwrap(), 3.25));
    }

    #[test]
    fn robust_normalize_centres_on_median() {
        let out = robust_normalize(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        // median 3, IQR 2
        assert_eq!(out, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(
            robust_normalize(&[2.0, 2.0, 2.0]).unwrap_err(),
            AnalysisError::DegenerateScale
        );
    }

    #[test]
    fn population_std() {
        assert!(close(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap(), 2.0));
        assert!(std_dev(&[]).is_none());
    }

    #[test]
    fn linspace_includes_endpoints() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }
}
