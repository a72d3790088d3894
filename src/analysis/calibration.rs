//! Dual-branch angle calibration.
//!
//! A flex sensor shows hysteresis: the resistance at a given bend angle
//! depends on whether the bend is increasing or decreasing. Samples are
//! therefore split by sweep direction and each branch gets its own
//! polynomial mapping the (normalized) resistance to an angle. At inference
//! time every sample is evaluated with the branch matching its own label.

use std::path::Path;

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::error::AnalysisError;
use super::poly::Polynomial;
use super::signal::{detrend_linear, mean_squared_error, min_max, robust_normalize};
use super::sweep::{Direction, SweepParams, classify_sweeps, sweep_labels};

// ---------------------------------------------------------------------------
// Feature transform
// ---------------------------------------------------------------------------

/// What the polynomials take as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// `(R - median) / IQR`.
    Normalized,
    /// Normalized, then with the linear trend over the sample index removed.
    #[default]
    Detrended,
}

impl Feature {
    /// Transform a resistance series. Scale statistics come from the series
    /// itself, so training and test data are each normalized on their own.
    pub fn apply(self, resistance: &[f64]) -> Result<Vec<f64>, AnalysisError> {
        let normalized = robust_normalize(resistance)?;
        Ok(match self {
            Feature::Normalized => normalized,
            Feature::Detrended => detrend_linear(&normalized),
        })
    }
}

// ---------------------------------------------------------------------------
// Parameters and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationParams {
    pub degree: usize,
    pub feature: Feature,
    /// Labelling of the training table.
    pub training: SweepParams,
    pub folds: usize,
    pub seed: u64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        CalibrationParams {
            degree: 3,
            feature: Feature::Detrended,
            training: SweepParams::raw(),
            folds: 5,
            seed: 42,
        }
    }
}

/// One fitted sweep branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchFit {
    pub poly: Polynomial,
    pub samples: usize,
    /// Mean K-fold mean squared error, when the branch had enough samples.
    pub cv_mse: Option<f64>,
    /// Feature range seen during training.
    pub feature_range: (f64, f64),
}

/// Labelled training data, kept for plotting.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub feature: Vec<f64>,
    pub angle: Vec<f64>,
    pub directions: Vec<Direction>,
}

impl TrainingSet {
    /// `(feature, angle)` points of one branch.
    pub fn branch_points(&self, direction: Direction) -> Vec<[f64; 2]> {
        self.feature
            .iter()
            .zip(&self.angle)
            .zip(&self.directions)
            .filter(|(_, d)| **d == direction)
            .map(|((x, y), _)| [*x, *y])
            .collect()
    }
}

/// Angle predictions for a resistance series.
#[derive(Debug, Clone, Default)]
pub struct Prediction {
    pub feature: Vec<f64>,
    pub directions: Vec<Direction>,
    pub angles: Vec<f64>,
}

/// The pair of fitted branch polynomials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepCalibration {
    pub feature: Feature,
    pub degree: usize,
    pub up: BranchFit,
    pub down: BranchFit,
}

impl SweepCalibration {
    /// Fit both branches from paired resistance / angle samples.
    ///
    /// The first sample has no predecessor and therefore no direction; it is
    /// left out of training.
    pub fn fit(
        resistance: &[f64],
        angle: &[f64],
        params: &CalibrationParams,
    ) -> Result<(Self, TrainingSet), AnalysisError> {
        if resistance.len() != angle.len() {
            return Err(AnalysisError::LengthMismatch("calibration"));
        }
        let feature = params.feature.apply(resistance)?;
        let labels = sweep_labels(resistance, &params.training);

        let mut training = TrainingSet::default();
        for ((x, y), label) in feature.iter().zip(angle).zip(&labels) {
            if let Some(d) = label {
                training.feature.push(*x);
                training.angle.push(*y);
                training.directions.push(*d);
            }
        }

        let up = fit_branch(&training, Direction::Up, params)?;
        let down = fit_branch(&training, Direction::Down, params)?;
        log::info!(
            "Calibrated {} up / {} down samples (degree {}, {:?} feature)",
            up.samples,
            down.samples,
            params.degree,
            params.feature
        );

        Ok((
            SweepCalibration {
                feature: params.feature,
                degree: params.degree,
                up,
                down,
            },
            training,
        ))
    }

    pub fn branch(&self, direction: Direction) -> &BranchFit {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }

    /// Predict angles: label each sample, then evaluate its own branch.
    pub fn predict(
        &self,
        resistance: &[f64],
        inference: &SweepParams,
    ) -> Result<Prediction, AnalysisError> {
        let feature = self.feature.apply(resistance)?;
        let directions = classify_sweeps(resistance, inference);
        let angles = feature
            .iter()
            .zip(&directions)
            .map(|(x, d)| self.branch(*d).poly.eval(*x))
            .collect();
        Ok(Prediction {
            feature,
            directions,
            angles,
        })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing calibration")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing calibration {}", path.display()))?;
        log::info!("Saved calibration to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading calibration {}", path.display()))?;
        let cal = serde_json::from_str(&text)
            .with_context(|| format!("parsing calibration {}", path.display()))?;
        log::info!("Loaded calibration from {}", path.display());
        Ok(cal)
    }
}

fn fit_branch(
    training: &TrainingSet,
    direction: Direction,
    params: &CalibrationParams,
) -> Result<BranchFit, AnalysisError> {
    let points = training.branch_points(direction);
    let (x, y): (Vec<f64>, Vec<f64>) = points.iter().map(|p| (p[0], p[1])).unzip();

    let poly = Polynomial::fit(&x, &y, params.degree).map_err(|e| match e {
        AnalysisError::InsufficientData { needed, got, .. } => AnalysisError::InsufficientData {
            what: match direction {
                Direction::Up => "up-sweep branch",
                Direction::Down => "down-sweep branch",
            },
            needed,
            got,
        },
        other => other,
    })?;

    let cv_mse = match cross_validate(&x, &y, params.degree, params.folds, params.seed) {
        Ok(mse) => Some(mse),
        Err(e) => {
            log::warn!("Skipping {direction} cross-validation: {e}");
            None
        }
    };

    Ok(BranchFit {
        poly,
        samples: x.len(),
        cv_mse,
        feature_range: min_max(&x).unwrap_or((0.0, 0.0)),
    })
}

// ---------------------------------------------------------------------------
// K-fold cross-validation
// ---------------------------------------------------------------------------

/// Shuffled K-fold split of `0..n`; the first `n % k` folds get one extra index.
pub fn kfold_indices(n: usize, folds: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let base = n / folds;
    let extra = n % folds;
    let mut out = Vec::with_capacity(folds);
    let mut start = 0;
    for k in 0..folds {
        let size = base + usize::from(k < extra);
        out.push(indices[start..start + size].to_vec());
        start += size;
    }
    out
}

/// Mean over folds of the held-out mean squared error of a polynomial fit.
pub fn cross_validate(
    x: &[f64],
    y: &[f64],
    degree: usize,
    folds: usize,
    seed: u64,
) -> Result<f64, AnalysisError> {
    if x.len() != y.len() {
        return Err(AnalysisError::LengthMismatch("cross-validation"));
    }
    let n = x.len();
    // every training split must still determine the polynomial
    let needed = (degree + 1 + n.div_ceil(folds.max(1))).max(folds);
    if folds < 2 || n < needed {
        return Err(AnalysisError::InsufficientData {
            what: "cross-validation",
            needed: needed.max(2),
            got: n,
        });
    }

    let splits = kfold_indices(n, folds, seed);
    let mut scores = Vec::with_capacity(folds);
    for test in &splits {
        let mut in_test = vec![false; n];
        for &i in test {
            in_test[i] = true;
        }
        let (train_x, train_y): (Vec<f64>, Vec<f64>) = (0..n)
            .filter(|i| !in_test[*i])
            .map(|i| (x[i], y[i]))
            .unzip();
        let model = Polynomial::fit(&train_x, &train_y, degree)?;

        let actual: Vec<f64> = test.iter().map(|&i| y[i]).collect();
        let predicted: Vec<f64> = test.iter().map(|&i| model.eval(x[i])).collect();
        if let Some(mse) = mean_squared_error(&actual, &predicted) {
            scores.push(mse);
        }
    }
    Ok(scores.iter().sum::<f64>() / scores.len() as f64)
}
