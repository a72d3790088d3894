use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::error::AnalysisError;

/// A real polynomial, coefficients stored lowest order first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    pub coeffs: Vec<f64>,
}

impl Polynomial {
    pub fn new(coeffs: Vec<f64>) -> Self {
        Polynomial { coeffs }
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    /// Least-squares fit of the given degree.
    ///
    /// The Vandermonde columns are scaled to unit norm before the SVD solve
    /// so raw resistance values (tens of ohms, cubed) stay well conditioned.
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Result<Self, AnalysisError> {
        if x.len() != y.len() {
            return Err(AnalysisError::LengthMismatch("polynomial fit"));
        }
        let n = x.len();
        let terms = degree + 1;
        if n < terms {
            return Err(AnalysisError::InsufficientData {
                what: "polynomial fit",
                needed: terms,
                got: n,
            });
        }

        let mut a = DMatrix::from_fn(n, terms, |r, c| x[r].powi(c as i32));
        let mut scale = vec![1.0; terms];
        for (c, s) in scale.iter_mut().enumerate() {
            let norm = a.column(c).norm();
            if norm > 0.0 {
                *s = norm;
                a.column_mut(c).unscale_mut(norm);
            }
        }
        let b = DVector::from_column_slice(y);

        let solution = a
            .svd(true, true)
            .solve(&b, 1e-12)
            .map_err(|e| AnalysisError::Solve(e.to_string()))?;

        let coeffs = solution
            .iter()
            .zip(&scale)
            .map(|(c, s)| c / s)
            .collect();
        Ok(Polynomial { coeffs })
    }

    /// Horner evaluation.
    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }

    pub fn eval_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}

impl fmt::Display for Polynomial {
    /// Highest order first, e.g. `0.0312 x^3 - 0.2000 x^2 + 1.0000 x + 0.5000`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coeffs.is_empty() {
            return write!(f, "0");
        }
        for (i, (power, c)) in self.coeffs.iter().enumerate().rev().enumerate() {
            let sign = if *c < 0.0 { "-" } else { "+" };
            if i == 0 {
                if *c < 0.0 {
                    write!(f, "-")?;
                }
            } else {
                write!(f, " {sign} ")?;
            }
            match power {
                0 => write!(f, "{:.4}", c.abs())?,
                1 => write!(f, "{:.4} x", c.abs())?,
                p => write!(f, "{:.4} x^{p}", c.abs())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::signal::linspace;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn exact_cubic_is_recovered() {
        let truth = Polynomial::new(vec![0.5, -1.2, 0.3, 0.05]);
        let x = linspace(-3.0, 3.0, 50);
        let y = truth.eval_many(&x);
        let fit = Polynomial::fit(&x, &y, 3).unwrap();
        for (a, b) in fit.coeffs.iter().zip(&truth.coeffs) {
            assert!((a - b).abs() < 1e-8, "{fit:?}");
        }
    }

    #[test]
    fn noisy_cubic_is_recovered_within_tolerance() {
        let truth = Polynomial::new(vec![0.5, -1.2, 0.3, 0.05]);
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 0.01).unwrap();
        let x = linspace(-3.0, 3.0, 400);
        let y: Vec<f64> = x
            .iter()
            .map(|&xi| truth.eval(xi) + noise.sample(&mut rng))
            .collect();
        let fit = Polynomial::fit(&x, &y, 3).unwrap();
        for (a, b) in fit.coeffs.iter().zip(&truth.coeffs) {
            assert!((a - b).abs() < 0.01, "{fit:?}");
        }
    }

    #[test]
    fn offset_resistance_range_stays_conditioned() {
        // angle as a cubic of resistance around 45 ohm
        let x = linspace(42.0, 52.0, 200);
        let y: Vec<f64> = x
            .iter()
            .map(|r| {
                let d = r - 47.0;
                0.1 + 0.2 * d - 0.01 * d * d + 0.001 * d * d * d
            })
            .collect();
        let fit = Polynomial::fit(&x, &y, 3).unwrap();
        for (xi, yi) in x.iter().zip(&y) {
            assert!((fit.eval(*xi) - yi).abs() < 1e-6);
        }
    }

    #[test]
    fn too_few_points_is_an_error() {
        let err = Polynomial::fit(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 3).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData { needed: 4, got: 3, .. }
        ));
    }

    #[test]
    fn display_lists_highest_power_first() {
        let p = Polynomial::new(vec![0.5, -1.0, 0.0, 2.0]);
        assert_eq!(
            p.to_string(),
            "2.0000 x^3 + 0.0000 x^2 - 1.0000 x + 0.5000"
        );
    }
}
