//! Distribution diagnostics for calibration tables.
//!
//! Per column: histogram, normal Q-Q plot and a Shapiro-Wilk normality test.
//! Across the two halves of one column: Levene (Brown-Forsythe) for equal
//! variances and a two-sample Kolmogorov-Smirnov test for equal
//! distributions.
//!
//! All routines return `None` when the input is outside their domain
//! (too few points, non-finite values, zero spread).

use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal};

use super::signal::{mean, median, min_max};

pub const DEFAULT_BINS: usize = 20;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Equal-width histogram over `[min, max]`; the last bin is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        match self.edges.as_slice() {
            [first, second, ..] => second - first,
            _ => 0.0,
        }
    }

    /// `(centre, count)` per bin.
    pub fn bars(&self) -> impl Iterator<Item = (f64, usize)> + '_ {
        self.edges
            .windows(2)
            .zip(&self.counts)
            .map(|(w, c)| ((w[0] + w[1]) / 2.0, *c))
    }
}

/// Normal Q-Q points plus the least-squares reference line.
#[derive(Debug, Clone, PartialEq)]
pub struct QqPlot {
    pub theoretical: Vec<f64>,
    pub sample: Vec<f64>,
    pub slope: f64,
    pub intercept: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapiroWilkResult {
    pub w: f64,
    pub p_value: f64,
}

/// Result of an F-type test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestResult {
    pub statistic: f64,
    pub df: (f64, f64),
    pub p_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    /// Maximum distance between the empirical CDFs.
    pub statistic: f64,
    pub p_value: f64,
}

/// Everything computed for one column.
#[derive(Debug, Clone)]
pub struct ColumnDiagnostics {
    pub column: String,
    pub samples: usize,
    pub histogram: Option<Histogram>,
    pub qq: Option<QqPlot>,
    pub shapiro: Option<ShapiroWilkResult>,
}

impl ColumnDiagnostics {
    pub fn compute(column: &str, values: &[f64], bins: usize) -> Self {
        ColumnDiagnostics {
            column: column.to_string(),
            samples: values.len(),
            histogram: histogram(values, bins),
            qq: qq_plot(values),
            shapiro: shapiro_wilk(values),
        }
    }

    /// True when the Shapiro-Wilk p-value is outside its calibrated range.
    pub fn shapiro_is_approximate(&self) -> bool {
        self.shapiro.is_some() && self.samples > SHAPIRO_ACCURATE_MAX
    }

    pub fn verdict(&self, alpha: f64) -> Option<String> {
        let sw = self.shapiro?;
        Some(if sw.p_value > alpha {
            format!(
                "{} appears to be normally distributed (fail to reject H0).",
                self.column
            )
        } else {
            format!(
                "{} does not appear to be normally distributed (reject H0).",
                self.column
            )
        })
    }
}

/// First half against second half of one column.
#[derive(Debug, Clone)]
pub struct HalfSplitComparison {
    pub column: String,
    pub first_len: usize,
    pub second_len: usize,
    pub levene: Option<TestResult>,
    pub ks: Option<KsResult>,
}

impl HalfSplitComparison {
    pub fn compute(column: &str, first: &[f64], second: &[f64]) -> Self {
        HalfSplitComparison {
            column: column.to_string(),
            first_len: first.len(),
            second_len: second.len(),
            levene: levene_test(&[first, second]),
            ks: ks_two_sample(first, second),
        }
    }

    pub fn levene_verdict(&self, alpha: f64) -> Option<&'static str> {
        let r = self.levene?;
        Some(if r.p_value > alpha {
            "Variances appear to be equal across the groups (homogeneous samples)."
        } else {
            "Variances differ significantly across the groups (samples may come from different populations)."
        })
    }

    pub fn ks_verdict(&self, alpha: f64) -> Option<&'static str> {
        let r = self.ks?;
        Some(if r.p_value > alpha {
            "The two samples do not differ significantly (they likely come from the same distribution)."
        } else {
            "The two samples differ significantly (they may come from different populations)."
        })
    }
}

// ---------------------------------------------------------------------------
// Histogram and Q-Q
// ---------------------------------------------------------------------------

pub fn histogram(values: &[f64], bins: usize) -> Option<Histogram> {
    if bins == 0 {
        return None;
    }
    let (lo, hi) = min_max(values)?;
    // a constant column gets a unit-wide range around its value
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
    let width = (hi - lo) / bins as f64;

    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0usize; bins];
    for v in values.iter().filter(|v| v.is_finite()) {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Some(Histogram { edges, counts })
}

/// Sorted sample against standard normal quantiles at `(i + 0.5) / n`.
pub fn qq_plot(values: &[f64]) -> Option<QqPlot> {
    let mut sample: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let n = sample.len();
    if n < 2 {
        return None;
    }
    sample.sort_by(|a, b| a.total_cmp(b));

    let normal = Normal::standard();
    let theoretical: Vec<f64> = (0..n)
        .map(|i| normal.inverse_cdf((i as f64 + 0.5) / n as f64))
        .collect();

    let (slope, intercept) = least_squares_line(&theoretical, &sample)?;
    Some(QqPlot {
        theoretical,
        sample,
        slope,
        intercept,
    })
}

fn least_squares_line(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let mx = mean(x)?;
    let my = mean(y)?;
    let sxx: f64 = x.iter().map(|v| (v - mx).powi(2)).sum();
    if sxx <= 0.0 {
        return None;
    }
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let slope = sxy / sxx;
    Some((slope, my - slope * mx))
}

// ---------------------------------------------------------------------------
// Shapiro-Wilk (Royston 1995, AS R94)
// ---------------------------------------------------------------------------

const SW_C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.07119, 4.434685, -2.706056];
const SW_C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const SW_C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const SW_C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const SW_C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const SW_C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const SW_G: [f64; 2] = [-2.273, 0.459];

fn horner(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, ci| acc * x + ci)
}

/// Largest sample size for which the p-value approximation is calibrated.
pub const SHAPIRO_ACCURATE_MAX: usize = 5000;

/// Shapiro-Wilk normality test for at least 3 finite samples. Above
/// [`SHAPIRO_ACCURATE_MAX`] the statistic is still computed but the p-value
/// may be inaccurate.
pub fn shapiro_wilk(values: &[f64]) -> Option<ShapiroWilkResult> {
    let n = values.len();
    if n < 3 || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    if n > SHAPIRO_ACCURATE_MAX {
        log::warn!("Shapiro-Wilk p-value may be inaccurate for N = {n} > {SHAPIRO_ACCURATE_MAX}");
    }
    let mut x = values.to_vec();
    x.sort_by(|a, b| a.total_cmp(b));
    if x[n - 1] - x[0] < 1e-300 {
        return None;
    }

    let mean = x.iter().sum::<f64>() / n as f64;
    let ss: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();

    if n == 3 {
        let w = (std::f64::consts::FRAC_1_SQRT_2 * (x[2] - x[0])).powi(2) / ss;
        let w = w.clamp(0.75, 1.0);
        let p = 1.0 - (6.0 / std::f64::consts::PI) * w.sqrt().acos();
        return Some(ShapiroWilkResult {
            w,
            p_value: p.clamp(0.0, 1.0),
        });
    }

    let a = sw_coefficients(n)?;
    let numerator: f64 = a
        .iter()
        .enumerate()
        .map(|(i, ai)| ai * (x[n - 1 - i] - x[i]))
        .sum();
    let w = (numerator * numerator / ss).min(1.0);

    Some(ShapiroWilkResult {
        w,
        p_value: sw_p_value(w, n).clamp(0.0, 1.0),
    })
}

/// Half the coefficient vector (the rest is antisymmetric).
fn sw_coefficients(n: usize) -> Option<Vec<f64>> {
    let half = n / 2;
    let normal = Normal::standard();
    let nf = n as f64;

    // Blom scores for the lower half, negative
    let m: Vec<f64> = (0..half)
        .map(|i| normal.inverse_cdf((i as f64 + 1.0 - 0.375) / (nf + 0.25)))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / nf.sqrt();

    let mut a = vec![0.0; half];
    let a1 = horner(&SW_C1, rsn) - m[0] / ssumm2;
    let corrected = if n > 5 { 2 } else { 1 };

    let (fac_sq, one_minus) = if corrected == 2 {
        let a2 = horner(&SW_C2, rsn) - m[1] / ssumm2;
        a[1] = a2;
        (
            summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1],
            1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2,
        )
    } else {
        (summ2 - 2.0 * m[0] * m[0], 1.0 - 2.0 * a1 * a1)
    };
    if fac_sq <= 0.0 || one_minus <= 0.0 {
        return None;
    }
    let fac = (fac_sq / one_minus).sqrt();
    a[0] = a1;
    for i in corrected..half {
        a[i] = -m[i] / fac;
    }
    Some(a)
}

fn sw_p_value(w: f64, n: usize) -> f64 {
    let nf = n as f64;
    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return 1.0;
    }
    let y = w1.ln();
    let normal = Normal::standard();

    let z = if n <= 11 {
        let gamma = horner(&SW_G, nf);
        if y >= gamma {
            return 0.0;
        }
        let y2 = -(gamma - y).ln();
        (y2 - horner(&SW_C3, nf)) / horner(&SW_C4, nf).exp()
    } else {
        let ln_n = nf.ln();
        (y - horner(&SW_C5, ln_n)) / horner(&SW_C6, ln_n).exp()
    };
    1.0 - normal.cdf(z)
}

// ---------------------------------------------------------------------------
// Levene / Brown-Forsythe
// ---------------------------------------------------------------------------

/// One-way ANOVA F test.
fn one_way_anova(groups: &[Vec<f64>]) -> Option<TestResult> {
    let k = groups.len();
    let total: usize = groups.iter().map(Vec::len).sum();
    if k < 2 || total <= k {
        return None;
    }
    let all: Vec<f64> = groups.iter().flatten().copied().collect();
    let grand = mean(&all)?;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for g in groups {
        let m = mean(g)?;
        ss_between += g.len() as f64 * (m - grand).powi(2);
        ss_within += g.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    }
    if ss_within <= 0.0 {
        return None;
    }
    let df1 = (k - 1) as f64;
    let df2 = (total - k) as f64;
    let f = (ss_between / df1) / (ss_within / df2);
    let dist = FisherSnedecor::new(df1, df2).ok()?;
    Some(TestResult {
        statistic: f,
        df: (df1, df2),
        p_value: (1.0 - dist.cdf(f)).clamp(0.0, 1.0),
    })
}

/// Levene's test with median centring (Brown-Forsythe).
pub fn levene_test(groups: &[&[f64]]) -> Option<TestResult> {
    if groups.len() < 2
        || groups
            .iter()
            .any(|g| g.len() < 2 || g.iter().any(|v| !v.is_finite()))
    {
        return None;
    }
    let deviations: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| {
            let med = median(g).unwrap_or(0.0);
            g.iter().map(|v| (v - med).abs()).collect()
        })
        .collect();
    one_way_anova(&deviations)
}

// ---------------------------------------------------------------------------
// Two-sample Kolmogorov-Smirnov
// ---------------------------------------------------------------------------

/// Two-sided two-sample KS test with the asymptotic p-value.
pub fn ks_two_sample(a: &[f64], b: &[f64]) -> Option<KsResult> {
    if a.is_empty() || b.is_empty() || a.iter().chain(b).any(|v| !v.is_finite()) {
        return None;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(|x, y| x.total_cmp(y));
    b.sort_by(|x, y| x.total_cmp(y));
    let (n1, n2) = (a.len(), b.len());

    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;
    while i < n1 && j < n2 {
        let v = a[i].min(b[j]);
        while i < n1 && a[i] <= v {
            i += 1;
        }
        while j < n2 && b[j] <= v {
            j += 1;
        }
        d = d.max((i as f64 / n1 as f64 - j as f64 / n2 as f64).abs());
    }

    let en = ((n1 * n2) as f64 / (n1 + n2) as f64).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * d;
    Some(KsResult {
        statistic: d,
        p_value: kolmogorov_q(lambda),
    })
}

/// Complementary Kolmogorov distribution `Q(λ) = 2 Σ (-1)^(k-1) e^(-2k²λ²)`.
fn kolmogorov_q(lambda: f64) -> f64 {
    if lambda < 1e-3 {
        return 1.0;
    }
    let mut sum = 0.0;
    let mut sign = 1.0;
    let mut previous: f64 = 0.0;
    for k in 1..=100 {
        let kf = k as f64;
        let term = sign * 2.0 * (-2.0 * kf * kf * lambda * lambda).exp();
        sum += term;
        if term.abs() <= 1e-3 * previous || term.abs() <= 1e-8 * sum.abs() {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        previous = term.abs();
    }
    // no convergence means λ is tiny
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Exp, Normal as Gaussian};

    fn gaussian(n: usize, mean: f64, sd: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let dist = Gaussian::new(mean, sd).unwrap();
        (0..n).map(|_| dist.sample(&mut rng)).collect()
    }

    #[test]
    fn histogram_counts_everything_once() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let h = histogram(&values, 20).unwrap();
        assert_eq!(h.edges.len(), 21);
        assert_eq!(h.counts.iter().sum::<usize>(), 100);
        assert!(h.counts.iter().all(|c| *c == 5), "{:?}", h.counts);
        assert!((h.bin_width() - 99.0 / 20.0).abs() < 1e-12);
    }

    #[test]
    fn histogram_of_constant_column() {
        let h = histogram(&[3.0; 10], 4).unwrap();
        assert_eq!(h.counts.iter().sum::<usize>(), 10);
        assert!(histogram(&[], 4).is_none());
    }

    #[test]
    fn qq_line_of_normal_sample_matches_moments() {
        let values = gaussian(500, 10.0, 2.0, 3);
        let qq = qq_plot(&values).unwrap();
        assert_eq!(qq.theoretical.len(), 500);
        assert!((qq.intercept - 10.0).abs() < 0.3, "{}", qq.intercept);
        assert!((qq.slope - 2.0).abs() < 0.3, "{}", qq.slope);
    }

    #[test]
    fn shapiro_accepts_normal_data() {
        let values = gaussian(200, 0.0, 1.0, 11);
        let r = shapiro_wilk(&values).unwrap();
        assert!(r.w > 0.97, "W = {}", r.w);
        assert!(r.p_value > 0.01, "p = {}", r.p_value);
    }

    #[test]
    fn shapiro_rejects_skewed_data() {
        let mut rng = StdRng::seed_from_u64(5);
        let dist = Exp::new(1.0).unwrap();
        let values: Vec<f64> = (0..200).map(|_| dist.sample(&mut rng)).collect();
        let r = shapiro_wilk(&values).unwrap();
        assert!(r.p_value < 0.01, "p = {}", r.p_value);
    }

    #[test]
    fn shapiro_domain() {
        assert!(shapiro_wilk(&[1.0, 2.0]).is_none());
        assert!(shapiro_wilk(&[1.0, 1.0, 1.0, 1.0]).is_none());
        let r = shapiro_wilk(&[1.0, 2.0, 3.0]).unwrap();
        assert!((r.w - 1.0).abs() < 1e-12);
    }

    #[test]
    fn shapiro_runs_past_the_calibrated_range() {
        let values = gaussian(6000, 45.0, 0.5, 17);
        let r = shapiro_wilk(&values).unwrap();
        assert!(r.w > 0.99, "W = {}", r.w);
        assert!((0.0..=1.0).contains(&r.p_value), "p = {}", r.p_value);

        let col = ColumnDiagnostics::compute("R", &values, DEFAULT_BINS);
        assert!(col.shapiro_is_approximate());
        assert!(!ColumnDiagnostics::compute("R", &values[..200], DEFAULT_BINS).shapiro_is_approximate());
    }

    #[test]
    fn levene_detects_unequal_spread() {
        let narrow = gaussian(150, 0.0, 1.0, 1);
        let wide = gaussian(150, 0.0, 4.0, 2);
        let r = levene_test(&[&narrow, &wide]).unwrap();
        assert!(r.p_value < 0.01, "p = {}", r.p_value);
        assert_eq!(r.df, (1.0, 298.0));

        let same = gaussian(150, 5.0, 1.0, 9);
        let r = levene_test(&[&narrow, &same]).unwrap();
        assert!(r.p_value > 0.01, "p = {}", r.p_value);
    }

    #[test]
    fn ks_detects_shifted_distribution() {
        let a = gaussian(200, 0.0, 1.0, 21);
        let b = gaussian(200, 1.5, 1.0, 22);
        let r = ks_two_sample(&a, &b).unwrap();
        assert!(r.statistic > 0.4, "D = {}", r.statistic);
        assert!(r.p_value < 1e-6, "p = {}", r.p_value);

        let c = gaussian(200, 0.0, 1.0, 23);
        let r = ks_two_sample(&a, &c).unwrap();
        assert!(r.p_value > 0.01, "p = {}", r.p_value);
    }

    #[test]
    fn ks_identical_samples() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let r = ks_two_sample(&a, &a).unwrap();
        assert_eq!(r.statistic, 0.0);
        assert_eq!(r.p_value, 1.0);
    }

    #[test]
    fn verdicts_follow_alpha() {
        let values = gaussian(100, 0.0, 1.0, 4);
        let diag = ColumnDiagnostics::compute("R", &values, DEFAULT_BINS);
        let verdict = diag.verdict(0.05).unwrap();
        assert!(verdict.starts_with("R "));
        let split = HalfSplitComparison::compute("R", &values[..50], &values[50..]);
        assert_eq!(split.first_len, 50);
        assert!(split.ks_verdict(0.0).unwrap().contains("do not differ"));
        assert!(split.levene_verdict(1.0).unwrap().contains("differ significantly"));
    }

    proptest! {
        #[test]
        fn p_values_are_probabilities(
            a in proptest::collection::vec(-1e3_f64..1e3, 3..=60),
            b in proptest::collection::vec(-1e3_f64..1e3, 3..=60),
        ) {
            if let Some(r) = shapiro_wilk(&a) {
                prop_assert!(r.w > 0.0 && r.w <= 1.0, "W = {}", r.w);
                prop_assert!((0.0..=1.0).contains(&r.p_value));
            }
            if let Some(r) = levene_test(&[&a, &b]) {
                prop_assert!((0.0..=1.0).contains(&r.p_value));
            }
            let ks = ks_two_sample(&a, &b).unwrap();
            prop_assert!((0.0..=1.0).contains(&ks.statistic));
            prop_assert!((0.0..=1.0).contains(&ks.p_value));
        }
    }
}
