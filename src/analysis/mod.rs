/// Numerical analyses on top of the data layer.
///
/// ```text
///   FilteredSeries / Table
///        │
///        ├──► sweep        diff → (rolling mean) → Up / Down labels
///        │       │
///        │       ▼
///        ├──► calibration  per-branch cubic (poly) + K-fold CV, predict
///        │
///        ├──► diagnostics  histogram, Q-Q, Shapiro-Wilk, Levene, KS
///        │
///        └──► threshold    first/last crossing, duration, std
///
///   frontend: firmware conversion chain (ADC → Rx) used by the generator
/// ```

pub mod calibration;
pub mod diagnostics;
pub mod error;
pub mod frontend;
pub mod poly;
pub mod signal;
pub mod sweep;
pub mod threshold;
