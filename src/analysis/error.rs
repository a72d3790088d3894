use thiserror::Error;

/// Errors raised by the numerical analyses.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("{what}: need at least {needed} samples, got {got}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("{0}: inputs have different lengths")]
    LengthMismatch(&'static str),

    #[error("interquartile range is zero; cannot normalize")]
    DegenerateScale,

    #[error("least squares solve failed: {0}")]
    Solve(String),
}
