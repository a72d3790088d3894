use thiserror::Error;

/// Errors raised by the data layer (parsing and filtering).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("malformed timestamp '{input}': {reason}")]
    Timestamp { input: String, reason: String },

    #[error("line {line}: column {column} '{value}' is not a number")]
    NotANumber {
        line: usize,
        column: usize,
        value: String,
    },

    #[error("line {line}: expected a timestamp and at least one channel")]
    TooFewColumns { line: usize },

    #[error("invalid filter bounds [{lower}, {upper}]")]
    InvalidBounds { lower: f64, upper: f64 },

    #[error("channel index {0} is outside 1..=7")]
    UnknownChannel(usize),

    #[error("table has no column named '{0}'")]
    MissingColumn(String),
}
