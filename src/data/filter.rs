use serde::{Deserialize, Serialize};

use super::error::DataError;
use super::model::{Channel, SensorLog, SensorSample};

// ---------------------------------------------------------------------------
// Range filter: keep rows whose channel lies inside inclusive bounds
// ---------------------------------------------------------------------------

/// Inclusive value window on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub channel: Channel,
    pub lower: f64,
    pub upper: f64,
}

impl RangeFilter {
    /// Build a filter, rejecting non-finite or inverted bounds.
    pub fn new(channel: Channel, lower: f64, upper: f64) -> Result<Self, DataError> {
        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(DataError::InvalidBounds { lower, upper });
        }
        Ok(RangeFilter {
            channel,
            lower,
            upper,
        })
    }

    /// `NaN` never passes.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Samples that passed a [`RangeFilter`], with timestamps kept index-aligned.
#[derive(Debug, Clone, Default)]
pub struct FilteredSeries {
    pub times: Vec<f64>,
    pub samples: Vec<SensorSample>,
}

impl FilteredSeries {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn channel(&self, channel: Channel) -> Vec<f64> {
        self.samples.iter().map(|s| s.get(channel)).collect()
    }

    /// `(time, value)` pairs for plotting.
    pub fn points(&self, channel: Channel) -> Vec<[f64; 2]> {
        self.times
            .iter()
            .zip(&self.samples)
            .map(|(&t, s)| [t, s.get(channel)])
            .collect()
    }

    /// First and last timestamp.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        Some((*self.times.first()?, *self.times.last()?))
    }
}

/// Apply `filter` to every sample of `log`.
pub fn filter_by_range(log: &SensorLog, filter: &RangeFilter) -> FilteredSeries {
    let mut out = FilteredSeries::default();
    for sample in &log.samples {
        if filter.contains(sample.get(filter.channel)) {
            out.times.push(sample.time_s);
            out.samples.push(sample.clone());
        }
    }
    log::debug!(
        "Range filter {} in [{}, {}] kept {}/{} rows",
        filter.channel,
        filter.lower,
        filter.upper,
        out.len(),
        log.len()
    );
    out
}
