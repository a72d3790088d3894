use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DataError;

/// Number of numeric channels the logger writes after the timestamp.
pub const CHANNEL_COUNT: usize = 7;

// ---------------------------------------------------------------------------
// Channel – one numeric column of a sensor log row
// ---------------------------------------------------------------------------

/// The numeric columns of a log row, in the order the firmware prints them.
///
/// Column 0 of a row is the timestamp, so `Voltage` is column 1 and
/// `Resistance` is column 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Averaged ADC voltage.
    Voltage,
    /// Amplified, low-pass filtered bridge voltage.
    VoltageDiff,
    /// Bridge resistance `Rx` in ohms.
    Resistance,
    /// Constant upper plot reference (`2`).
    UpperRef,
    /// Constant lower plot reference (`-2`).
    LowerRef,
    /// Lower resistance band latched on the first sample.
    RBottom,
    /// Upper resistance band latched on the first sample.
    RTop,
}

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Voltage,
        Channel::VoltageDiff,
        Channel::Resistance,
        Channel::UpperRef,
        Channel::LowerRef,
        Channel::RBottom,
        Channel::RTop,
    ];

    /// Column index in the raw row (1..=7).
    pub fn column(self) -> usize {
        self.slot() + 1
    }

    /// Position inside [`SensorSample::values`].
    pub fn slot(self) -> usize {
        match self {
            Channel::Voltage => 0,
            Channel::VoltageDiff => 1,
            Channel::Resistance => 2,
            Channel::UpperRef => 3,
            Channel::LowerRef => 4,
            Channel::RBottom => 5,
            Channel::RTop => 6,
        }
    }

    /// Look a channel up by its raw column index.
    pub fn from_column(column: usize) -> Result<Self, DataError> {
        if (1..=CHANNEL_COUNT).contains(&column) {
            Ok(Self::ALL[column - 1])
        } else {
            Err(DataError::UnknownChannel(column))
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Channel::Voltage => "Voltage (V)",
            Channel::VoltageDiff => "Voltage diff (V)",
            Channel::Resistance => "Resistance (Ohm)",
            Channel::UpperRef => "Upper ref",
            Channel::LowerRef => "Lower ref",
            Channel::RBottom => "R bottom (Ohm)",
            Channel::RTop => "R top (Ohm)",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [col {}]", self.label(), self.column())
    }
}

// ---------------------------------------------------------------------------
// SensorSample – one parsed log row
// ---------------------------------------------------------------------------

/// A single accepted row of a sensor log.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    /// 1-based line number in the source file.
    pub line: usize,
    /// Timestamp converted to seconds.
    pub time_s: f64,
    /// Channel readings; channels missing from the row are `NaN`.
    pub values: [f64; CHANNEL_COUNT],
}

impl SensorSample {
    pub fn get(&self, channel: Channel) -> f64 {
        self.values[channel.slot()]
    }
}

/// A row that failed to parse, kept for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRow {
    pub line: usize,
    pub reason: DataError,
}

/// Book-keeping of a log parse: nothing is dropped without a trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    pub accepted: usize,
    pub dropped: Vec<DroppedRow>,
    /// Accepted rows discarded by a `max_rows` limit.
    pub truncated: usize,
}

impl ParseReport {
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }
}

// ---------------------------------------------------------------------------
// SensorLog – the complete parsed log
// ---------------------------------------------------------------------------

/// All accepted rows of a log file plus the parse report.
#[derive(Debug, Clone, Default)]
pub struct SensorLog {
    pub samples: Vec<SensorSample>,
    pub report: ParseReport,
}

impl SensorLog {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Timestamps in seconds, index-aligned with `samples`.
    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time_s).collect()
    }

    /// One channel as a column vector.
    pub fn channel(&self, channel: Channel) -> Vec<f64> {
        self.samples.iter().map(|s| s.get(channel)).collect()
    }
}

// ---------------------------------------------------------------------------
// Table – a headed numeric CSV (calibration / diagnostics input)
// ---------------------------------------------------------------------------

/// Named numeric columns of equal length. Non-numeric cells are `NaN`.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Column names in file order.
    pub column_names: Vec<String>,
    columns: BTreeMap<String, Vec<f64>>,
    rows: usize,
}

impl Table {
    /// Build a table from `(name, values)` pairs. Columns are truncated to
    /// the shortest length.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Self {
        let rows = columns.iter().map(|(_, v)| v.len()).min().unwrap_or(0);
        let column_names = columns.iter().map(|(n, _)| n.clone()).collect();
        let columns = columns
            .into_iter()
            .map(|(name, mut values)| {
                values.truncate(rows);
                (name, values)
            })
            .collect();
        Table {
            column_names,
            columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Raw column including `NaN` cells.
    pub fn column(&self, name: &str) -> Result<&[f64], DataError> {
        self.columns
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))
    }

    /// Column with missing cells removed.
    pub fn column_dropna(&self, name: &str) -> Result<Vec<f64>, DataError> {
        Ok(finite(self.column(name)?))
    }

    /// Two columns restricted to the rows where both are present.
    pub fn paired(&self, a: &str, b: &str) -> Result<(Vec<f64>, Vec<f64>), DataError> {
        let xa = self.column(a)?;
        let xb = self.column(b)?;
        Ok(xa
            .iter()
            .zip(xb)
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| (*x, *y))
            .unzip())
    }

    /// Split a column at `len / 2` into two halves, each without missing cells.
    pub fn split_half(&self, name: &str) -> Result<(Vec<f64>, Vec<f64>), DataError> {
        let col = self.column(name)?;
        let mid = self.rows / 2;
        Ok((finite(&col[..mid]), finite(&col[mid..])))
    }
}

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_columns_follow_firmware_order() {
        assert_eq!(Channel::Resistance.column(), 3);
        assert_eq!(Channel::from_column(3).unwrap(), Channel::Resistance);
        assert_eq!(Channel::from_column(7).unwrap(), Channel::RTop);
        assert!(Channel::from_column(0).is_err());
        assert!(Channel::from_column(8).is_err());
    }

    #[test]
    fn table_pairs_skip_missing_cells() {
        let table = Table::from_columns(vec![
            ("R".into(), vec![1.0, f64::NAN, 3.0, 4.0]),
            ("Angle(rad)".into(), vec![0.1, 0.2, f64::NAN, 0.4]),
        ]);
        let (r, a) = table.paired("R", "Angle(rad)").unwrap();
        assert_eq!(r, vec![1.0, 4.0]);
        assert_eq!(a, vec![0.1, 0.4]);
    }

    #[test]
    fn split_half_uses_row_midpoint() {
        let table = Table::from_columns(vec![("R".into(), vec![1.0, 2.0, f64::NAN, 4.0, 5.0])]);
        let (first, second) = table.split_half("R").unwrap();
        assert_eq!(first, vec![1.0, 2.0]);
        assert_eq!(second, vec![4.0, 5.0]);
    }

    #[test]
    fn missing_column_is_reported() {
        let table = Table::default();
        assert_eq!(
            table.column("h").unwrap_err(),
            DataError::MissingColumn("h".into())
        );
    }
}
