use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result, bail};

use super::error::DataError;
use super::model::{CHANNEL_COUNT, DroppedRow, ParseReport, SensorLog, SensorSample, Table};
use super::timestamp::parse_timestamp;

// ---------------------------------------------------------------------------
// Sensor log loader
// ---------------------------------------------------------------------------

/// Load a logger text file (`HH:MM:SS:ms,<ch1>,...,<ch7>` per line).
///
/// `max_rows` keeps only the first N accepted rows.
pub fn load_sensor_log(path: &Path, max_rows: Option<usize>) -> Result<SensorLog> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening sensor log {}", path.display()))?;
    let log = parse_sensor_log(BufReader::new(file), max_rows)
        .with_context(|| format!("reading sensor log {}", path.display()))?;

    log::info!(
        "Loaded {} rows from {} ({} dropped, {} truncated)",
        log.len(),
        path.display(),
        log.report.dropped_count(),
        log.report.truncated
    );
    Ok(log)
}

/// Parse a sensor log from any reader. Rows that do not parse are dropped
/// and recorded in [`ParseReport::dropped`].
pub fn parse_sensor_log<R: BufRead>(reader: R, max_rows: Option<usize>) -> Result<SensorLog> {
    let mut samples = Vec::new();
    let mut report = ParseReport::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }

        match parse_row(&line, line_no) {
            Ok(sample) => {
                if max_rows.is_some_and(|max| samples.len() >= max) {
                    report.truncated += 1;
                } else {
                    samples.push(sample);
                }
            }
            Err(reason) => {
                log::warn!("Dropping line {line_no}: {reason}");
                report.dropped.push(DroppedRow {
                    line: line_no,
                    reason,
                });
            }
        }
    }

    report.accepted = samples.len();
    Ok(SensorLog { samples, report })
}

fn parse_row(line: &str, line_no: usize) -> Result<SensorSample, DataError> {
    let cells: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if cells.len() < 2 {
        return Err(DataError::TooFewColumns { line: line_no });
    }

    let time_s = parse_timestamp(cells[0])?;

    let mut values = [f64::NAN; CHANNEL_COUNT];
    for (column, cell) in cells.iter().enumerate().skip(1).take(CHANNEL_COUNT) {
        values[column - 1] = cell.parse::<f64>().map_err(|_| DataError::NotANumber {
            line: line_no,
            column,
            value: cell.to_string(),
        })?;
    }

    Ok(SensorSample {
        line: line_no,
        time_s,
        values,
    })
}

// ---------------------------------------------------------------------------
// Table (CSV) loader
// ---------------------------------------------------------------------------

/// Load a headed CSV of numeric columns, e.g. `h,Angle(rad),R`.
pub fn load_table(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening CSV {}", path.display()))?;
    let table = parse_table(file).with_context(|| format!("reading CSV {}", path.display()))?;
    log::info!(
        "Loaded table {} with {} rows and columns {:?}",
        path.display(),
        table.len(),
        table.column_names
    );
    Ok(table)
}

/// Parse a headed CSV. Empty or non-numeric cells become `NaN`.
pub fn parse_table<R: Read>(reader: R) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.is_empty() {
        bail!("CSV has no header row");
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col_idx, column) in columns.iter_mut().enumerate() {
            let cell = record.get(col_idx).unwrap_or("");
            column.push(cell.parse::<f64>().unwrap_or(f64::NAN));
        }
    }

    Ok(Table::from_columns(headers.into_iter().zip(columns).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Channel;

    const LOG: &str = "\
Connection confirmed and started reading vals
00:00:01:000, 1.234567, 0.010000,45.10,2,-2,40,50
00:00:01:010, 1.234560, 0.011000,45.20,2,-2,40,50

00:00:01:020, 1.234550, bad,45.30,2,-2,40,50
00:00:01:030, 1.234540, 0.012000,45.40,2,-2,40,50
";

    #[test]
    fn accepts_valid_rows_and_reports_the_rest() {
        let log = parse_sensor_log(LOG.as_bytes(), None).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.report.accepted, 3);
        assert_eq!(log.report.dropped_count(), 2);
        assert_eq!(log.report.dropped[0].line, 1);
        assert!(matches!(
            log.report.dropped[1].reason,
            DataError::NotANumber { line: 5, column: 2, .. }
        ));
        assert_eq!(log.samples[2].line, 6);
        assert!((log.samples[1].get(Channel::Resistance) - 45.2).abs() < 1e-12);
        assert!((log.samples[0].time_s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn max_rows_truncates_accepted_rows() {
        let log = parse_sensor_log(LOG.as_bytes(), Some(2)).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.report.truncated, 1);
    }

    #[test]
    fn short_rows_leave_missing_channels_nan() {
        let log = parse_sensor_log("00:00:00:001,1.0,2.0,3.0\n".as_bytes(), None).unwrap();
        let sample = &log.samples[0];
        assert_eq!(sample.get(Channel::Resistance), 3.0);
        assert!(sample.get(Channel::RTop).is_nan());
    }

    #[test]
    fn out_of_range_timestamp_drops_the_row() {
        let text = "99999999999999999:00:00:000,1,2,45,2,-2,40,50\n00:00:00:010,1,2,46,2,-2,40,50\n";
        let log = parse_sensor_log(text.as_bytes(), None).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.report.dropped[0].line, 1);
        assert!(matches!(log.report.dropped[0].reason, DataError::Timestamp { .. }));
    }

    #[test]
    fn table_reads_named_columns() {
        let csv = "h,Angle(rad),R\n1,0.5,45.0\n2,,46.0\n3,0.7,x\n";
        let table = parse_table(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.column_names, vec!["h", "Angle(rad)", "R"]);
        assert_eq!(table.column_dropna("R").unwrap(), vec![45.0, 46.0]);
        assert_eq!(table.column_dropna("Angle(rad)").unwrap(), vec![0.5, 0.7]);
    }
}
