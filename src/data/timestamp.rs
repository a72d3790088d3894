use super::error::DataError;

/// Convert a logger timestamp `HH:MM:SS:ms` to seconds.
///
/// Each of the four parts must be a non-negative integer; the millisecond
/// part is divided by 1000 regardless of its digit count.
///
/// ```
/// use flexdms_lab::data::timestamp::parse_timestamp;
///
/// let t = parse_timestamp("01:02:03:004").unwrap();
/// assert!((t - 3723.004).abs() < 1e-9);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, DataError> {
    let parts: Vec<&str> = ts.trim().split(':').collect();
    if parts.len() != 4 {
        return Err(DataError::Timestamp {
            input: ts.to_string(),
            reason: format!("expected 4 colon-separated parts, found {}", parts.len()),
        });
    }

    let mut fields = [0u64; 4];
    for (slot, part) in fields.iter_mut().zip(&parts) {
        *slot = part.trim().parse::<u64>().map_err(|_| DataError::Timestamp {
            input: ts.to_string(),
            reason: format!("'{part}' is not an integer"),
        })?;
    }

    let [h, m, s, ms] = fields;
    let whole = h
        .checked_mul(3600)
        .and_then(|h| m.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(s))
        .ok_or_else(|| DataError::Timestamp {
            input: ts.to_string(),
            reason: "time is out of range".to_string(),
        })?;
    Ok(whole as f64 + ms as f64 / 1000.0)
}

/// Format seconds back into the logger's `HH:MM:SS:ms` layout.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}:{:03}",
        total_s / 3600,
        (total_s / 60) % 60,
        total_s % 60,
        ms
    )
}
