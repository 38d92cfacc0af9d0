//! Trim point parsing
//!
//! Trim points are given either as a bare number of seconds (`90.5`) or as an
//! ffmpeg style timecode (`HH:MM:SS[.mmm]` or `MM:SS[.mmm]`).

use crate::error::EncodeError;

/// Convert a trim point to seconds, leniently
///
/// Absent or empty input yields `0.0`. Input matching neither accepted form
/// also yields `0.0` instead of failing; use [`parse_time_strict`] where a
/// malformed value must be reported.
pub fn parse_time(input: Option<&str>) -> f64 {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(parse_components)
        .unwrap_or(0.0)
}

/// Convert a trim point to seconds, rejecting malformed or negative input
pub fn parse_time_strict(input: &str) -> Result<f64, EncodeError> {
    match parse_components(input.trim()) {
        Some(secs) if secs >= 0.0 => Ok(secs),
        _ => Err(EncodeError::InvalidTime(input.to_string())),
    }
}

/// Render seconds the way they are handed to ffmpeg (`%.3f`)
pub fn format_seconds(secs: f64) -> String {
    format!("{:.3}", secs)
}

fn parse_components(s: &str) -> Option<f64> {
    if let Some(secs) = parse_finite(s) {
        return Some(secs);
    }

    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [h, m, sec] => Some(parse_finite(h)? * 3600.0 + parse_finite(m)? * 60.0 + parse_finite(sec)?),
        [m, sec] => Some(parse_finite(m)? * 60.0 + parse_finite(sec)?),
        _ => None,
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
