//! `"HH:MM"` wall-clock parsing, in minutes since local midnight.

use crate::error::TimeParseError;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Parse `"HH:MM"` (or `"H:MM"`, or `"HH:MM:SS"` with the seconds ignored).
///
/// `"24:00"` is accepted so that a range can end at midnight.
pub fn parse_hhmm(value: &str) -> Result<u32, TimeParseError> {
    let trimmed = value.trim();
    let mut parts = trimmed.split(':');

    let (Some(h), Some(m)) = (parts.next(), parts.next()) else {
        return Err(TimeParseError::Malformed(value.to_string()));
    };
    if let Some(s) = parts.next() {
        if s.parse::<u32>().map_or(true, |s| s >= 60) || parts.next().is_some() {
            return Err(TimeParseError::Malformed(value.to_string()));
        }
    }

    let hours: u32 = h
        .parse()
        .map_err(|_| TimeParseError::Malformed(value.to_string()))?;
    let minutes: u32 = m
        .parse()
        .map_err(|_| TimeParseError::Malformed(value.to_string()))?;

    if minutes >= 60 || hours > 24 || (hours == 24 && minutes != 0) {
        return Err(TimeParseError::OutOfRange(value.to_string()));
    }

    Ok(hours * 60 + minutes)
}

/// Format minutes since midnight as `"HH:MM"`; values are wrapped into one day except that
/// a full day is rendered as `"24:00"`.
pub fn format_hhmm(minutes: u32) -> String {
    let minutes = if minutes == MINUTES_PER_DAY as u32 {
        minutes
    } else {
        minutes % MINUTES_PER_DAY as u32
    };
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
