//! Local → UTC conversion for wall-clock times.
//!
//! The offset applied for a sample date is the one in force at **noon UTC** on that date.
//! Noon keeps the reference away from the DST switch-over hours of every populated zone,
//! so a whole local day shifts by one consistent offset.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::TimezoneError;
use crate::time_of_day::{MINUTES_PER_DAY, format_hhmm, parse_hhmm};

/// A parsed time zone: IANA name or fixed offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Zone {
    Fixed(FixedOffset),
    Named(Tz),
}

impl Zone {
    pub fn utc() -> Self {
        Zone::Named(Tz::UTC)
    }

    /// Minutes east of UTC in force at noon UTC on `date`.
    pub fn offset_minutes_on(&self, date: NaiveDate) -> i64 {
        let seconds = match self {
            Zone::Fixed(offset) => offset.local_minus_utc(),
            Zone::Named(tz) => {
                let noon = date
                    .and_hms_opt(12, 0, 0)
                    .unwrap_or_else(|| date.and_time(NaiveTime::default()));
                tz.offset_from_utc_datetime(&noon).fix().local_minus_utc()
            }
        };
        i64::from(seconds) / 60
    }

    /// Local calendar date of `instant` in this zone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            Zone::Fixed(offset) => instant.with_timezone(offset).date_naive(),
            Zone::Named(tz) => instant.with_timezone(tz).date_naive(),
        }
    }
}

/// Parse a zone: `UTC`/`Z`/`GMT` (or empty), fixed `±HH[:MM]` offsets (optionally prefixed
/// with `UTC`/`GMT`), or an IANA name such as `Europe/Berlin`.
pub fn parse_zone(value: &str) -> Result<Zone, TimezoneError> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("utc")
        || trimmed.eq_ignore_ascii_case("gmt")
        || trimmed.eq_ignore_ascii_case("z")
    {
        return Ok(Zone::utc());
    }

    let offset_part = ["UTC", "GMT", "utc", "gmt"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);
    if offset_part.starts_with('+') || offset_part.starts_with('-') {
        return parse_fixed_offset(offset_part)
            .map(Zone::Fixed)
            .ok_or_else(|| TimezoneError::InvalidOffset(value.to_string()));
    }

    trimmed
        .parse::<Tz>()
        .map(Zone::Named)
        .map_err(|_| TimezoneError::UnknownZone(value.to_string()))
}

fn parse_fixed_offset(value: &str) -> Option<FixedOffset> {
    let (sign, digits) = value.split_at(1);
    let sign = if sign == "-" { -1 } else { 1 };

    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if digits.len() == 4 => (
            digits.get(..2)?.parse().ok()?,
            digits.get(2..)?.parse().ok()?,
        ),
        None => (digits.parse().ok()?, 0),
    };
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// A wall-clock time on the UTC grid, with the day shift relative to the local date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtcTime {
    pub time: String,
    /// `-1` when the UTC time falls on the previous calendar day, `1` for the next.
    pub day_shift: i64,
}

/// Shift local minutes-since-midnight by `offset_minutes`, returning `(day_shift, minutes)`.
pub(crate) fn shift_to_utc(local_minutes: u32, offset_minutes: i64) -> (i64, u32) {
    let shifted = i64::from(local_minutes) - offset_minutes;
    let day_shift = shifted.div_euclid(MINUTES_PER_DAY);
    // rem_euclid keeps the value in [0, 1440).
    (day_shift, shifted.rem_euclid(MINUTES_PER_DAY) as u32)
}

/// Convert `time` in `zone` on `sample_date` to UTC, surfacing failures.
pub fn try_convert_local_time_to_utc(
    time: &str,
    zone: &str,
    sample_date: NaiveDate,
) -> Result<UtcTime, TimezoneError> {
    let minutes = parse_hhmm(time)?;
    let zone = parse_zone(zone)?;
    let (day_shift, utc_minutes) = shift_to_utc(minutes, zone.offset_minutes_on(sample_date));
    Ok(UtcTime {
        time: format_hhmm(utc_minutes),
        day_shift,
    })
}

/// Convert `time` in `zone` on `sample_date` to UTC.
///
/// On any parse failure the original local time is returned unchanged (day shift 0) so a
/// best-effort local comparison can still proceed.
pub fn convert_local_time_to_utc(time: &str, zone: &str, sample_date: NaiveDate) -> UtcTime {
    match try_convert_local_time_to_utc(time, zone, sample_date) {
        Ok(converted) => converted,
        Err(err) => {
            warn!(time, zone, error = %err, "timezone conversion failed; keeping local time");
            UtcTime {
                time: time.to_string(),
                day_shift: 0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn morning_in_utc_plus_two_stays_on_same_day() {
        let out = convert_local_time_to_utc("09:00", "+02:00", date(2025, 1, 15));
        assert_eq!(out, UtcTime { time: "07:00".into(), day_shift: 0 });
    }

    #[test]
    fn late_evening_in_utc_plus_two_keeps_day() {
        let out = convert_local_time_to_utc("23:30", "+02:00", date(2025, 1, 15));
        assert_eq!(out, UtcTime { time: "21:30".into(), day_shift: 0 });
    }

    #[test]
    fn early_morning_in_utc_plus_two_rolls_back_a_day() {
        let out = convert_local_time_to_utc("01:30", "+02:00", date(2025, 1, 15));
        assert_eq!(out, UtcTime { time: "23:30".into(), day_shift: -1 });
    }

    #[test]
    fn late_evening_west_of_utc_rolls_forward() {
        let out = convert_local_time_to_utc("23:30", "UTC-02:00", date(2025, 1, 15));
        assert_eq!(out, UtcTime { time: "01:30".into(), day_shift: 1 });
    }

    #[test]
    fn named_zone_uses_offset_at_noon_utc() {
        // Berlin is UTC+1 in January and UTC+2 in July.
        let winter = convert_local_time_to_utc("09:00", "Europe/Berlin", date(2025, 1, 15));
        let summer = convert_local_time_to_utc("09:00", "Europe/Berlin", date(2025, 7, 15));
        assert_eq!(winter.time, "08:00");
        assert_eq!(summer.time, "07:00");
    }

    #[test]
    fn unparseable_input_returns_local_time_unchanged() {
        let out = convert_local_time_to_utc("09:00", "Mars/Olympus", date(2025, 1, 15));
        assert_eq!(out, UtcTime { time: "09:00".into(), day_shift: 0 });

        let out = convert_local_time_to_utc("nine", "UTC", date(2025, 1, 15));
        assert_eq!(out.time, "nine");

        assert!(matches!(
            try_convert_local_time_to_utc("09:00", "Mars/Olympus", date(2025, 1, 15)),
            Err(TimezoneError::UnknownZone(_))
        ));
    }

    #[test]
    fn fixed_offset_forms() {
        let d = date(2025, 1, 1);
        assert_eq!(parse_zone("+0530").unwrap().offset_minutes_on(d), 330);
        assert_eq!(parse_zone("-03").unwrap().offset_minutes_on(d), -180);
        assert_eq!(parse_zone("GMT+01:00").unwrap().offset_minutes_on(d), 60);
        assert!(matches!(parse_zone("+25:00"), Err(TimezoneError::InvalidOffset(_))));
        assert_eq!(parse_zone("").unwrap().offset_minutes_on(d), 0);
    }
}
