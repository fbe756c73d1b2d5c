//! Availability-window resolution and flattening onto the UTC grid.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;

use flowmatch_core::{AvailabilityWindow, DaySchedule, TimeRange, availability::WindowLevel};

use crate::interval::{Interval, merge_contiguous};
use crate::time_of_day::{MINUTES_PER_DAY, parse_hhmm};
use crate::timezone::{Zone, parse_zone};

/// Week `1..=5` of the month containing `date`.
pub fn week_of_month(date: NaiveDate) -> u8 {
    ((date.day() - 1) / 7 + 1) as u8
}

/// Full or three-letter English day name, case-insensitive.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let lower = name.trim().to_ascii_lowercase();
    let day = match lower.get(..3)? {
        "mon" => Weekday::Mon,
        "tue" => Weekday::Tue,
        "wed" => Weekday::Wed,
        "thu" => Weekday::Thu,
        "fri" => Weekday::Fri,
        "sat" => Weekday::Sat,
        "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

fn day_ranges(days: &[DaySchedule], weekday: Weekday) -> Vec<&TimeRange> {
    days.iter()
        .filter(|d| parse_weekday(&d.day) == Some(weekday))
        .flat_map(|d| d.time_ranges.iter())
        .collect()
}

/// Local ranges in force on `date`, walking the hierarchy top-down.
///
/// Only the highest-priority populated level is consulted; a lower level applies uniformly
/// across every unit of the levels above it.
pub fn resolve_local_ranges(window: &AvailabilityWindow, date: NaiveDate) -> Vec<&TimeRange> {
    let weekday = date.weekday();
    let week = week_of_month(date);

    match window.active_level() {
        Some(WindowLevel::Month) => window
            .month_schedules
            .iter()
            .filter(|m| m.month == date.month())
            .flat_map(|m| {
                if !m.week_schedules.is_empty() {
                    m.week_schedules
                        .iter()
                        .filter(|w| w.week == week)
                        .flat_map(|w| day_ranges(&w.day_schedules, weekday))
                        .collect()
                } else if !m.day_schedules.is_empty() {
                    day_ranges(&m.day_schedules, weekday)
                } else {
                    m.time_ranges.iter().collect()
                }
            })
            .collect(),
        Some(WindowLevel::Week) => window
            .week_schedules
            .iter()
            .filter(|w| w.week == week)
            .flat_map(|w| day_ranges(&w.day_schedules, weekday))
            .collect(),
        Some(WindowLevel::Day) => day_ranges(&window.day_schedules, weekday),
        Some(WindowLevel::Time) => window.time_ranges.iter().collect(),
        None => Vec::new(),
    }
}

/// Open ranges on one UTC calendar day, in minutes since UTC midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcDaySchedule {
    pub date: NaiveDate,
    pub ranges: Vec<Interval<u32>>,
}

impl UtcDaySchedule {
    pub fn to_instants(&self) -> Vec<Interval<DateTime<Utc>>> {
        let midnight = Utc.from_utc_datetime(&self.date.and_time(NaiveTime::default()));
        self.ranges
            .iter()
            .filter_map(|r| {
                Interval::new(
                    midnight + Duration::minutes(i64::from(r.start)),
                    midnight + Duration::minutes(i64::from(r.end)),
                )
            })
            .collect()
    }
}

/// Parse `zone`, falling back to UTC (local times unchanged) when it cannot be parsed.
pub fn zone_or_utc(zone: Option<&str>) -> Zone {
    match zone {
        None => Zone::utc(),
        Some(name) => parse_zone(name).unwrap_or_else(|err| {
            warn!(zone = name, error = %err, "unparseable time zone; comparing local times as UTC");
            Zone::utc()
        }),
    }
}

/// Local minutes of a range; an end at or before the start wraps past midnight.
fn local_span(range: &TimeRange) -> Option<(i64, i64)> {
    let parsed = parse_hhmm(&range.start_time).and_then(|s| parse_hhmm(&range.end_time).map(|e| (s, e)));
    match parsed {
        Ok((start, end)) if start == end => None,
        Ok((start, end)) if end < start => Some((i64::from(start), i64::from(end) + MINUTES_PER_DAY)),
        Ok((start, end)) => Some((i64::from(start), i64::from(end))),
        Err(err) => {
            warn!(start = %range.start_time, end = %range.end_time, error = %err, "skipping unparseable time range");
            None
        }
    }
}

/// Resolve `window` for `sample_date` and convert every local range to UTC day schedules.
///
/// The zone's offset at noon UTC on `sample_date` is applied to the whole day; a range
/// pushed outside `[0, 24h)` rolls onto the previous/next UTC day and is split there.
pub fn flatten_window_to_utc_day_schedules(
    window: &AvailabilityWindow,
    zone: Option<&str>,
    sample_date: NaiveDate,
) -> Vec<UtcDaySchedule> {
    flatten_in_zone(window, &zone_or_utc(zone), sample_date)
}

/// [`flatten_window_to_utc_day_schedules`] with an already-parsed zone.
pub fn flatten_in_zone(
    window: &AvailabilityWindow,
    zone: &Zone,
    sample_date: NaiveDate,
) -> Vec<UtcDaySchedule> {
    let offset = zone.offset_minutes_on(sample_date);
    let mut by_day: BTreeMap<i64, Vec<Interval<u32>>> = BTreeMap::new();

    for range in resolve_local_ranges(window, sample_date) {
        let Some((local_start, local_end)) = local_span(range) else {
            continue;
        };
        let (start, end) = (local_start - offset, local_end - offset);

        let mut day = start.div_euclid(MINUTES_PER_DAY);
        while day * MINUTES_PER_DAY < end {
            let day_start = day * MINUTES_PER_DAY;
            let piece_start = start.max(day_start) - day_start;
            let piece_end = end.min(day_start + MINUTES_PER_DAY) - day_start;
            if let Some(piece) = Interval::new(piece_start as u32, piece_end as u32) {
                by_day.entry(day).or_default().push(piece);
            }
            day += 1;
        }
    }

    by_day
        .into_iter()
        .filter_map(|(shift, ranges)| {
            let date = sample_date.checked_add_signed(Duration::days(shift))?;
            Some(UtcDaySchedule {
                date,
                ranges: merge_contiguous(&ranges),
            })
        })
        .collect()
}

/// Absolute UTC intervals for `window` across the given local dates, merged.
pub fn absolute_intervals(
    window: &AvailabilityWindow,
    zone: &Zone,
    dates: impl IntoIterator<Item = NaiveDate>,
) -> Vec<Interval<DateTime<Utc>>> {
    let instants: Vec<Interval<DateTime<Utc>>> = dates
        .into_iter()
        .flat_map(|date| flatten_in_zone(window, zone, date))
        .flat_map(|day| day.to_instants())
        .collect();
    merge_contiguous(&instants)
}
