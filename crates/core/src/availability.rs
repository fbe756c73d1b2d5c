//! Hierarchical availability windows (month → week → day → time range).
//!
//! Only the data model lives here; resolution against a calendar date and timezone
//! conversion are in `flowmatch-availability`.

use serde::{Deserialize, Serialize};

/// A local wall-clock range, `"HH:MM"` to `"HH:MM"` (half-open; `"24:00"` allowed as end).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_time: String,
    pub end_time: String,
}

impl TimeRange {
    pub fn new(start_time: impl Into<String>, end_time: impl Into<String>) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: end_time.into(),
        }
    }
}

/// Ranges for one named day (`"monday"`, `"tue"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day: String,
    #[serde(default)]
    pub time_ranges: Vec<TimeRange>,
}

/// Week `1..=5` of a month, narrowed to named days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSchedule {
    pub week: u8,
    #[serde(default)]
    pub day_schedules: Vec<DaySchedule>,
}

/// One calendar month (`1..=12`), optionally narrowed by weeks, days, or flat ranges
/// (checked in that order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthSchedule {
    pub month: u32,
    #[serde(default)]
    pub week_schedules: Vec<WeekSchedule>,
    #[serde(default)]
    pub day_schedules: Vec<DaySchedule>,
    #[serde(default)]
    pub time_ranges: Vec<TimeRange>,
}

/// Which level of an [`AvailabilityWindow`] is in force.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowLevel {
    Month,
    Week,
    Day,
    Time,
}

/// Structured availability. The populated field with the highest priority
/// (month > week > day > time) is the only one consulted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    #[serde(default)]
    pub month_schedules: Vec<MonthSchedule>,
    #[serde(default)]
    pub week_schedules: Vec<WeekSchedule>,
    #[serde(default)]
    pub day_schedules: Vec<DaySchedule>,
    #[serde(default)]
    pub time_ranges: Vec<TimeRange>,
}

impl AvailabilityWindow {
    pub fn from_time_ranges(time_ranges: Vec<TimeRange>) -> Self {
        Self {
            time_ranges,
            ..Self::default()
        }
    }

    pub fn from_day_schedules(day_schedules: Vec<DaySchedule>) -> Self {
        Self {
            day_schedules,
            ..Self::default()
        }
    }

    pub fn active_level(&self) -> Option<WindowLevel> {
        if !self.month_schedules.is_empty() {
            Some(WindowLevel::Month)
        } else if !self.week_schedules.is_empty() {
            Some(WindowLevel::Week)
        } else if !self.day_schedules.is_empty() {
            Some(WindowLevel::Day)
        } else if !self.time_ranges.is_empty() {
            Some(WindowLevel::Time)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active_level().is_none()
    }

    /// Number of declared ranges across every level (flattening cost is linear in this).
    pub fn declared_range_count(&self) -> usize {
        fn days(d: &[DaySchedule]) -> usize {
            d.iter().map(|s| s.time_ranges.len()).sum()
        }
        fn weeks(w: &[WeekSchedule]) -> usize {
            w.iter().map(|s| days(&s.day_schedules)).sum()
        }

        let months: usize = self
            .month_schedules
            .iter()
            .map(|m| weeks(&m.week_schedules) + days(&m.day_schedules) + m.time_ranges.len())
            .sum();

        months + weeks(&self.week_schedules) + days(&self.day_schedules) + self.time_ranges.len()
    }
}
