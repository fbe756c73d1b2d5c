//! Time and availability utilities.
//!
//! Pure functions (no IO, no clock reads) over availability windows:
//! - half-open interval arithmetic
//! - hierarchy resolution (month → week → day → time range) against a calendar date
//! - timezone-correct conversion of local ranges onto a UTC day/time grid
//! - slot-to-slot overlap and the longest contiguous shared block

pub mod duration;
pub mod error;
pub mod flatten;
pub mod interval;
pub mod overlap;
pub mod time_of_day;
pub mod timezone;

pub use duration::calculate_max_contiguous_duration;
pub use error::{TimeParseError, TimezoneError};
pub use flatten::{
    UtcDaySchedule, absolute_intervals, flatten_in_zone, flatten_window_to_utc_day_schedules,
    parse_weekday, resolve_local_ranges, week_of_month, zone_or_utc,
};
pub use interval::{Interval, intersect_intervals, merge_contiguous};
pub use overlap::{
    DEFAULT_HORIZON_DAYS, OverlapOptions, SlotKind, intersect_time_ranges, ranges_overlap, time_ranges_overlap,
    validity_overlaps,
};
pub use time_of_day::{format_hhmm, parse_hhmm};
pub use timezone::{UtcTime, Zone, convert_local_time_to_utc, parse_zone};
