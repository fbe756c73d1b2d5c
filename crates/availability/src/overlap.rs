//! Slot-to-slot time compatibility.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use flowmatch_core::{AvailabilityWindow, SlotTiming, TimeRange};

use crate::flatten::{absolute_intervals, resolve_local_ranges, zone_or_utc};
use crate::interval::{Interval, intersect_intervals};
use crate::time_of_day::{format_hhmm, parse_hhmm};
use crate::timezone::Zone;

/// Days scanned when a recurring slot has no end date.
pub const DEFAULT_HORIZON_DAYS: u32 = 366;

/// Bounds for date expansion during overlap checks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OverlapOptions {
    /// Maximum number of local dates expanded per side.
    pub horizon_days: u32,
    /// First date scanned when a slot declares no start date.
    pub anchor_date: NaiveDate,
}

impl OverlapOptions {
    pub fn anchored(anchor_date: NaiveDate) -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            anchor_date,
        }
    }

    pub fn with_horizon_days(mut self, horizon_days: u32) -> Self {
        self.horizon_days = horizon_days.max(1);
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlotKind {
    Recurring,
    OneTime,
}

impl SlotKind {
    pub fn of(timing: &SlotTiming) -> Self {
        if timing.is_recurring() {
            SlotKind::Recurring
        } else {
            SlotKind::OneTime
        }
    }
}

/// Validity periods intersect (inclusive); a missing bound is unbounded.
pub fn validity_overlaps(a: &SlotTiming, b: &SlotTiming) -> bool {
    let start = |t: &SlotTiming| t.start_date.unwrap_or(DateTime::<Utc>::MIN_UTC);
    let end = |t: &SlotTiming| t.end_date.unwrap_or(DateTime::<Utc>::MAX_UTC);
    start(a) <= end(b) && start(b) <= end(a)
}

fn parse_range(range: &TimeRange) -> Option<Interval<u32>> {
    match (parse_hhmm(&range.start_time), parse_hhmm(&range.end_time)) {
        (Ok(start), Ok(end)) => Interval::new(start, end),
        (Err(err), _) | (_, Err(err)) => {
            warn!(start = %range.start_time, end = %range.end_time, error = %err, "ignoring unparseable time range");
            None
        }
    }
}

/// Raw wall-clock overlap of two same-day ranges (half-open).
pub fn ranges_overlap(a: &TimeRange, b: &TimeRange) -> bool {
    match (parse_range(a), parse_range(b)) {
        (Some(x), Some(y)) => x.overlaps(&y),
        _ => false,
    }
}

/// Exact overlapping sub-ranges of two same-day range lists.
pub fn intersect_time_ranges(a: &[TimeRange], b: &[TimeRange]) -> Vec<TimeRange> {
    let a: Vec<Interval<u32>> = a.iter().filter_map(parse_range).collect();
    let b: Vec<Interval<u32>> = b.iter().filter_map(parse_range).collect();
    intersect_intervals(&a, &b)
        .into_iter()
        .map(|r| TimeRange::new(format_hhmm(r.start), format_hhmm(r.end)))
        .collect()
}

/// One side of an overlap check: a window, its zone, and the local dates it may open on.
///
/// `last` is the slot's real last date (`NaiveDate::MAX` for an open-ended recurring slot);
/// the horizon only caps how many dates a single expansion walks.
pub(crate) struct Side<'a> {
    window: &'a AvailabilityWindow,
    zone: Zone,
    horizon_days: u32,
    pub(crate) first: NaiveDate,
    pub(crate) last: NaiveDate,
}

pub(crate) fn next_day(d: NaiveDate) -> NaiveDate {
    d.succ_opt().unwrap_or(d)
}

pub(crate) fn prev_day(d: NaiveDate) -> NaiveDate {
    d.pred_opt().unwrap_or(d)
}

impl<'a> Side<'a> {
    pub(crate) fn new(timing: &'a SlotTiming, window: &'a AvailabilityWindow, opts: &OverlapOptions) -> Self {
        let zone = zone_or_utc(timing.time_zone.as_deref());

        let first = timing
            .start_date
            .map(|d| zone.local_date(d))
            .unwrap_or(opts.anchor_date);
        let open_end = match SlotKind::of(timing) {
            SlotKind::Recurring => NaiveDate::MAX,
            SlotKind::OneTime => first,
        };
        let last = timing
            .end_date
            .map(|d| zone.local_date(d))
            .unwrap_or(open_end)
            .max(first);

        Self {
            window,
            zone,
            horizon_days: opts.horizon_days.max(1),
            first,
            last,
        }
    }

    /// Absolute intervals on local dates `from..=to`, clipped to this side's own dates and
    /// to at most `horizon_days` dates from the clipped start.
    pub(crate) fn intervals_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<Interval<DateTime<Utc>>> {
        let from = from.max(self.first);
        let to = to.min(self.last);
        if from > to {
            return Vec::new();
        }
        let dates = std::iter::successors(Some(from), |d| d.succ_opt())
            .take_while(move |d| *d <= to)
            .take(self.horizon_days as usize);
        absolute_intervals(self.window, &self.zone, dates)
    }

    pub(crate) fn all_intervals(&self) -> Vec<Interval<DateTime<Utc>>> {
        self.intervals_between(self.first, self.last)
    }

    /// Wall-clock ranges of this side's first date, ignoring its zone.
    fn local_ranges(&self) -> Vec<TimeRange> {
        resolve_local_ranges(self.window, self.first).into_iter().cloned().collect()
    }
}

fn any_overlap(a: &[Interval<DateTime<Utc>>], b: &[Interval<DateTime<Utc>>]) -> bool {
    !intersect_intervals(a, b).is_empty()
}

/// Whether two slots share any open time.
///
/// 1. Disjoint validity periods never overlap.
/// 2. A slot without a structured window is unconstrained beyond its validity period.
/// 3. Otherwise both windows are expanded onto absolute UTC intervals:
///    - recurring × recurring: day by day across the common validity period;
///    - recurring × one-time: the one-time slot's own date(s) are the sample dates fed to
///      the recurring window, plus the neighbouring day on each side so ranges that cross
///      midnight after timezone shifting are compared exactly;
///    - one-time × one-time: the raw wall-clock ranges, without zone conversion.
pub fn time_ranges_overlap(a: &SlotTiming, b: &SlotTiming, opts: &OverlapOptions) -> bool {
    if !validity_overlaps(a, b) {
        return false;
    }
    let (Some(wa), Some(wb)) = (a.window(), b.window()) else {
        return true;
    };

    let side_a = Side::new(a, wa, opts);
    let side_b = Side::new(b, wb, opts);
    match (SlotKind::of(a), SlotKind::of(b)) {
        (SlotKind::Recurring, SlotKind::Recurring) => {
            let from = side_a.first.max(side_b.first);
            let to = side_a.last.min(side_b.last);
            if from > next_day(to) {
                return false;
            }
            let (from, to) = (prev_day(from), next_day(to));
            any_overlap(&side_a.intervals_between(from, to), &side_b.intervals_between(from, to))
        }
        (SlotKind::Recurring, SlotKind::OneTime) => recurring_vs_one_time(&side_a, &side_b),
        (SlotKind::OneTime, SlotKind::Recurring) => recurring_vs_one_time(&side_b, &side_a),
        (SlotKind::OneTime, SlotKind::OneTime) => {
            !intersect_time_ranges(&side_a.local_ranges(), &side_b.local_ranges()).is_empty()
        }
    }
}

fn recurring_vs_one_time(recurring: &Side<'_>, one_time: &Side<'_>) -> bool {
    let sampled = recurring.intervals_between(prev_day(one_time.first), next_day(one_time.last));
    any_overlap(&sampled, &one_time.all_intervals())
}
