use chrono::NaiveDate;

use flowmatch_core::SlotTiming;

use crate::interval::{intersect_intervals, merge_contiguous};
use crate::overlap::{OverlapOptions, Side};

/// Longest contiguous block (hours) during which both slots are open on `reference_date`.
///
/// Each side's ranges are resolved for its own local `reference_date` and compared on the
/// absolute UTC timeline. Touching ranges on one side count as one block. Returns `None`
/// when either slot has no structured window (duration is then unconstrained).
pub fn calculate_max_contiguous_duration(
    need: &SlotTiming,
    capacity: &SlotTiming,
    reference_date: NaiveDate,
) -> Option<f64> {
    let (Some(need_window), Some(capacity_window)) = (need.window(), capacity.window()) else {
        return None;
    };

    let opts = OverlapOptions::anchored(reference_date);
    let need_side = Side::new(need, need_window, &opts);
    let capacity_side = Side::new(capacity, capacity_window, &opts);

    let shared = intersect_intervals(
        &need_side.intervals_between(reference_date, reference_date),
        &capacity_side.intervals_between(reference_date, reference_date),
    );

    let longest_minutes = merge_contiguous(&shared)
        .iter()
        .map(|block| (block.end - block.start).num_minutes())
        .max()
        .unwrap_or(0);

    Some(longest_minutes as f64 / 60.0)
}
