//! Flow constraints: granularity, physics floor, lead time, booking window.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use flowmatch_availability::{calculate_max_contiguous_duration, zone_or_utc};

use crate::slot::Slot;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowConstraintKind {
    /// Need quantity ≥ capacity `min_atomic_size`.
    Granularity,
    /// Longest shared contiguous block ≥ capacity `min_calendar_duration`.
    PhysicsFloor,
    /// Earliest matchable start at least `advance_notice_hours` after the reference instant.
    LeadTime,
    /// Earliest matchable start at most `booking_window_hours` after the reference instant.
    BookingWindow,
}

/// Outcome of one applicable constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowCheck {
    pub constraint: FlowConstraintKind,
    pub passed: bool,
    pub required: f64,
    /// Measured value; absent when there was nothing to measure (check passes).
    pub actual: Option<f64>,
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Earliest instant a match could begin: the later of the two declared start dates.
pub fn earliest_matchable_start(need: &Slot, capacity: &Slot) -> Option<DateTime<Utc>> {
    match (need.timing.start_date, capacity.timing.start_date) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Local date used for the physics floor: the earliest matchable start, else the reference
/// instant, read in the need's zone.
pub fn reference_date(need: &Slot, capacity: &Slot, reference_instant: DateTime<Utc>) -> NaiveDate {
    let zone = zone_or_utc(need.timing.time_zone.as_deref());
    zone.local_date(earliest_matchable_start(need, capacity).unwrap_or(reference_instant))
}

fn hours_until_start(need: &Slot, capacity: &Slot, reference_instant: DateTime<Utc>) -> Option<f64> {
    earliest_matchable_start(need, capacity).map(|start| (start - reference_instant).num_minutes() as f64 / 60.0)
}

fn check(need: &Slot, capacity: &Slot, reference_instant: DateTime<Utc>, kind: FlowConstraintKind) -> Option<FlowCheck> {
    let flow = &capacity.flow;
    let result = match kind {
        FlowConstraintKind::Granularity => {
            let required = positive(flow.min_atomic_size)?;
            FlowCheck {
                constraint: kind,
                passed: need.quantity >= required,
                required,
                actual: Some(need.quantity),
            }
        }
        FlowConstraintKind::PhysicsFloor => {
            let required = positive(flow.min_calendar_duration)?;
            let date = reference_date(need, capacity, reference_instant);
            let actual = calculate_max_contiguous_duration(&need.timing, &capacity.timing, date);
            FlowCheck {
                constraint: kind,
                passed: actual.is_none_or(|hours| hours >= required),
                required,
                actual,
            }
        }
        FlowConstraintKind::LeadTime => {
            let required = positive(flow.advance_notice_hours)?;
            let actual = hours_until_start(need, capacity, reference_instant);
            FlowCheck {
                constraint: kind,
                passed: actual.is_none_or(|hours| hours >= required),
                required,
                actual,
            }
        }
        FlowConstraintKind::BookingWindow => {
            let required = positive(flow.booking_window_hours)?;
            let actual = hours_until_start(need, capacity, reference_instant);
            FlowCheck {
                constraint: kind,
                passed: actual.is_none_or(|hours| hours <= required),
                required,
                actual,
            }
        }
    };
    if !result.passed {
        debug!(need = %need.id, capacity = %capacity.id, constraint = ?kind, required = result.required, actual = ?result.actual, "flow constraint failed");
    }
    Some(result)
}

const ORDER: [FlowConstraintKind; 4] = [
    FlowConstraintKind::Granularity,
    FlowConstraintKind::PhysicsFloor,
    FlowConstraintKind::LeadTime,
    FlowConstraintKind::BookingWindow,
];

/// Whether every applicable constraint passes. Stops at the first failure.
pub fn check_flow_constraints(need: &Slot, capacity: &Slot, reference_instant: DateTime<Utc>) -> bool {
    ORDER
        .iter()
        .filter_map(|&kind| check(need, capacity, reference_instant, kind))
        .all(|c| c.passed)
}

/// Every applicable constraint, evaluated independently.
pub fn check_flow_constraints_detailed(
    need: &Slot,
    capacity: &Slot,
    reference_instant: DateTime<Utc>,
) -> Vec<FlowCheck> {
    ORDER
        .iter()
        .filter_map(|&kind| check(need, capacity, reference_instant, kind))
        .collect()
}
