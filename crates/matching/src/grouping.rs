//! Space-time grouping: equivalence classes of slots with the same shape.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use flowmatch_availability::parse_weekday;
use flowmatch_core::{AvailabilityWindow, DaySchedule, SlotLocation, SlotTiming};

use crate::slot::Slot;

/// Location component of a signature when the slot is online/remote.
pub const REMOTE_SIGNATURE: &str = "remote";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceTimeGroup {
    pub signature: String,
    pub slot_ids: Vec<String>,
    pub total_quantity: f64,
}

fn day_keys<'a>(days: impl IntoIterator<Item = &'a DaySchedule>, out: &mut BTreeSet<String>) {
    for d in days {
        // unparseable names still distinguish groups
        let key = match parse_weekday(&d.day) {
            Some(w) => w.to_string().to_lowercase(),
            None => d.day.trim().to_lowercase(),
        };
        out.insert(key);
    }
}

fn joined<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    items.into_iter().map(|i| i.to_string()).collect::<Vec<_>>().join(",")
}

fn window_keys(window: &AvailabilityWindow) -> String {
    let mut months = BTreeSet::new();
    let mut weeks = BTreeSet::new();
    let mut days = BTreeSet::new();

    for m in &window.month_schedules {
        months.insert(m.month);
        for w in &m.week_schedules {
            weeks.insert(w.week);
            day_keys(&w.day_schedules, &mut days);
        }
        day_keys(&m.day_schedules, &mut days);
    }
    for w in &window.week_schedules {
        weeks.insert(w.week);
        day_keys(&w.day_schedules, &mut days);
    }
    day_keys(&window.day_schedules, &mut days);

    format!("m:{}|w:{}|d:{}", joined(months), joined(weeks), joined(days))
}

/// Recurrence label plus the hierarchy keys (months, weeks, days) the window declares.
pub fn time_signature(timing: &SlotTiming) -> String {
    let recurrence = timing
        .recurrence
        .as_deref()
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "none".to_string());
    match timing.window() {
        Some(window) => format!("{recurrence}|{}", window_keys(window)),
        None => recurrence,
    }
}

/// `remote`, or `city|country|latitude` with latitude rounded to one decimal.
pub fn location_signature(location: &SlotLocation) -> String {
    if location.is_remote() {
        return REMOTE_SIGNATURE.to_string();
    }
    let lower = |v: Option<&str>| v.map(str::to_lowercase).unwrap_or_default();
    let latitude = location
        .latitude
        .map(|lat| format!("{:.1}", (lat * 10.0).round() / 10.0))
        .unwrap_or_default();
    format!("{}|{}|{latitude}", lower(location.city()), lower(location.country()))
}

pub fn get_space_time_signature(slot: &Slot) -> String {
    format!("{}#{}", time_signature(&slot.timing), location_signature(&slot.location))
}

/// Bucket slots by signature, accumulating quantity. Groups are ordered by signature;
/// slot ids keep input order within a group.
pub fn group_slots_by_space_time(slots: &[Slot]) -> Vec<SpaceTimeGroup> {
    let mut buckets: BTreeMap<String, SpaceTimeGroup> = BTreeMap::new();
    for slot in slots {
        let signature = get_space_time_signature(slot);
        let group = buckets.entry(signature.clone()).or_insert_with(|| SpaceTimeGroup {
            signature,
            slot_ids: Vec::new(),
            total_quantity: 0.0,
        });
        group.slot_ids.push(slot.id.clone());
        group.total_quantity += slot.quantity;
    }
    buckets.into_values().collect()
}
