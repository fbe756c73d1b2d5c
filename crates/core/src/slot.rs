//! Timing and location attributes of a schedulable slot.
//!
//! These are the parts of a slot that the availability and spatial layers read; the full
//! `Slot` (quantity, flow constraints, eligibility) is assembled in `flowmatch-matching`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::availability::AvailabilityWindow;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotTiming {
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Free-form recurrence label (`"weekly"`, `"daily"`, `"none"`, ...).
    #[serde(default)]
    pub recurrence: Option<String>,
    #[serde(default)]
    pub availability_window: Option<AvailabilityWindow>,
    /// IANA zone name, `UTC`, or a fixed `±HH:MM` offset.
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl SlotTiming {
    /// Recurring iff the recurrence label is present, non-empty, and not `"none"`.
    pub fn is_recurring(&self) -> bool {
        match self.recurrence.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(r) => !r.eq_ignore_ascii_case("none"),
        }
    }

    /// The structured window, if one is declared and non-empty.
    pub fn window(&self) -> Option<&AvailabilityWindow> {
        self.availability_window.as_ref().filter(|w| !w.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotLocation {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Hexagonal spatial-index cell (H3, hex string form).
    #[serde(default)]
    pub h3_index: Option<String>,
    #[serde(default)]
    pub search_radius_km: Option<f64>,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub online_url: Option<String>,
}

impl SlotLocation {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.online || non_blank(&self.online_url).is_some()
    }

    pub fn city(&self) -> Option<&str> {
        non_blank(&self.city)
    }

    pub fn country(&self) -> Option<&str> {
        non_blank(&self.country)
    }

    pub fn cell(&self) -> Option<&str> {
        non_blank(&self.h3_index)
    }

    pub fn has_location_data(&self) -> bool {
        self.coordinates().is_some()
            || self.city().is_some()
            || self.country().is_some()
            || self.cell().is_some()
            || self.is_remote()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
