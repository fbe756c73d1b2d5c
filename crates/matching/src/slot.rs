//! The schedulable unit that needs and capacities are both expressed as.

use serde::{Deserialize, Serialize};

use flowmatch_core::{SlotLocation, SlotTiming};

use crate::filter::FilterRule;

/// Non-time/space rules a capacity imposes on the needs it serves.
///
/// Each constraint applies only when set and positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowConstraints {
    /// Smallest quantity the capacity will serve in one match.
    #[serde(default)]
    pub min_atomic_size: Option<f64>,
    /// Shortest contiguous overlap (hours) worth booking.
    #[serde(default)]
    pub min_calendar_duration: Option<f64>,
    /// Hours between the reference instant and the need's start, at minimum.
    #[serde(default)]
    pub advance_notice_hours: Option<f64>,
    /// Hours between the reference instant and the need's start, at most.
    #[serde(default)]
    pub booking_window_hours: Option<f64>,
}

/// A resource slot: a need (demand) or a capacity (supply).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default = "one")]
    pub quantity: f64,
    #[serde(default)]
    pub timing: SlotTiming,
    #[serde(default)]
    pub location: SlotLocation,
    #[serde(default)]
    pub flow: FlowConstraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligibility: Option<FilterRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_skills: Vec<String>,
}

fn one() -> f64 {
    1.0
}

impl Slot {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            quantity: 1.0,
            ..Self::default()
        }
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_timing(mut self, timing: SlotTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_location(mut self, location: SlotLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_flow(mut self, flow: FlowConstraints) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_eligibility(mut self, rule: FilterRule) -> Self {
        self.eligibility = Some(rule);
        self
    }

    pub fn with_required_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_skills = skills.into_iter().map(Into::into).collect();
        self
    }

    /// Declared resource type, trimmed; blank counts as undeclared.
    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}
