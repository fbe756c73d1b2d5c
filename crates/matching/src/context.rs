use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flowmatch_availability::{DEFAULT_HORIZON_DAYS, OverlapOptions};
use flowmatch_spatial::{DEFAULT_SEARCH_RADIUS_KM, SpatialOptions};

use crate::filter::FilterContext;

/// Engine-wide defaults applied when a slot leaves something unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchDefaults {
    pub default_radius_km: f64,
    /// Cap on the number of local dates expanded per slot during overlap checks.
    pub horizon_days: u32,
}

impl Default for MatchDefaults {
    fn default() -> Self {
        Self {
            default_radius_km: DEFAULT_SEARCH_RADIUS_KM,
            horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }
}

/// A party behind a slot: what it can do and what eligibility rules may ask about it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub filter_context: FilterContext,
}

impl Participant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context(mut self, filter_context: FilterContext) -> Self {
        self.filter_context = filter_context;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchContext {
    /// "Now" for lead-time and booking-window checks.
    pub reference_instant: DateTime<Utc>,
    #[serde(default)]
    pub need_party: Option<Participant>,
    #[serde(default)]
    pub capacity_party: Option<Participant>,
    #[serde(default)]
    pub defaults: MatchDefaults,
}

impl MatchContext {
    pub fn new(reference_instant: DateTime<Utc>) -> Self {
        Self {
            reference_instant,
            need_party: None,
            capacity_party: None,
            defaults: MatchDefaults::default(),
        }
    }

    pub fn with_need_party(mut self, party: Participant) -> Self {
        self.need_party = Some(party);
        self
    }

    pub fn with_capacity_party(mut self, party: Participant) -> Self {
        self.capacity_party = Some(party);
        self
    }

    pub fn with_defaults(mut self, defaults: MatchDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn spatial_options(&self) -> SpatialOptions {
        SpatialOptions {
            default_radius_km: self.defaults.default_radius_km,
        }
    }

    pub fn overlap_options(&self) -> OverlapOptions {
        OverlapOptions::anchored(self.reference_instant.date_naive())
            .with_horizon_days(self.defaults.horizon_days)
    }
}
