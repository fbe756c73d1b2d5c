//! Bitemporal and spatial envelopes.
//!
//! Every effect carries a [`TemporalEnvelope`]: `valid_time` is when the change is asserted
//! to take effect, `known_time` is when it was recorded. The two are independent, which is
//! what makes replay auditable ("what did we believe at time K about time V?").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Bitemporal coordinates of an effect (or of a point-in-time query).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalEnvelope {
    pub valid_time: DateTime<Utc>,
    pub known_time: DateTime<Utc>,
    /// Optional end of the asserted validity (exclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl TemporalEnvelope {
    pub fn new(valid_time: DateTime<Utc>, known_time: DateTime<Utc>) -> Self {
        Self {
            valid_time,
            known_time,
            valid_until: None,
        }
    }

    /// Envelope where the change takes effect at the moment it is recorded.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self::new(instant, instant)
    }

    /// Query envelope: "as of valid time V, as known at K".
    pub fn as_of(valid_time: DateTime<Utc>, known_time: DateTime<Utc>) -> Self {
        Self::new(valid_time, known_time)
    }

    /// Query envelope that sees everything ever recorded.
    pub fn latest() -> Self {
        Self::new(DateTime::<Utc>::MAX_UTC, DateTime::<Utc>::MAX_UTC)
    }

    pub fn with_valid_until(mut self, until: DateTime<Utc>) -> Self {
        self.valid_until = Some(until);
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if let Some(until) = self.valid_until {
            if until <= self.valid_time {
                return Err(DomainError::validation(format!(
                    "valid_until ({until}) must be after valid_time ({})",
                    self.valid_time
                )));
            }
        }
        Ok(())
    }

    /// Whether this envelope is visible to a query made with `as_of`.
    pub fn visible_at(&self, as_of: &TemporalEnvelope) -> bool {
        self.valid_time <= as_of.valid_time && self.known_time <= as_of.known_time
    }
}

/// Where an effect applies (or the place a metabolism query looks at).
///
/// Either a coordinate pair, a hexagonal index cell, or both. `radius_km` widens a
/// coordinate into a disc.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialEnvelope {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub cell: Option<String>,
    #[serde(default)]
    pub radius_km: Option<f64>,
}

impl SpatialEnvelope {
    pub fn point(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Self::default()
        }
    }

    pub fn cell(cell: impl Into<String>) -> Self {
        Self {
            cell: Some(cell.into()),
            ..Self::default()
        }
    }

    pub fn with_radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = Some(radius_km);
        self
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                    return Err(DomainError::validation(format!("latitude out of range: {lat}")));
                }
                if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                    return Err(DomainError::validation(format!("longitude out of range: {lon}")));
                }
            }
            (None, None) => {}
            _ => {
                return Err(DomainError::validation(
                    "latitude and longitude must be provided together",
                ));
            }
        }

        if let Some(cell) = &self.cell {
            if cell.trim().is_empty() {
                return Err(DomainError::validation("spatial cell cannot be empty"));
            }
        }

        if let Some(r) = self.radius_km {
            if !r.is_finite() || r < 0.0 {
                return Err(DomainError::validation(format!("radius_km must be >= 0 (got {r})")));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn valid_until_must_follow_valid_time() {
        let env = TemporalEnvelope::new(t(10), t(10)).with_valid_until(t(9));
        assert!(matches!(env.validate(), Err(DomainError::Validation(_))));

        let env = TemporalEnvelope::new(t(10), t(10)).with_valid_until(t(11));
        assert!(env.validate().is_ok());
    }

    #[test]
    fn visibility_is_bitemporal() {
        let env = TemporalEnvelope::new(t(8), t(12));
        // Valid early enough but recorded after the query's knowledge horizon.
        assert!(!env.visible_at(&TemporalEnvelope::as_of(t(9), t(11))));
        assert!(env.visible_at(&TemporalEnvelope::as_of(t(9), t(12))));
        assert!(!env.visible_at(&TemporalEnvelope::as_of(t(7), t(23))));
    }

    #[test]
    fn half_specified_coordinates_are_rejected() {
        let env = SpatialEnvelope {
            latitude: Some(10.0),
            ..SpatialEnvelope::default()
        };
        assert!(env.validate().is_err());
        assert!(SpatialEnvelope::point(91.0, 0.0).validate().is_err());
        assert!(SpatialEnvelope::point(45.0, 7.0).with_radius_km(-1.0).validate().is_err());
        assert!(SpatialEnvelope::point(45.0, 7.0).with_radius_km(5.0).validate().is_ok());
    }
}
