//! Location compatibility ladder.
//!
//! Order of evaluation:
//! 1. both sides carry a hex cell → cell proximity within the larger declared radius;
//! 2. either side has no location data at all → compatible (optimistic);
//! 3. either side is online/remote → compatible;
//! 4. same country → compatible;
//! 5. same city → compatible;
//! 6. both sides have coordinates → haversine distance within the larger radius;
//! 7. both sides had data that did not match above → incompatible;
//! 8. otherwise → compatible (optimistic).

use serde::{Deserialize, Serialize};
use tracing::debug;

use flowmatch_core::{SlotLocation, SpatialEnvelope};

use crate::cell::{cell_proximity, parse_cell};
use crate::distance::haversine_km;

/// Radius applied when a slot declares none.
pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 50.0;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SpatialOptions {
    pub default_radius_km: f64,
}

impl Default for SpatialOptions {
    fn default() -> Self {
        Self {
            default_radius_km: DEFAULT_SEARCH_RADIUS_KM,
        }
    }
}

impl SpatialOptions {
    fn radius(&self, a: &SlotLocation, b: &SlotLocation) -> f64 {
        let declared = |l: &SlotLocation| {
            l.search_radius_km
                .filter(|r| r.is_finite() && *r >= 0.0)
                .unwrap_or(self.default_radius_km)
        };
        declared(a).max(declared(b))
    }
}

/// Which rung of the ladder decided the comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum LocationVerdict {
    CellProximity { compatible: bool, radius_km: f64 },
    MissingData,
    Remote,
    SameCountry,
    SameCity,
    WithinRadius { compatible: bool, distance_km: f64, radius_km: f64 },
    Mismatch,
}

impl LocationVerdict {
    pub fn is_compatible(&self) -> bool {
        match self {
            LocationVerdict::CellProximity { compatible, .. }
            | LocationVerdict::WithinRadius { compatible, .. } => *compatible,
            LocationVerdict::Mismatch => false,
            LocationVerdict::MissingData
            | LocationVerdict::Remote
            | LocationVerdict::SameCountry
            | LocationVerdict::SameCity => true,
        }
    }
}

fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x.eq_ignore_ascii_case(y))
}

pub fn assess_locations(a: &SlotLocation, b: &SlotLocation, opts: &SpatialOptions) -> LocationVerdict {
    let radius_km = opts.radius(a, b);

    if let (Some(ca), Some(cb)) = (a.cell(), b.cell()) {
        match (parse_cell(ca), parse_cell(cb)) {
            (Some(ca), Some(cb)) => {
                let proximity = cell_proximity(ca, cb, radius_km);
                return LocationVerdict::CellProximity {
                    compatible: proximity.within(radius_km),
                    radius_km,
                };
            }
            _ => debug!(a = ca, b = cb, "unparseable spatial cell; falling back to coordinates"),
        }
    }

    if !a.has_location_data() || !b.has_location_data() {
        return LocationVerdict::MissingData;
    }
    if a.is_remote() || b.is_remote() {
        return LocationVerdict::Remote;
    }
    if same_text(a.country(), b.country()) {
        return LocationVerdict::SameCountry;
    }
    if same_text(a.city(), b.city()) {
        return LocationVerdict::SameCity;
    }
    if let (Some(pa), Some(pb)) = (a.coordinates(), b.coordinates()) {
        let distance_km = haversine_km(pa, pb);
        return LocationVerdict::WithinRadius {
            compatible: distance_km <= radius_km,
            distance_km,
            radius_km,
        };
    }

    // Both sides carry location data that matched on no rung.
    LocationVerdict::Mismatch
}

pub fn locations_compatible(a: &SlotLocation, b: &SlotLocation, opts: &SpatialOptions) -> bool {
    assess_locations(a, b, opts).is_compatible()
}

/// Whether `point` lies inside `place`.
///
/// An empty `place` covers everything. Cells match by proximity within the place radius,
/// coordinates by distance within it (radius `0` means the exact point).
pub fn envelope_contains(place: &SpatialEnvelope, point: &SpatialEnvelope) -> bool {
    let radius_km = place.radius_km.unwrap_or(0.0);
    if place.cell.is_none() && place.coordinates().is_none() {
        return true;
    }

    if let (Some(pc), Some(qc)) = (place.cell.as_deref(), point.cell.as_deref()) {
        if pc.trim() == qc.trim() {
            return true;
        }
        if let (Some(pc), Some(qc)) = (parse_cell(pc), parse_cell(qc)) {
            return cell_proximity(pc, qc, radius_km).within(radius_km);
        }
    }

    match (place.coordinates(), point.coordinates()) {
        (Some(p), Some(q)) => haversine_km(p, q) <= radius_km,
        _ => false,
    }
}
