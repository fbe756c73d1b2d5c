//! Hexagonal index cells (H3).

use std::str::FromStr;

use h3o::{CellIndex, LatLng};

use crate::distance::haversine_km;

/// Parse a cell from its hex string form.
pub fn parse_cell(value: &str) -> Option<CellIndex> {
    CellIndex::from_str(value.trim()).ok()
}

/// Outcome of comparing two cells against a radius.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CellProximity {
    /// Same resolution: grid distance in rings against the rings the radius covers.
    Rings { distance: i32, allowed: i32 },
    /// Different resolutions (or no grid path): distance between cell centers.
    Centers { distance_km: f64 },
}

impl CellProximity {
    pub fn within(&self, radius_km: f64) -> bool {
        match *self {
            CellProximity::Rings { distance, allowed } => distance <= allowed,
            CellProximity::Centers { distance_km } => distance_km <= radius_km,
        }
    }
}

/// Rings of neighbours reachable within `radius_km` at the cell's resolution.
fn rings_for_radius(cell: CellIndex, radius_km: f64) -> i32 {
    // Adjacent hexagon centers are about sqrt(3) edge lengths apart.
    let spacing = cell.resolution().edge_length_km() * 3f64.sqrt();
    if spacing <= 0.0 {
        return 0;
    }
    (radius_km / spacing).ceil().clamp(0.0, i32::MAX as f64) as i32
}

fn center(cell: CellIndex) -> (f64, f64) {
    let ll = LatLng::from(cell);
    (ll.lat(), ll.lng())
}

pub fn cell_proximity(a: CellIndex, b: CellIndex, radius_km: f64) -> CellProximity {
    if a.resolution() == b.resolution() {
        if let Ok(distance) = a.grid_distance(b) {
            return CellProximity::Rings {
                distance,
                allowed: rings_for_radius(a, radius_km),
            };
        }
    }
    CellProximity::Centers {
        distance_km: haversine_km(center(a), center(b)),
    }
}
