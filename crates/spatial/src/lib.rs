//! Spatial compatibility between slots and containment for spatial envelopes.

pub mod cell;
pub mod distance;
pub mod proximity;

pub use cell::{CellProximity, cell_proximity, parse_cell};
pub use distance::{EARTH_RADIUS_KM, haversine_km};
pub use proximity::{
    DEFAULT_SEARCH_RADIUS_KM, LocationVerdict, SpatialOptions, assess_locations, envelope_contains,
    locations_compatible,
};
