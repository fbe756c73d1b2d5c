//! `flowmatch-core`: shared domain primitives.
//!
//! This crate contains **pure data** and validation (no IO, no clocks): identifiers,
//! the domain error model, the bitemporal/spatial envelopes carried by effects and the
//! timing/location attributes carried by schedulable slots.

pub mod availability;
pub mod envelope;
pub mod error;
pub mod id;
pub mod slot;

pub use availability::{AvailabilityWindow, DaySchedule, MonthSchedule, TimeRange, WeekSchedule};
pub use envelope::{SpatialEnvelope, TemporalEnvelope};
pub use error::{DomainError, DomainResult};
pub use id::{CompositeId, EffectId, StreamId, WatcherId};
pub use slot::{SlotLocation, SlotTiming};
