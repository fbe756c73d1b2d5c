//! Metabolism: aggregate flow of a quantity through a space-time window.
//!
//! Unlike `derive`, which answers "what is the value", a metabolism query answers "how much
//! moved through place P between `from` and `until`", as a total and as a rate per hour.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flowmatch_core::{DomainError, SpatialEnvelope, TemporalEnvelope};
use flowmatch_spatial::envelope_contains;

use crate::effect::StateKey;
use crate::error::StreamResult;
use crate::stream::EffectStream;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetabolismQuery {
    pub key: StateKey,
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
    /// Knowledge cut-off; everything recorded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_as_of: Option<DateTime<Utc>>,
    /// Where to measure. An empty envelope covers every location.
    #[serde(default)]
    pub place: SpatialEnvelope,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub total: f64,
    pub hours: f64,
    pub rate_per_hour: f64,
    /// Entries that contributed to `total`.
    pub contributing: usize,
}

impl EffectStream {
    pub fn metabolism(&self, query: &MetabolismQuery) -> StreamResult<Flow> {
        if query.until <= query.from {
            return Err(DomainError::validation(format!(
                "metabolism window must end after it starts ({} .. {})",
                query.from, query.until
            ))
            .into());
        }
        query.place.validate()?;

        let known = query.known_as_of.unwrap_or(DateTime::<Utc>::MAX_UTC);
        // Same visibility as a derivation taken at the end of the window.
        let as_of = TemporalEnvelope::as_of(query.until, known);
        let anywhere = SpatialEnvelope::default();

        let mut total = 0.0;
        let mut contributing = 0;
        for entry in self.history(&query.key) {
            let effect = entry.effect();
            let Some(amount) = effect.delta.flow_amount() else {
                continue;
            };
            let valid = effect.temporal.valid_time;
            if valid < query.from || valid >= query.until || !entry.effective_at(&as_of) {
                continue;
            }
            if !envelope_contains(&query.place, effect.spatial.as_ref().unwrap_or(&anywhere)) {
                continue;
            }
            total += amount;
            contributing += 1;
        }

        let hours = (query.until - query.from).num_milliseconds() as f64 / 3_600_000.0;
        Ok(Flow {
            total,
            hours,
            rate_per_hour: if hours > 0.0 { total / hours } else { 0.0 },
            contributing,
        })
    }
}
