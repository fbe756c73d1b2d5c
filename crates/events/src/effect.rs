//! Effects: immutable, proposed state changes.

use serde::{Deserialize, Serialize};

use flowmatch_core::{
    CompositeId, DomainError, DomainResult, EffectId, SpatialEnvelope, TemporalEnvelope,
};

use crate::delta::Delta;
use crate::phase::AssertionPhase;

/// Derivation index key: one attribute of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub entity: String,
    pub attribute: String,
}

impl StateKey {
    pub fn new(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }
}

impl core::fmt::Display for StateKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.entity, self.attribute)
    }
}

/// A proposed change to one attribute.
///
/// Effects are never edited after append; a correction is a new effect that `supersedes`
/// the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub id: EffectId,
    pub target: StateKey,
    pub delta: Delta,
    pub temporal: TemporalEnvelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial: Option<SpatialEnvelope>,
    /// Phase the effect enters the stream with (`projected` or `pending`).
    #[serde(default = "default_phase")]
    pub phase: AssertionPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<EffectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<CompositeId>,
}

fn default_phase() -> AssertionPhase {
    AssertionPhase::Pending
}

impl Effect {
    /// A submitted (`pending`) effect with a fresh id.
    pub fn new(target: StateKey, delta: Delta, temporal: TemporalEnvelope) -> Self {
        Self {
            id: EffectId::new(),
            target,
            delta,
            temporal,
            spatial: None,
            phase: AssertionPhase::Pending,
            supersedes: None,
            composite: None,
        }
    }

    pub fn with_id(mut self, id: EffectId) -> Self {
        self.id = id;
        self
    }

    pub fn with_spatial(mut self, spatial: SpatialEnvelope) -> Self {
        self.spatial = Some(spatial);
        self
    }

    /// Speculative effect: recorded but not yet submitted for judgment.
    pub fn projected(mut self) -> Self {
        self.phase = AssertionPhase::Projected;
        self
    }

    /// Envelope checks; a failing effect never enters the stream.
    pub fn validate(&self) -> DomainResult<()> {
        if self.target.entity.trim().is_empty() {
            return Err(DomainError::validation("effect target entity cannot be empty"));
        }
        if self.target.attribute.trim().is_empty() {
            return Err(DomainError::validation("effect target attribute cannot be empty"));
        }
        if let Delta::Increment(n) = self.delta {
            if !n.is_finite() {
                return Err(DomainError::validation(format!("increment must be finite (got {n})")));
            }
        }
        if let Delta::Remove(field) = &self.delta {
            if field.is_empty() {
                return Err(DomainError::validation("remove needs a field name"));
            }
        }
        self.temporal.validate()?;
        if let Some(spatial) = &self.spatial {
            spatial.validate()?;
        }
        Ok(())
    }
}

/// Effects that must be judged atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeEffect {
    pub id: CompositeId,
    pub effects: Vec<Effect>,
}

impl CompositeEffect {
    pub fn new(effects: Vec<Effect>) -> Self {
        Self {
            id: CompositeId::new(),
            effects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn effect() -> Effect {
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
        Effect::new(StateKey::new("res-1", "quantity"), Delta::Increment(2.0), TemporalEnvelope::at(at))
    }

    #[test]
    fn well_formed_effect_validates() {
        assert!(effect().validate().is_ok());
    }

    #[test]
    fn malformed_envelopes_are_rejected() {
        let mut e = effect();
        e.target.attribute = " ".into();
        assert!(matches!(e.validate(), Err(DomainError::Validation(_))));

        let e = effect().with_spatial(SpatialEnvelope::point(123.0, 0.0));
        assert!(e.validate().is_err());

        let mut e = effect();
        e.temporal = e.temporal.with_valid_until(e.temporal.valid_time);
        assert!(e.validate().is_err());

        let mut e = effect();
        e.delta = Delta::Increment(f64::NAN);
        assert!(e.validate().is_err());
    }
}
