use chrono::{DateTime, Utc};
use serde::Serialize;

use flowmatch_core::{EffectId, StreamId, TemporalEnvelope};

use crate::effect::Effect;
use crate::phase::{AssertionPhase, PhaseChange};

/// The stream's physical record: an effect plus its position and phase history.
///
/// Entries are never removed or edited in place; a phase change appends to `history`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionEntry {
    stream_id: StreamId,
    sequence: u64,
    effect: Effect,
    history: Vec<PhaseChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    superseded_by: Option<EffectId>,
}

impl AssertionEntry {
    pub(crate) fn new(stream_id: StreamId, sequence: u64, effect: Effect, first: PhaseChange) -> Self {
        Self {
            stream_id,
            sequence,
            effect,
            history: vec![first],
            superseded_by: None,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    pub fn id(&self) -> EffectId {
        self.effect.id
    }

    pub fn history(&self) -> &[PhaseChange] {
        &self.history
    }

    pub fn superseded_by(&self) -> Option<EffectId> {
        self.superseded_by
    }

    /// Current phase.
    pub fn phase(&self) -> AssertionPhase {
        self.last_change().phase
    }

    pub(crate) fn last_change(&self) -> PhaseChange {
        // history is never empty: `new` seeds it and nothing removes from it.
        self.history[self.history.len() - 1]
    }

    /// Phase in force for an observer who knows everything recorded up to `known`.
    ///
    /// `None` when the entry itself was not yet recorded at `known`.
    pub fn phase_at(&self, known: DateTime<Utc>) -> Option<AssertionPhase> {
        self.history
            .iter()
            .take_while(|c| c.recorded_at <= known)
            .last()
            .map(|c| c.phase)
    }

    /// Whether this entry contributes to a derivation made with `as_of`.
    ///
    /// Requires bitemporal visibility, an accepted/propagated phase as of `as_of.known_time`,
    /// and (if the effect declares `valid_until`) that it has not expired by `as_of.valid_time`.
    pub fn effective_at(&self, as_of: &TemporalEnvelope) -> bool {
        let temporal = &self.effect.temporal;
        if !temporal.visible_at(as_of) {
            return false;
        }
        if temporal.valid_until.is_some_and(|until| until <= as_of.valid_time) {
            return false;
        }
        self.phase_at(as_of.known_time).is_some_and(AssertionPhase::is_effective)
    }

    pub(crate) fn push(&mut self, change: PhaseChange) {
        self.history.push(change);
    }

    pub(crate) fn mark_superseded(&mut self, by: EffectId) {
        self.superseded_by = Some(by);
    }
}
