//! Derivation: present values computed by replaying accepted entries.
//!
//! `derive` is a left fold of [`Delta::apply`](crate::Delta::apply) over the entries of one
//! key, in sequence order, starting from `null`. Only entries effective at the query's
//! bitemporal coordinates take part, so the same prefix and the same `as_of` always give
//! the same value.

use serde_json::Value as JsonValue;

use flowmatch_core::{TemporalEnvelope, WatcherId};

use crate::delta::DeltaError;
use crate::effect::StateKey;
use crate::entry::AssertionEntry;
use crate::predicate::{PredicateOutcome, StatePredicate};
use crate::processor::StateView;
use crate::stream::EffectStream;

/// Fold entries (already filtered and ordered) into a value.
pub fn fold<'a>(entries: impl IntoIterator<Item = &'a AssertionEntry>) -> Result<JsonValue, DeltaError> {
    entries
        .into_iter()
        .try_fold(JsonValue::Null, |value, entry| entry.effect().delta.apply(value))
}

impl EffectStream {
    /// Entries targeting `key`, in sequence order, whatever their phase.
    pub fn history(&self, key: &StateKey) -> Vec<&AssertionEntry> {
        self.by_key
            .get(key)
            .map(|indices| indices.iter().map(|&i| &self.entries()[i]).collect())
            .unwrap_or_default()
    }

    pub fn derive(&self, key: &StateKey, as_of: &TemporalEnvelope) -> Result<JsonValue, DeltaError> {
        let Some(indices) = self.by_key.get(key) else {
            return Ok(JsonValue::Null);
        };
        let entries = self.entries();
        fold(
            indices
                .iter()
                .map(|&i| &entries[i])
                .filter(|e| e.effective_at(as_of)),
        )
    }

    /// Value as known now, for a valid time of now.
    pub fn derive_now(&self, key: &StateKey) -> Result<JsonValue, DeltaError> {
        self.derive(key, &TemporalEnvelope::at(self.now()))
    }

    pub fn evaluate_single_predicate(&self, predicate: &StatePredicate) -> PredicateOutcome {
        self.evaluate_with_value(predicate).1
    }

    /// Outcomes for every registered watcher whose predicate reads one of `keys`.
    pub fn evaluate_predicates(&self, keys: &[StateKey]) -> Vec<(WatcherId, PredicateOutcome)> {
        self.watchers
            .iter()
            .filter(|w| keys.contains(&w.predicate.key))
            .map(|w| (w.id, self.evaluate_single_predicate(&w.predicate)))
            .collect()
    }

    pub(crate) fn evaluate_with_value(&self, predicate: &StatePredicate) -> (Option<JsonValue>, PredicateOutcome) {
        match self.derive(&predicate.key, &predicate.as_of()) {
            Ok(value) => {
                let outcome = predicate.evaluate(&value);
                (Some(value), outcome)
            }
            Err(e) => (None, PredicateOutcome::Failed(e.to_string())),
        }
    }
}

impl StateView for EffectStream {
    fn derive(&self, key: &StateKey, as_of: &TemporalEnvelope) -> Result<JsonValue, DeltaError> {
        EffectStream::derive(self, key, as_of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::Delta;
    use crate::effect::Effect;
    use crate::phase::AssertionPhase;
    use crate::predicate::CompareOp;
    use chrono::{DateTime, TimeZone, Utc};
    use flowmatch_core::StreamId;
    use serde_json::json;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, 0, 0).unwrap()
    }

    fn accepted(s: &mut EffectStream, key: &StateKey, delta: Delta, h: u32) {
        let id = s
            .append(Effect::new(key.clone(), delta, TemporalEnvelope::at(t(h))))
            .unwrap()
            .id();
        s.transition_at(id, AssertionPhase::ACCEPTED, t(h)).unwrap();
    }

    #[test]
    fn fold_applies_deltas_in_sequence_order() {
        let mut s = EffectStream::new(StreamId::new());
        let key = StateKey::new("res-1", "tags");
        accepted(&mut s, &key, Delta::Append(json!("a")), 8);
        accepted(&mut s, &key, Delta::Set(json!(["z"])), 9);
        accepted(&mut s, &key, Delta::Append(json!("b")), 10);
        assert_eq!(s.derive(&key, &TemporalEnvelope::latest()).unwrap(), json!(["z", "b"]));
        assert_eq!(
            s.derive(&key, &TemporalEnvelope::as_of(t(8), t(23))).unwrap(),
            json!(["a"])
        );
    }

    #[test]
    fn unknown_keys_derive_to_null() {
        let s = EffectStream::new(StreamId::new());
        let key = StateKey::new("nobody", "nothing");
        assert_eq!(s.derive(&key, &TemporalEnvelope::latest()).unwrap(), JsonValue::Null);
        assert!(s.history(&key).is_empty());
    }

    #[test]
    fn incompatible_deltas_surface_as_errors() {
        let mut s = EffectStream::new(StreamId::new());
        let key = StateKey::new("res-1", "name");
        accepted(&mut s, &key, Delta::Set(json!("press")), 8);
        accepted(&mut s, &key, Delta::Increment(1.0), 9);
        assert!(matches!(
            s.derive(&key, &TemporalEnvelope::latest()),
            Err(DeltaError::TypeMismatch { .. })
        ));
        let p = StatePredicate::new(key, CompareOp::Eq, "press");
        assert!(matches!(s.evaluate_single_predicate(&p), PredicateOutcome::Failed(_)));
    }

    #[test]
    fn predicates_can_look_at_a_past_window() {
        let mut s = EffectStream::new(StreamId::new());
        let key = StateKey::new("res-1", "quantity");
        accepted(&mut s, &key, Delta::Increment(1.0), 8);
        accepted(&mut s, &key, Delta::Increment(1.0), 10);

        let now = StatePredicate::new(key.clone(), CompareOp::Eq, 2);
        let earlier = now.clone().within(TemporalEnvelope::at(t(9)));
        assert_eq!(s.evaluate_single_predicate(&now), PredicateOutcome::Satisfied);
        assert_eq!(s.evaluate_single_predicate(&earlier), PredicateOutcome::Unsatisfied);
    }
}
