//! The effect stream: an append-only, totally ordered log of assertion entries.
//!
//! Writes take `&mut self` and are therefore serialized per stream; reads (derivation,
//! history, records) take `&self`. Every write either commits completely (entries,
//! journal, watcher notifications) or leaves the stream untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use flowmatch_core::{CompositeId, DomainError, EffectId, StreamId, WatcherId};

use crate::clock::{Clock, SystemClock};
use crate::effect::{CompositeEffect, Effect, StateKey};
use crate::entry::AssertionEntry;
use crate::error::{StreamError, StreamResult};
use crate::phase::{AssertionPhase, PhaseChange};
use crate::predicate::StatePredicate;
use crate::processor::PhaseProcessor;
use crate::record::{ReplayCursor, StreamRecord};
use crate::subscription::WatcherHandle;
use crate::watcher::{WatcherNotification, WatcherRegistry};

pub const DEFAULT_WATCHER_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Buffered notifications per watcher before new ones are dropped.
    pub watcher_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            watcher_capacity: DEFAULT_WATCHER_CAPACITY,
        }
    }
}

pub struct EffectStream {
    id: StreamId,
    config: StreamConfig,
    clock: Arc<dyn Clock>,
    entries: Vec<AssertionEntry>,
    positions: HashMap<EffectId, usize>,
    pub(crate) by_key: HashMap<StateKey, Vec<usize>>,
    composites: HashMap<CompositeId, Vec<EffectId>>,
    processors: Vec<Box<dyn PhaseProcessor>>,
    pub(crate) watchers: WatcherRegistry,
    journal: Vec<StreamRecord>,
}

impl core::fmt::Debug for EffectStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EffectStream")
            .field("id", &self.id)
            .field("entries", &self.entries.len())
            .field("composites", &self.composites.len())
            .field("processors", &self.processors.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("watchers", &self.watchers.len())
            .field("records", &self.journal.len())
            .finish()
    }
}

impl EffectStream {
    pub fn new(id: StreamId) -> Self {
        Self::with_config(id, StreamConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(id: StreamId, config: StreamConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            id,
            config,
            clock,
            entries: Vec::new(),
            positions: HashMap::new(),
            by_key: HashMap::new(),
            composites: HashMap::new(),
            processors: Vec::new(),
            watchers: WatcherRegistry::default(),
            journal: Vec::new(),
        }
    }

    pub fn with_processor(mut self, processor: impl PhaseProcessor + 'static) -> Self {
        self.add_processor(Box::new(processor));
        self
    }

    pub fn add_processor(&mut self, processor: Box<dyn PhaseProcessor>) {
        debug!(stream = %self.id, processor = processor.name(), "processor registered");
        self.processors.push(processor);
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in sequence order.
    pub fn entries(&self) -> &[AssertionEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EffectId) -> Option<&AssertionEntry> {
        self.positions.get(&id).map(|&i| &self.entries[i])
    }

    pub fn composite_members(&self, id: CompositeId) -> Option<&[EffectId]> {
        self.composites.get(&id).map(Vec::as_slice)
    }

    /// Records with a position greater than `position`.
    pub fn records_since(&self, position: u64) -> &[StreamRecord] {
        let start = self.journal.partition_point(|r| r.position() <= position);
        &self.journal[start..]
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn last_position(&self) -> u64 {
        self.journal.last().map_or(0, StreamRecord::position)
    }

    // ---- writes ---------------------------------------------------------------------

    /// Append a single effect in the `projected` or `pending` phase.
    pub fn append(&mut self, effect: Effect) -> StreamResult<AssertionEntry> {
        if effect.composite.is_some() {
            return Err(DomainError::validation("composite members are appended with append_composite").into());
        }
        Self::check_submitted(&effect)?;
        self.check_new(&effect)?;

        let idx = self.insert(effect, None);
        Ok(self.entries[idx].clone())
    }

    /// Append every member of a composite, or none of them.
    pub fn append_composite(&mut self, composite: CompositeEffect) -> StreamResult<Vec<AssertionEntry>> {
        let CompositeEffect { id, effects } = composite;
        if effects.is_empty() {
            return Err(DomainError::validation("composite effect has no members").into());
        }
        if self.composites.contains_key(&id) {
            return Err(DomainError::validation(format!("composite {id} already appended")).into());
        }
        for (i, effect) in effects.iter().enumerate() {
            if effect.composite.is_some_and(|c| c != id) {
                return Err(DomainError::validation(format!(
                    "effect {} already belongs to another composite",
                    effect.id
                ))
                .into());
            }
            if effects[..i].iter().any(|e| e.id == effect.id) {
                return Err(StreamError::DuplicateEffect(effect.id));
            }
            Self::check_submitted(effect)?;
            self.check_new(effect)?;
        }

        let members: Vec<EffectId> = effects.iter().map(|e| e.id).collect();
        let appended: Vec<AssertionEntry> = effects
            .into_iter()
            .map(|mut effect| {
                effect.composite = Some(id);
                let idx = self.insert(effect, None);
                self.entries[idx].clone()
            })
            .collect();
        self.composites.insert(id, members);
        Ok(appended)
    }

    /// Move an entry along the phase graph, recording the change at the clock's `now`.
    pub fn transition(&mut self, id: EffectId, phase: AssertionPhase) -> StreamResult<AssertionEntry> {
        let at = self.clock.now();
        self.transition_at(id, phase, at)
    }

    /// Move an entry along the phase graph, recording the change at `recorded_at`.
    ///
    /// `judged(modified)` is only reachable through [`EffectStream::modify`].
    pub fn transition_at(
        &mut self,
        id: EffectId,
        phase: AssertionPhase,
        recorded_at: DateTime<Utc>,
    ) -> StreamResult<AssertionEntry> {
        let idx = self.index_of(id)?;
        if let Some(composite) = self.entries[idx].effect().composite {
            return Err(StreamError::CompositeMember { effect: id, composite });
        }
        self.reject_direct_modify(idx, phase)?;
        self.check_move(idx, phase, recorded_at)?;
        self.run_processors(&self.entries[idx], phase)?;

        self.commit_change(idx, PhaseChange { phase, recorded_at });
        self.notify(&[idx]);
        Ok(self.entries[idx].clone())
    }

    pub fn transition_composite(
        &mut self,
        id: CompositeId,
        phase: AssertionPhase,
    ) -> StreamResult<Vec<AssertionEntry>> {
        let at = self.clock.now();
        self.transition_composite_at(id, phase, at)
    }

    /// Judge all members of a composite together: every move and every processor check
    /// must pass before any member changes.
    pub fn transition_composite_at(
        &mut self,
        id: CompositeId,
        phase: AssertionPhase,
        recorded_at: DateTime<Utc>,
    ) -> StreamResult<Vec<AssertionEntry>> {
        let members = self
            .composites
            .get(&id)
            .ok_or(StreamError::UnknownComposite(id))?;
        let indices = members
            .iter()
            .map(|m| self.index_of(*m))
            .collect::<StreamResult<Vec<_>>>()?;

        for &idx in &indices {
            self.reject_direct_modify(idx, phase)?;
            self.check_move(idx, phase, recorded_at)?;
        }
        for &idx in &indices {
            self.run_processors(&self.entries[idx], phase)?;
        }

        for &idx in &indices {
            self.commit_change(idx, PhaseChange { phase, recorded_at });
        }
        info!(stream = %self.id, composite = %id, %phase, members = indices.len(), "composite judged");
        self.notify(&indices);
        Ok(indices.iter().map(|&i| self.entries[i].clone()).collect())
    }

    pub fn modify(&mut self, id: EffectId, replacement: Effect) -> StreamResult<AssertionEntry> {
        let at = self.clock.now();
        self.modify_at(id, replacement, at)
    }

    /// Judge a pending entry `modified` and append `replacement` in its place.
    ///
    /// The original stays in the stream (it simply never becomes effective); the
    /// replacement carries `supersedes` and enters already `judged(accepted)`.
    pub fn modify_at(
        &mut self,
        id: EffectId,
        mut replacement: Effect,
        recorded_at: DateTime<Utc>,
    ) -> StreamResult<AssertionEntry> {
        let idx = self.index_of(id)?;
        let original = &self.entries[idx];
        if let Some(composite) = original.effect().composite {
            return Err(StreamError::CompositeMember { effect: id, composite });
        }
        if original.effect().target != replacement.target {
            return Err(DomainError::validation(format!(
                "replacement targets {} but the original targets {}",
                replacement.target,
                original.effect().target
            ))
            .into());
        }
        replacement.supersedes = Some(id);
        replacement.composite = None;
        replacement.phase = AssertionPhase::ACCEPTED;

        self.check_move(idx, AssertionPhase::MODIFIED, recorded_at)?;
        self.check_new(&replacement)?;
        let provisional = AssertionEntry::new(
            self.id,
            self.entries.len() as u64 + 1,
            replacement.clone(),
            PhaseChange {
                phase: AssertionPhase::ACCEPTED,
                recorded_at,
            },
        );
        self.run_processors(&self.entries[idx], AssertionPhase::MODIFIED)?;
        self.run_processors(&provisional, AssertionPhase::ACCEPTED)?;

        self.commit_change(
            idx,
            PhaseChange {
                phase: AssertionPhase::MODIFIED,
                recorded_at,
            },
        );
        let new_idx = self.insert(replacement, Some(recorded_at));
        let new_id = self.entries[new_idx].id();
        self.entries[idx].mark_superseded(new_id);
        info!(stream = %self.id, original = %id, replacement = %new_id, "effect modified");
        self.notify(&[new_idx]);
        Ok(self.entries[new_idx].clone())
    }

    // ---- watchers -------------------------------------------------------------------

    /// Register a predicate; it is re-evaluated after every phase change on its key.
    pub fn subscribe(&mut self, predicate: StatePredicate) -> WatcherHandle {
        self.watchers.register(predicate, self.config.watcher_capacity)
    }

    pub fn unsubscribe(&mut self, id: WatcherId) -> bool {
        self.watchers.remove(id)
    }

    // ---- replay ---------------------------------------------------------------------

    /// Cold-start a stream from its records.
    ///
    /// Records must belong to `id` and arrive in strictly increasing position order.
    /// Processors are not consulted (the recorded decisions already passed them) but the
    /// phase graph is, so a corrupted log fails instead of producing a different history.
    pub fn from_records<'a>(
        id: StreamId,
        records: impl IntoIterator<Item = &'a StreamRecord>,
        config: StreamConfig,
        clock: Arc<dyn Clock>,
    ) -> StreamResult<Self> {
        let mut stream = Self::with_config(id, config, clock);
        let mut cursor = ReplayCursor::new(id);
        for record in records {
            cursor.advance(record)?;
            stream.replay(record)?;
        }
        debug!(stream = %id, entries = stream.entries.len(), position = cursor.last_position(), "stream restored");
        Ok(stream)
    }

    fn replay(&mut self, record: &StreamRecord) -> StreamResult<()> {
        match record {
            StreamRecord::Appended { sequence, effect, change, .. } => {
                let expected = self.entries.len() as u64 + 1;
                if *sequence != expected {
                    return Err(StreamError::NonMonotonicSequence {
                        last: expected - 1,
                        found: *sequence,
                    });
                }
                if self.positions.contains_key(&effect.id) {
                    return Err(StreamError::DuplicateEffect(effect.id));
                }
                effect.validate()?;

                self.push_entry(effect.clone(), *change);
                if let Some(composite) = effect.composite {
                    self.composites.entry(composite).or_default().push(effect.id);
                }
                if let Some(original) = effect.supersedes {
                    let orig = self.index_of(original)?;
                    self.entries[orig].mark_superseded(effect.id);
                }
                self.journal.push(record.clone());
            }
            StreamRecord::Transitioned { effect_id, change, .. } => {
                let idx = self.index_of(*effect_id)?;
                self.check_move(idx, change.phase, change.recorded_at)?;
                self.entries[idx].push(*change);
                self.journal.push(record.clone());
            }
        }
        Ok(())
    }

    // ---- internals ------------------------------------------------------------------

    fn index_of(&self, id: EffectId) -> StreamResult<usize> {
        self.positions.get(&id).copied().ok_or(StreamError::UnknownEntry(id))
    }

    fn check_new(&self, effect: &Effect) -> StreamResult<()> {
        effect.validate()?;
        if self.positions.contains_key(&effect.id) {
            return Err(StreamError::DuplicateEffect(effect.id));
        }
        Ok(())
    }

    /// Caller-supplied effects start unjudged and never supersede anything.
    fn check_submitted(effect: &Effect) -> StreamResult<()> {
        if effect.supersedes.is_some() {
            return Err(DomainError::validation("superseding effects are appended through modify").into());
        }
        if !matches!(effect.phase, AssertionPhase::Projected | AssertionPhase::Pending) {
            return Err(DomainError::validation(format!(
                "effects enter the stream projected or pending, not {}",
                effect.phase
            ))
            .into());
        }
        Ok(())
    }

    fn check_move(&self, idx: usize, to: AssertionPhase, recorded_at: DateTime<Utc>) -> StreamResult<()> {
        let entry = &self.entries[idx];
        let last = entry.last_change();
        let from = last.phase;
        if !from.can_transition_to(to) {
            return Err(StreamError::InvalidTransition { effect: entry.id(), from, to });
        }
        if recorded_at < last.recorded_at {
            return Err(DomainError::validation(format!(
                "phase change for {} recorded at {recorded_at}, before the previous change at {}",
                entry.id(),
                last.recorded_at
            ))
            .into());
        }
        Ok(())
    }

    fn reject_direct_modify(&self, idx: usize, to: AssertionPhase) -> StreamResult<()> {
        if to == AssertionPhase::MODIFIED {
            let entry = &self.entries[idx];
            return Err(StreamError::InvalidTransition {
                effect: entry.id(),
                from: entry.phase(),
                to,
            });
        }
        Ok(())
    }

    fn run_processors(&self, entry: &AssertionEntry, target: AssertionPhase) -> StreamResult<()> {
        for processor in &self.processors {
            if let Err(reason) = processor.check(entry, target, self) {
                warn!(
                    stream = %self.id,
                    effect = %entry.id(),
                    processor = processor.name(),
                    %target,
                    %reason,
                    "transition vetoed"
                );
                return Err(StreamError::ProcessorRejected {
                    processor: processor.name().to_string(),
                    effect: entry.id(),
                    reason,
                });
            }
        }
        Ok(())
    }

    fn next_position(&self) -> u64 {
        self.last_position() + 1
    }

    fn push_entry(&mut self, effect: Effect, change: PhaseChange) -> usize {
        let idx = self.entries.len();
        let sequence = idx as u64 + 1;
        self.positions.insert(effect.id, idx);
        self.by_key.entry(effect.target.clone()).or_default().push(idx);
        self.entries.push(AssertionEntry::new(self.id, sequence, effect, change));
        idx
    }

    /// Insert a checked effect and journal it. `accepted_at` marks a replacement entering
    /// already accepted; otherwise the effect's own phase is recorded at its `known_time`.
    fn insert(&mut self, effect: Effect, accepted_at: Option<DateTime<Utc>>) -> usize {
        let change = match accepted_at {
            Some(recorded_at) => PhaseChange {
                phase: AssertionPhase::ACCEPTED,
                recorded_at,
            },
            None => PhaseChange {
                phase: effect.phase,
                recorded_at: effect.temporal.known_time,
            },
        };
        let position = self.next_position();
        let record_effect = effect.clone();
        let idx = self.push_entry(effect, change);
        debug!(stream = %self.id, effect = %record_effect.id, key = %record_effect.target, phase = %change.phase, "effect appended");
        self.journal.push(StreamRecord::Appended {
            stream_id: self.id,
            position,
            sequence: idx as u64 + 1,
            effect: record_effect,
            change,
        });
        idx
    }

    fn commit_change(&mut self, idx: usize, change: PhaseChange) {
        let position = self.next_position();
        let entry = &mut self.entries[idx];
        entry.push(change);
        debug!(stream = %self.id, effect = %entry.id(), phase = %change.phase, "phase changed");
        self.journal.push(StreamRecord::Transitioned {
            stream_id: self.id,
            position,
            effect_id: entry.id(),
            change,
        });
    }

    /// Evaluate the predicates reading any key touched by `indices` and deliver the results.
    ///
    /// Runs on the writer's call stack; predicate failures are delivered, never returned.
    fn notify(&mut self, indices: &[usize]) {
        if self.watchers.is_empty() {
            return;
        }
        let mut notifications = Vec::new();
        for &idx in indices {
            let entry = &self.entries[idx];
            let key = &entry.effect().target;
            for watcher in self.watchers.iter().filter(|w| &w.predicate.key == key) {
                let (value, outcome) = self.evaluate_with_value(&watcher.predicate);
                notifications.push(WatcherNotification {
                    watcher: watcher.id,
                    predicate: watcher.predicate.clone(),
                    trigger: entry.id(),
                    phase: entry.phase(),
                    value,
                    outcome,
                });
            }
        }
        self.watchers.deliver(notifications);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::delta::Delta;
    use crate::predicate::{CompareOp, PredicateOutcome};
    use crate::processor::NonNegativeGuard;
    use chrono::TimeZone;
    use flowmatch_core::TemporalEnvelope;
    use proptest::prelude::*;
    use serde_json::{Value as JsonValue, json};

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap()
    }

    fn key() -> StateKey {
        StateKey::new("res-1", "quantity")
    }

    fn inc(n: f64, h: u32) -> Effect {
        Effect::new(key(), Delta::Increment(n), TemporalEnvelope::at(t(h)))
    }

    fn stream_with(config: StreamConfig) -> EffectStream {
        EffectStream::with_config(StreamId::new(), config, Arc::new(ManualClock::new(t(12))))
    }

    fn stream() -> EffectStream {
        stream_with(StreamConfig::default())
    }

    fn latest(s: &EffectStream, k: &StateKey) -> JsonValue {
        s.derive(k, &TemporalEnvelope::latest()).unwrap()
    }

    #[test]
    fn only_accepted_entries_are_derived() {
        let mut s = stream();
        let a = s.append(inc(2.0, 8)).unwrap().id();
        let b = s.append(inc(3.0, 9)).unwrap().id();
        s.append(inc(4.0, 9)).unwrap();
        s.transition(a, AssertionPhase::ACCEPTED).unwrap();
        s.transition(b, AssertionPhase::ACCEPTED).unwrap();
        s.transition(b, AssertionPhase::Propagated).unwrap();

        assert_eq!(latest(&s, &key()), json!(5));
        assert_eq!(s.derive_now(&key()).unwrap(), json!(5));
        assert_eq!(s.len(), 3);
        assert_eq!(s.history(&key()).len(), 3);
        assert_eq!(s.entries()[2].sequence(), 3);
    }

    #[test]
    fn malformed_effects_never_enter_the_stream() {
        let mut s = stream();
        let mut bad = inc(1.0, 8);
        bad.target.entity.clear();
        assert!(matches!(s.append(bad), Err(StreamError::Validation(_))));

        let judged = Effect {
            phase: AssertionPhase::ACCEPTED,
            ..inc(1.0, 8)
        };
        assert!(matches!(s.append(judged), Err(StreamError::Validation(_))));
        assert!(s.is_empty());
        assert_eq!(s.last_position(), 0);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut s = stream();
        let e = inc(1.0, 8);
        s.append(e.clone()).unwrap();
        assert_eq!(s.append(e.clone()), Err(StreamError::DuplicateEffect(e.id)));
    }

    #[test]
    fn invalid_transitions_leave_the_stream_unchanged() {
        let mut s = stream();
        let id = s.append(inc(1.0, 8)).unwrap().id();
        s.transition_at(id, AssertionPhase::ACCEPTED, t(9)).unwrap();
        let before = s.records_since(0).len();

        let err = s.transition_at(id, AssertionPhase::Pending, t(10)).unwrap_err();
        assert_eq!(
            err,
            StreamError::InvalidTransition {
                effect: id,
                from: AssertionPhase::ACCEPTED,
                to: AssertionPhase::Pending
            }
        );
        assert_eq!(s.entry(id).unwrap().history().len(), 2);
        assert_eq!(s.records_since(0).len(), before);
        assert_eq!(latest(&s, &key()), json!(1));

        let projected = s.append(inc(1.0, 8).projected()).unwrap().id();
        assert!(matches!(
            s.transition(projected, AssertionPhase::ACCEPTED),
            Err(StreamError::InvalidTransition { .. })
        ));
        let missing = EffectId::new();
        assert_eq!(s.transition(missing, AssertionPhase::Pending), Err(StreamError::UnknownEntry(missing)));
    }

    #[test]
    fn modified_is_only_reachable_through_modify() {
        let mut s = stream();
        let id = s.append(inc(5.0, 8)).unwrap().id();
        assert!(matches!(
            s.transition(id, AssertionPhase::MODIFIED),
            Err(StreamError::InvalidTransition { .. })
        ));

        let replacement = s.modify_at(id, inc(3.0, 8), t(10)).unwrap();
        assert_eq!(replacement.phase(), AssertionPhase::ACCEPTED);
        assert_eq!(replacement.effect().supersedes, Some(id));

        let original = s.entry(id).unwrap();
        assert_eq!(original.phase(), AssertionPhase::MODIFIED);
        assert_eq!(original.superseded_by(), Some(replacement.id()));
        assert_eq!(latest(&s, &key()), json!(3));
        assert_eq!(s.len(), 2);
        assert_eq!(s.records_since(0).len(), 3);

        // a modified entry is terminal
        assert!(s.modify_at(id, inc(1.0, 8), t(11)).is_err());
    }

    #[test]
    fn modify_requires_the_same_target() {
        let mut s = stream();
        let id = s.append(inc(5.0, 8)).unwrap().id();
        let other = Effect::new(StateKey::new("res-2", "quantity"), Delta::Increment(1.0), TemporalEnvelope::at(t(8)));
        assert!(matches!(s.modify_at(id, other, t(10)), Err(StreamError::Validation(_))));
        assert_eq!(s.entry(id).unwrap().phase(), AssertionPhase::Pending);
    }

    #[test]
    fn derivation_is_bitemporal() {
        let mut s = stream();
        let first = s.append(inc(5.0, 8)).unwrap().id();
        s.transition_at(first, AssertionPhase::ACCEPTED, t(10)).unwrap();

        // a correction about 08:00 that was only learned at 14:00
        let late = Effect::new(key(), Delta::Increment(-2.0), TemporalEnvelope::new(t(8), t(14)));
        let late = s.append(late).unwrap().id();
        s.transition_at(late, AssertionPhase::ACCEPTED, t(15)).unwrap();

        let at = |known| s.derive(&key(), &TemporalEnvelope::as_of(t(12), known)).unwrap();
        assert_eq!(at(t(9)), JsonValue::Null);
        assert_eq!(at(t(11)), json!(5));
        assert_eq!(at(t(14)), json!(5));
        assert_eq!(at(t(16)), json!(3));
        assert_eq!(s.derive(&key(), &TemporalEnvelope::as_of(t(7), t(16))).unwrap(), JsonValue::Null);
    }

    #[test]
    fn phase_changes_cannot_be_backdated() {
        let mut s = stream();
        let id = s.append(inc(1.0, 9)).unwrap().id();
        assert!(matches!(
            s.transition_at(id, AssertionPhase::ACCEPTED, t(8)),
            Err(StreamError::Validation(_))
        ));
        assert_eq!(s.entry(id).unwrap().phase(), AssertionPhase::Pending);
    }

    #[test]
    fn composites_are_judged_atomically() {
        let mut s = stream().with_processor(NonNegativeGuard);
        let seed = s.append(inc(2.0, 8)).unwrap().id();
        s.transition(seed, AssertionPhase::ACCEPTED).unwrap();

        let empty = StateKey::new("res-2", "quantity");
        let a = inc(-1.0, 9);
        let b = Effect::new(empty.clone(), Delta::Increment(-1.0), TemporalEnvelope::at(t(9)));
        let composite = CompositeEffect::new(vec![a.clone(), b.clone()]);
        let cid = composite.id;
        let members = s.append_composite(composite).unwrap();
        assert!(members.iter().all(|m| m.effect().composite == Some(cid)));
        assert_eq!(s.composite_members(cid).unwrap(), &[a.id, b.id]);

        let err = s.transition_composite(cid, AssertionPhase::ACCEPTED).unwrap_err();
        assert!(matches!(err, StreamError::ProcessorRejected { ref processor, effect, .. } if processor == "non-negative" && effect == b.id));
        assert_eq!(s.entry(a.id).unwrap().phase(), AssertionPhase::Pending);
        assert_eq!(latest(&s, &key()), json!(2));

        assert_eq!(
            s.transition(a.id, AssertionPhase::REJECTED),
            Err(StreamError::CompositeMember { effect: a.id, composite: cid })
        );

        let judged = s.transition_composite(cid, AssertionPhase::REJECTED).unwrap();
        assert!(judged.iter().all(|e| e.phase() == AssertionPhase::REJECTED));
        let unknown = CompositeId::new();
        assert_eq!(
            s.transition_composite(unknown, AssertionPhase::ACCEPTED),
            Err(StreamError::UnknownComposite(unknown))
        );
    }

    #[test]
    fn composite_append_is_all_or_nothing() {
        let mut s = stream();
        let mut bad = inc(1.0, 8);
        bad.target.attribute.clear();
        let composite = CompositeEffect::new(vec![inc(1.0, 8), bad]);
        assert!(matches!(s.append_composite(composite), Err(StreamError::Validation(_))));
        assert!(s.is_empty());
        assert!(s.append_composite(CompositeEffect::new(Vec::new())).is_err());
    }

    #[test]
    fn processors_veto_acceptance() {
        let mut s = stream().with_processor(NonNegativeGuard);
        let id = s.append(inc(-1.0, 8)).unwrap().id();
        let err = s.transition(id, AssertionPhase::ACCEPTED).unwrap_err();
        assert!(matches!(err, StreamError::ProcessorRejected { .. }));
        assert_eq!(s.entry(id).unwrap().phase(), AssertionPhase::Pending);
        // rejection is not guarded
        s.transition(id, AssertionPhase::REJECTED).unwrap();
    }

    #[test]
    fn watchers_are_notified_on_transitions() {
        let mut s = stream();
        let handle = s.subscribe(StatePredicate::new(key(), CompareOp::Gt, 2));
        let id = s.append(inc(3.0, 8)).unwrap().id();
        assert!(handle.try_recv().is_err());

        s.transition(id, AssertionPhase::ACCEPTED).unwrap();
        let n = handle.try_recv().unwrap();
        assert_eq!(n.watcher, handle.id());
        assert_eq!(n.trigger, id);
        assert_eq!(n.phase, AssertionPhase::ACCEPTED);
        assert_eq!(n.value, Some(json!(3)));
        assert_eq!(n.outcome, PredicateOutcome::Satisfied);

        let outcomes = s.evaluate_predicates(&[key()]);
        assert_eq!(outcomes, vec![(handle.id(), PredicateOutcome::Satisfied)]);
    }

    #[test]
    fn predicate_failures_reach_the_watcher_not_the_writer() {
        let mut s = stream();
        let label = StateKey::new("res-1", "label");
        let handle = s.subscribe(StatePredicate::new(label.clone(), CompareOp::Gt, 1));
        let id = s
            .append(Effect::new(label, Delta::Set(json!("text")), TemporalEnvelope::at(t(8))))
            .unwrap()
            .id();
        assert!(s.transition(id, AssertionPhase::ACCEPTED).is_ok());
        assert!(matches!(handle.try_recv().unwrap().outcome, PredicateOutcome::Failed(_)));
    }

    #[test]
    fn full_watcher_channels_drop_and_count() {
        let mut s = stream_with(StreamConfig { watcher_capacity: 1 });
        let handle = s.subscribe(StatePredicate::new(key(), CompareOp::Ge, 0));
        for h in 8..10 {
            let id = s.append(inc(1.0, h)).unwrap().id();
            s.transition(id, AssertionPhase::ACCEPTED).unwrap();
        }
        assert_eq!(handle.dropped(), 1);
        assert!(handle.try_recv().is_ok());
        assert!(handle.try_recv().is_err());
    }

    #[test]
    fn unsubscribed_and_dropped_watchers_stop_receiving() {
        let mut s = stream();
        let kept = s.subscribe(StatePredicate::new(key(), CompareOp::Ge, 0));
        assert!(s.unsubscribe(kept.id()));
        assert!(!s.unsubscribe(kept.id()));

        let dropped = s.subscribe(StatePredicate::new(key(), CompareOp::Ge, 0));
        drop(dropped);
        let id = s.append(inc(1.0, 8)).unwrap().id();
        s.transition(id, AssertionPhase::ACCEPTED).unwrap();
        assert!(s.evaluate_predicates(&[key()]).is_empty());
    }

    #[test]
    fn cold_start_replays_to_the_same_state() {
        let mut s = stream();
        let a = s.append(inc(2.0, 8)).unwrap().id();
        let b = s.append(inc(3.0, 9)).unwrap().id();
        let c = s.append(inc(7.0, 9)).unwrap().id();
        s.transition(a, AssertionPhase::ACCEPTED).unwrap();
        s.transition(b, AssertionPhase::REJECTED).unwrap();
        s.modify(c, inc(1.0, 9)).unwrap();

        let restored = EffectStream::from_records(
            s.id(),
            s.records_since(0),
            StreamConfig::default(),
            Arc::new(ManualClock::new(t(12))),
        )
        .unwrap();
        assert_eq!(restored.entries(), s.entries());
        assert_eq!(latest(&restored, &key()), latest(&s, &key()));
        assert_eq!(restored.last_position(), s.last_position());
        assert_eq!(restored.entry(c).unwrap().superseded_by(), s.entry(c).unwrap().superseded_by());
    }

    #[test]
    fn cold_start_rejects_repeated_or_foreign_records() {
        let mut s = stream();
        let a = s.append(inc(2.0, 8)).unwrap().id();
        s.transition(a, AssertionPhase::ACCEPTED).unwrap();

        let first = s.records_since(0)[0].clone();
        let repeated = vec![first.clone(), first];
        let err = EffectStream::from_records(s.id(), &repeated, StreamConfig::default(), Arc::new(SystemClock))
            .unwrap_err();
        assert!(matches!(err, StreamError::NonMonotonicSequence { .. }));

        let other = StreamId::new();
        let err = EffectStream::from_records(other, s.records_since(0), StreamConfig::default(), Arc::new(SystemClock))
            .unwrap_err();
        assert_eq!(err, StreamError::StreamMismatch { expected: other, found: s.id() });
    }

    #[test]
    fn records_since_returns_the_tail() {
        let mut s = stream();
        let a = s.append(inc(2.0, 8)).unwrap().id();
        s.transition(a, AssertionPhase::ACCEPTED).unwrap();
        assert_eq!(s.records_since(1).len(), 1);
        assert_eq!(s.records_since(1)[0].position(), 2);
        assert!(s.records_since(2).is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn derivation_is_deterministic_and_replayable(ops in prop::collection::vec((-5i32..5, any::<bool>()), 0..24)) {
            let mut s = stream();
            let mut expected = 0i64;
            let mut any_accepted = false;
            for (amount, accept) in &ops {
                let id = s.append(inc(f64::from(*amount), 8)).unwrap().id();
                if *accept {
                    s.transition(id, AssertionPhase::ACCEPTED).unwrap();
                    expected += i64::from(*amount);
                    any_accepted = true;
                }
            }

            let first = latest(&s, &key());
            prop_assert_eq!(&first, &latest(&s, &key()));
            prop_assert_eq!(&first, &if any_accepted { json!(expected) } else { JsonValue::Null });

            let cold = EffectStream::from_records(s.id(), s.records_since(0), StreamConfig::default(), Arc::new(SystemClock)).unwrap();
            prop_assert_eq!(first, latest(&cold, &key()));
        }
    }
}
