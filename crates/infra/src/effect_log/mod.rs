//! Append-only effect log boundary.
//!
//! The effect stream itself is purely in-memory; this module defines where its records go
//! to survive a restart, without making any storage assumptions.

pub mod in_memory;
pub mod r#trait;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use flowmatch_core::{CompositeId, EffectId, StreamId, WatcherId};
use flowmatch_events::{
    AssertionEntry, AssertionPhase, Clock, CompositeEffect, Effect, EffectStream, PhaseProcessor,
    StatePredicate, StreamConfig, StreamError, WatcherHandle,
};

use crate::replay::{self, ReplayError};

pub use in_memory::InMemoryEffectLog;
pub use r#trait::{EffectLog, EffectLogError};

#[derive(Debug, Error)]
pub enum PersistError {
    /// The write was refused by the stream; nothing was committed or logged.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The write committed in memory but its records are not yet durable.
    /// They stay pending and are retried by the next write or [`PersistentEffectStream::flush`].
    #[error("effect log: {0}")]
    Log(#[from] EffectLogError),
}

/// Adapter that writes committed stream records to an [`EffectLog`].
///
/// This ensures the ordering invariant: **a record reaches the log only after the in-memory
/// commit succeeds**, so a refused write never leaves a trace in durable storage.
pub struct PersistentEffectStream<L> {
    stream: EffectStream,
    log: L,
    persisted: u64,
}

impl<L> core::fmt::Debug for PersistentEffectStream<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PersistentEffectStream")
            .field("stream", &self.stream)
            .field("persisted", &self.persisted)
            .finish()
    }
}

impl<L: EffectLog> PersistentEffectStream<L> {
    /// Wrap a stream whose records are not in the log yet (typically a fresh one).
    pub fn new(stream: EffectStream, log: L) -> Self {
        Self {
            stream,
            log,
            persisted: 0,
        }
    }

    /// Cold-start a stream from everything the log holds for `stream_id`.
    pub fn restore(
        log: L,
        stream_id: StreamId,
        config: StreamConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ReplayError> {
        let stream = replay::restore(&log, stream_id, config, clock)?;
        let persisted = stream.last_position();
        Ok(Self {
            stream,
            log,
            persisted,
        })
    }

    pub fn stream(&self) -> &EffectStream {
        &self.stream
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn into_parts(self) -> (EffectStream, L) {
        (self.stream, self.log)
    }

    /// Last position known to be in the log.
    pub fn persisted_position(&self) -> u64 {
        self.persisted
    }

    /// Records committed in memory but not yet in the log.
    pub fn pending(&self) -> usize {
        self.stream.records_since(self.persisted).len()
    }

    pub fn add_processor(&mut self, processor: Box<dyn PhaseProcessor>) {
        self.stream.add_processor(processor);
    }

    pub fn subscribe(&mut self, predicate: StatePredicate) -> WatcherHandle {
        self.stream.subscribe(predicate)
    }

    pub fn unsubscribe(&mut self, id: WatcherId) -> bool {
        self.stream.unsubscribe(id)
    }

    pub fn append(&mut self, effect: Effect) -> Result<AssertionEntry, PersistError> {
        let entry = self.stream.append(effect)?;
        self.flush()?;
        Ok(entry)
    }

    pub fn append_composite(
        &mut self,
        composite: CompositeEffect,
    ) -> Result<Vec<AssertionEntry>, PersistError> {
        let entries = self.stream.append_composite(composite)?;
        self.flush()?;
        Ok(entries)
    }

    pub fn transition(
        &mut self,
        id: EffectId,
        phase: AssertionPhase,
    ) -> Result<AssertionEntry, PersistError> {
        let entry = self.stream.transition(id, phase)?;
        self.flush()?;
        Ok(entry)
    }

    pub fn transition_composite(
        &mut self,
        id: CompositeId,
        phase: AssertionPhase,
    ) -> Result<Vec<AssertionEntry>, PersistError> {
        let entries = self.stream.transition_composite(id, phase)?;
        self.flush()?;
        Ok(entries)
    }

    pub fn modify(
        &mut self,
        id: EffectId,
        replacement: Effect,
    ) -> Result<AssertionEntry, PersistError> {
        let entry = self.stream.modify(id, replacement)?;
        self.flush()?;
        Ok(entry)
    }

    /// Write every pending record to the log.
    pub fn flush(&mut self) -> Result<(), EffectLogError> {
        let pending = self.stream.records_since(self.persisted);
        let Some(last) = pending.last().map(|r| r.position()) else {
            return Ok(());
        };

        match self.log.append(self.stream.id(), pending, self.persisted) {
            Ok(()) => {
                debug!(stream = %self.stream.id(), from = self.persisted, to = last, "records persisted");
                self.persisted = last;
                Ok(())
            }
            Err(err) => {
                warn!(
                    stream = %self.stream.id(),
                    pending = pending.len(),
                    error = %err,
                    "failed to persist records"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use flowmatch_core::TemporalEnvelope;
    use flowmatch_events::{Delta, ManualClock, StateKey, StreamRecord};

    use super::*;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()))
    }

    fn increment(amount: f64) -> Effect {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        Effect::new(
            StateKey::new("bin-7", "quantity"),
            Delta::Increment(amount),
            TemporalEnvelope::at(at),
        )
    }

    /// Log that refuses writes while `down` is set.
    #[derive(Default)]
    struct FlakyLog {
        inner: InMemoryEffectLog,
        down: Mutex<bool>,
    }

    impl FlakyLog {
        fn set_down(&self, down: bool) {
            *self.down.lock().unwrap() = down;
        }
    }

    impl EffectLog for FlakyLog {
        fn append(
            &self,
            stream_id: StreamId,
            records: &[StreamRecord],
            expected_last_position: u64,
        ) -> Result<(), EffectLogError> {
            if *self.down.lock().unwrap() {
                return Err(EffectLogError::Unavailable("down".to_string()));
            }
            self.inner.append(stream_id, records, expected_last_position)
        }

        fn load(&self, stream_id: StreamId) -> Result<Vec<StreamRecord>, EffectLogError> {
            self.inner.load(stream_id)
        }
    }

    #[test]
    fn committed_writes_reach_the_log_in_order() {
        let log = Arc::new(InMemoryEffectLog::new());
        let id = StreamId::new();
        let stream = EffectStream::with_config(id, StreamConfig::default(), clock());
        let mut persistent = PersistentEffectStream::new(stream, log.clone());

        let a = persistent.append(increment(3.0)).unwrap();
        persistent.transition(a.id(), AssertionPhase::ACCEPTED).unwrap();

        let records = log.load(id).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].position(), 1);
        assert_eq!(records[1].position(), 2);
        assert_eq!(persistent.persisted_position(), 2);
        assert_eq!(persistent.pending(), 0);
    }

    #[test]
    fn refused_writes_are_not_logged() {
        let log = Arc::new(InMemoryEffectLog::new());
        let id = StreamId::new();
        let stream = EffectStream::with_config(id, StreamConfig::default(), clock());
        let mut persistent = PersistentEffectStream::new(stream, log.clone());

        let a = persistent.append(increment(3.0)).unwrap();
        let err = persistent
            .transition(a.id(), AssertionPhase::Propagated)
            .unwrap_err();

        assert!(matches!(err, PersistError::Stream(StreamError::InvalidTransition { .. })));
        assert_eq!(log.load(id).unwrap().len(), 1);
    }

    #[test]
    fn pending_records_are_retried_after_a_log_failure() {
        let log = Arc::new(FlakyLog::default());
        let id = StreamId::new();
        let stream = EffectStream::with_config(id, StreamConfig::default(), clock());
        let mut persistent = PersistentEffectStream::new(stream, log.clone());

        persistent.append(increment(1.0)).unwrap();

        log.set_down(true);
        let err = persistent.append(increment(2.0)).unwrap_err();
        assert!(matches!(err, PersistError::Log(EffectLogError::Unavailable(_))));
        assert_eq!(persistent.stream().len(), 2);
        assert_eq!(persistent.pending(), 1);

        log.set_down(false);
        persistent.append(increment(4.0)).unwrap();
        assert_eq!(persistent.pending(), 0);
        assert_eq!(log.load(id).unwrap().len(), 3);
    }

    #[test]
    fn restore_continues_from_the_persisted_position() {
        let log = Arc::new(InMemoryEffectLog::new());
        let id = StreamId::new();
        let key = StateKey::new("bin-7", "quantity");

        {
            let stream = EffectStream::with_config(id, StreamConfig::default(), clock());
            let mut persistent = PersistentEffectStream::new(stream, log.clone());
            let a = persistent.append(increment(5.0)).unwrap();
            persistent.transition(a.id(), AssertionPhase::ACCEPTED).unwrap();
        }

        let mut restored =
            PersistentEffectStream::restore(log.clone(), id, StreamConfig::default(), clock()).unwrap();
        assert_eq!(restored.persisted_position(), 2);

        let b = restored.append(increment(2.0)).unwrap();
        restored.transition(b.id(), AssertionPhase::ACCEPTED).unwrap();

        assert_eq!(restored.stream().derive_now(&key).unwrap(), json!(7.0));
        assert_eq!(log.load(id).unwrap().len(), 4);
    }

    #[test]
    fn two_writers_on_one_stream_conflict() {
        let log = Arc::new(InMemoryEffectLog::new());
        let id = StreamId::new();

        let mut first = PersistentEffectStream::new(
            EffectStream::with_config(id, StreamConfig::default(), clock()),
            log.clone(),
        );
        let mut second = PersistentEffectStream::new(
            EffectStream::with_config(id, StreamConfig::default(), clock()),
            log.clone(),
        );

        first.append(increment(1.0)).unwrap();
        let err = second.append(increment(1.0)).unwrap_err();

        assert!(matches!(
            err,
            PersistError::Log(EffectLogError::Conflict { expected: 0, found: 1 })
        ));
    }
}
