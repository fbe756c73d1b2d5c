//! Stream records and replay cursors.
//!
//! Every successful write produces one or more [`StreamRecord`]s. Records are the unit a
//! durable log stores; replaying them in position order into a fresh stream reproduces the
//! same entries, phase histories and derived values.

use serde::{Deserialize, Serialize};

use flowmatch_core::{EffectId, StreamId};

use crate::effect::Effect;
use crate::error::StreamError;
use crate::phase::PhaseChange;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamRecord {
    Appended {
        stream_id: StreamId,
        position: u64,
        sequence: u64,
        effect: Effect,
        change: PhaseChange,
    },
    Transitioned {
        stream_id: StreamId,
        position: u64,
        effect_id: EffectId,
        change: PhaseChange,
    },
}

impl StreamRecord {
    pub fn stream_id(&self) -> StreamId {
        match self {
            StreamRecord::Appended { stream_id, .. } | StreamRecord::Transitioned { stream_id, .. } => {
                *stream_id
            }
        }
    }

    pub fn position(&self) -> u64 {
        match self {
            StreamRecord::Appended { position, .. } | StreamRecord::Transitioned { position, .. } => {
                *position
            }
        }
    }

    pub fn effect_id(&self) -> EffectId {
        match self {
            StreamRecord::Appended { effect, .. } => effect.id,
            StreamRecord::Transitioned { effect_id, .. } => *effect_id,
        }
    }
}

/// Tracks replay progress for a single stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReplayCursor {
    stream_id: StreamId,
    last_position: u64,
}

impl ReplayCursor {
    pub fn new(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            last_position: 0,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn last_position(&self) -> u64 {
        self.last_position
    }

    /// Accept the next record, enforcing stream identity and strictly increasing positions.
    pub fn advance(&mut self, record: &StreamRecord) -> Result<(), StreamError> {
        let found_stream = record.stream_id();
        if found_stream != self.stream_id {
            return Err(StreamError::StreamMismatch {
                expected: self.stream_id,
                found: found_stream,
            });
        }
        let found = record.position();
        if found <= self.last_position {
            return Err(StreamError::NonMonotonicSequence {
                last: self.last_position,
                found,
            });
        }
        self.last_position = found;
        Ok(())
    }
}
