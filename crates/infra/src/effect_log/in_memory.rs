use std::collections::HashMap;
use std::sync::RwLock;

use flowmatch_core::StreamId;
use flowmatch_events::StreamRecord;

use super::r#trait::{EffectLog, EffectLogError};

/// In-memory effect log.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEffectLog {
    streams: RwLock<HashMap<StreamId, Vec<StreamRecord>>>,
}

impl InMemoryEffectLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn last_position(stream: &[StreamRecord]) -> u64 {
        stream.last().map(StreamRecord::position).unwrap_or(0)
    }
}

impl EffectLog for InMemoryEffectLog {
    fn append(
        &self,
        stream_id: StreamId,
        records: &[StreamRecord],
        expected_last_position: u64,
    ) -> Result<(), EffectLogError> {
        if records.is_empty() {
            return Ok(());
        }

        for (idx, r) in records.iter().enumerate() {
            if r.stream_id() != stream_id {
                return Err(EffectLogError::InvalidAppend(format!(
                    "record {idx} belongs to stream {}",
                    r.stream_id()
                )));
            }
            let expected = expected_last_position + idx as u64 + 1;
            if r.position() != expected {
                return Err(EffectLogError::InvalidAppend(format!(
                    "record {idx} has position {}, expected {expected}",
                    r.position()
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EffectLogError::Unavailable("lock poisoned".to_string()))?;

        let stream = streams.entry(stream_id).or_default();
        let current = Self::last_position(stream);
        if current != expected_last_position {
            return Err(EffectLogError::Conflict {
                expected: expected_last_position,
                found: current,
            });
        }

        stream.extend_from_slice(records);
        Ok(())
    }

    fn load(&self, stream_id: StreamId) -> Result<Vec<StreamRecord>, EffectLogError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EffectLogError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams.get(&stream_id).cloned().unwrap_or_default())
    }
}
