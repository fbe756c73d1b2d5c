use thiserror::Error;

use flowmatch_core::StreamId;
use flowmatch_events::StreamRecord;

/// Effect log operation error.
///
/// These are storage failures, as opposed to stream errors (validation, phase graph).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EffectLogError {
    /// The log already holds records past the writer's view of the stream.
    #[error("position conflict: expected last position {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("effect log unavailable: {0}")]
    Unavailable(String),
}

/// Append-only, per-stream record log: the durability boundary of an effect stream.
///
/// ## Append semantics
///
/// `append()`:
/// - rejects records belonging to a stream other than `stream_id`
/// - checks `expected_last_position` against the log's last position (optimistic
///   concurrency: a second writer on the same stream fails with `Conflict`)
/// - requires contiguous positions starting at `expected_last_position + 1`
/// - persists the batch atomically
///
/// ## Load semantics
///
/// `load()` returns every record of the stream in position order; an unknown stream
/// loads as empty.
pub trait EffectLog: Send + Sync {
    fn append(
        &self,
        stream_id: StreamId,
        records: &[StreamRecord],
        expected_last_position: u64,
    ) -> Result<(), EffectLogError>;

    fn load(&self, stream_id: StreamId) -> Result<Vec<StreamRecord>, EffectLogError>;
}

impl<L> EffectLog for std::sync::Arc<L>
where
    L: EffectLog + ?Sized,
{
    fn append(
        &self,
        stream_id: StreamId,
        records: &[StreamRecord],
        expected_last_position: u64,
    ) -> Result<(), EffectLogError> {
        (**self).append(stream_id, records, expected_last_position)
    }

    fn load(&self, stream_id: StreamId) -> Result<Vec<StreamRecord>, EffectLogError> {
        (**self).load(stream_id)
    }
}
