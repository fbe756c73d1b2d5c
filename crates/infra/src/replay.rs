//! Cold-start: rebuild an effect stream from its log.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use flowmatch_core::StreamId;
use flowmatch_events::{Clock, EffectStream, StreamConfig, StreamError};

use crate::effect_log::{EffectLog, EffectLogError};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to load stream {stream}: {source}")]
    Log {
        stream: StreamId,
        #[source]
        source: EffectLogError,
    },

    /// The log holds records the stream refuses; it is corrupted or from another stream.
    #[error("stream {stream} cannot be replayed: {source}")]
    Stream {
        stream: StreamId,
        #[source]
        source: StreamError,
    },
}

/// Load every record of `stream_id` and replay it into a fresh stream.
///
/// The result derives the same values as the stream that wrote the records.
pub fn restore<L>(
    log: &L,
    stream_id: StreamId,
    config: StreamConfig,
    clock: Arc<dyn Clock>,
) -> Result<EffectStream, ReplayError>
where
    L: EffectLog + ?Sized,
{
    let records = log.load(stream_id).map_err(|source| ReplayError::Log {
        stream: stream_id,
        source,
    })?;

    let stream = EffectStream::from_records(stream_id, &records, config, clock).map_err(|source| {
        ReplayError::Stream {
            stream: stream_id,
            source,
        }
    })?;

    info!(stream = %stream_id, records = records.len(), entries = stream.len(), "stream replayed");
    Ok(stream)
}
