use thiserror::Error;

use flowmatch_core::{CompositeId, DomainError, EffectId, StreamId};

use crate::delta::DeltaError;
use crate::phase::AssertionPhase;

pub type StreamResult<T> = Result<T, StreamError>;

/// Failures surfaced to stream callers. A failed call leaves the stream unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StreamError {
    /// Malformed effect envelope; the effect never enters the stream.
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("effect {effect} cannot move from {from} to {to}")]
    InvalidTransition {
        effect: EffectId,
        from: AssertionPhase,
        to: AssertionPhase,
    },

    #[error("no entry for effect {0}")]
    UnknownEntry(EffectId),

    #[error("effect {0} is already in the stream")]
    DuplicateEffect(EffectId),

    #[error("processor '{processor}' rejected effect {effect}: {reason}")]
    ProcessorRejected {
        processor: String,
        effect: EffectId,
        reason: String,
    },

    #[error("no composite {0}")]
    UnknownComposite(CompositeId),

    #[error("effect {effect} belongs to composite {composite} and is judged with it")]
    CompositeMember {
        effect: EffectId,
        composite: CompositeId,
    },

    #[error("record for stream {found} replayed into stream {expected}")]
    StreamMismatch { expected: StreamId, found: StreamId },

    #[error("record position {found} does not follow {last}")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error(transparent)]
    Delta(#[from] DeltaError),
}
