//! `flowmatch-events`: the effect stream and derivation.
//!
//! Effects are appended to an [`EffectStream`], judged through the [`AssertionPhase`]
//! graph (optionally vetoed by [`PhaseProcessor`]s) and folded into present values by
//! [`EffectStream::derive`]. Nothing here performs IO; durability is layered on top by
//! replaying [`StreamRecord`]s.

pub mod clock;
pub mod delta;
pub mod derivation;
pub mod effect;
pub mod entry;
pub mod error;
pub mod metabolism;
pub mod phase;
pub mod predicate;
pub mod processor;
pub mod record;
pub mod stream;
pub mod subscription;
pub mod watcher;

pub use clock::{Clock, ManualClock, SystemClock};
pub use delta::{Delta, DeltaError};
pub use effect::{CompositeEffect, Effect, StateKey};
pub use entry::AssertionEntry;
pub use error::{StreamError, StreamResult};
pub use metabolism::{Flow, MetabolismQuery};
pub use phase::{AssertionPhase, Judgment, PhaseChange};
pub use predicate::{CompareOp, PredicateOutcome, StatePredicate};
pub use processor::{NonNegativeGuard, PhaseProcessor, StateView};
pub use record::{ReplayCursor, StreamRecord};
pub use stream::{DEFAULT_WATCHER_CAPACITY, EffectStream, StreamConfig};
pub use subscription::{Subscription, WatcherHandle};
pub use watcher::WatcherNotification;
