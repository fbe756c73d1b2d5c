//! Watcher registry and notification delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use flowmatch_core::{EffectId, WatcherId};

use crate::phase::AssertionPhase;
use crate::predicate::{PredicateOutcome, StatePredicate};
use crate::subscription::WatcherHandle;

/// Delivered to a watcher after a phase change touches its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherNotification {
    pub watcher: WatcherId,
    pub predicate: StatePredicate,
    /// Effect whose phase change triggered the evaluation.
    pub trigger: EffectId,
    pub phase: AssertionPhase,
    /// Derived value the predicate saw (absent when derivation failed).
    pub value: Option<JsonValue>,
    pub outcome: PredicateOutcome,
}

pub(crate) struct Watcher {
    pub(crate) id: WatcherId,
    pub(crate) predicate: StatePredicate,
    sender: SyncSender<WatcherNotification>,
    dropped: Arc<AtomicU64>,
}

#[derive(Default)]
pub(crate) struct WatcherRegistry {
    watchers: Vec<Watcher>,
}

impl WatcherRegistry {
    pub(crate) fn register(&mut self, predicate: StatePredicate, capacity: usize) -> WatcherHandle {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        let id = WatcherId::new();
        let dropped = Arc::new(AtomicU64::new(0));
        debug!(watcher = %id, key = %predicate.key, "watcher registered");
        self.watchers.push(Watcher {
            id,
            predicate,
            sender,
            dropped: Arc::clone(&dropped),
        });
        WatcherHandle::new(id, receiver, dropped)
    }

    pub(crate) fn remove(&mut self, id: WatcherId) -> bool {
        let before = self.watchers.len();
        self.watchers.retain(|w| w.id != id);
        before != self.watchers.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Watcher> {
        self.watchers.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.watchers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    /// Hand notifications to their watchers without blocking.
    ///
    /// A full channel drops the notification; a closed one unregisters the watcher.
    pub(crate) fn deliver(&mut self, notifications: Vec<WatcherNotification>) {
        let mut closed = Vec::new();
        for notification in notifications {
            let Some(watcher) = self.watchers.iter().find(|w| w.id == notification.watcher) else {
                continue;
            };
            match watcher.sender.try_send(notification) {
                Ok(()) => {}
                Err(TrySendError::Full(n)) => {
                    let total = watcher.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(watcher = %watcher.id, trigger = %n.trigger, dropped = total, "watcher channel full; notification dropped");
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!(watcher = %watcher.id, "watcher handle dropped; unregistering");
                    closed.push(watcher.id);
                }
            }
        }
        if !closed.is_empty() {
            self.watchers.retain(|w| !closed.contains(&w.id));
        }
    }
}
