//! Receiving side of a watcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use flowmatch_core::WatcherId;

use crate::watcher::WatcherNotification;

/// A subscription to a channel of messages.
///
/// Designed for single-threaded consumption; hand it to one worker thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Handle returned by `EffectStream::subscribe`.
///
/// Notifications arrive over a bounded channel. When the consumer falls behind, new
/// notifications are dropped and counted rather than blocking the writer.
#[derive(Debug)]
pub struct WatcherHandle {
    id: WatcherId,
    subscription: Subscription<WatcherNotification>,
    dropped: Arc<AtomicU64>,
}

impl WatcherHandle {
    pub(crate) fn new(
        id: WatcherId,
        receiver: Receiver<WatcherNotification>,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        Self {
            id,
            subscription: Subscription::new(receiver),
            dropped,
        }
    }

    pub fn id(&self) -> WatcherId {
        self.id
    }

    pub fn recv(&self) -> Result<WatcherNotification, RecvError> {
        self.subscription.recv()
    }

    pub fn try_recv(&self) -> Result<WatcherNotification, TryRecvError> {
        self.subscription.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<WatcherNotification, RecvTimeoutError> {
        self.subscription.recv_timeout(timeout)
    }

    /// Notifications discarded because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
