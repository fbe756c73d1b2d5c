//! Background workers.

pub mod watcher_worker;

pub use watcher_worker::{WatcherWorker, WorkerHandle};
