//! Infrastructure layer: effect log, persistence, replay, workers, configuration.

pub mod config;
pub mod effect_log;
pub mod replay;
pub mod workers;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, EngineConfig};
pub use effect_log::{EffectLog, EffectLogError, InMemoryEffectLog, PersistError, PersistentEffectStream};
pub use replay::{ReplayError, restore};
pub use workers::{WatcherWorker, WorkerHandle};
