//! Engine configuration.
//!
//! Every field has a default; `FLOWMATCH_*` environment variables override them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use flowmatch_events::StreamConfig;
use flowmatch_matching::MatchDefaults;
use flowmatch_observability::LogFormat;

pub const ENV_DEFAULT_SEARCH_RADIUS_KM: &str = "FLOWMATCH_DEFAULT_SEARCH_RADIUS_KM";
pub const ENV_RECURRENCE_HORIZON_DAYS: &str = "FLOWMATCH_RECURRENCE_HORIZON_DAYS";
pub const ENV_WATCHER_CAPACITY: &str = "FLOWMATCH_WATCHER_CAPACITY";
pub const ENV_LOG_FORMAT: &str = "FLOWMATCH_LOG_FORMAT";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Radius used when a located slot declares none.
    pub default_search_radius_km: f64,
    pub recurrence_horizon_days: u32,
    pub watcher_capacity: usize,
    pub log_format: LogFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let matching = MatchDefaults::default();
        Self {
            default_search_radius_km: matching.default_radius_km,
            recurrence_horizon_days: matching.horizon_days,
            watcher_capacity: StreamConfig::default().watcher_capacity,
            log_format: LogFormat::default(),
        }
    }
}

impl EngineConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source. Unset or blank variables keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(ENV_DEFAULT_SEARCH_RADIUS_KM) {
            let radius: f64 = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_DEFAULT_SEARCH_RADIUS_KM, &raw, e))?;
            if !radius.is_finite() || radius <= 0.0 {
                return Err(ConfigError::invalid(
                    ENV_DEFAULT_SEARCH_RADIUS_KM,
                    &raw,
                    "must be a positive number of kilometres",
                ));
            }
            config.default_search_radius_km = radius;
        }

        if let Some(raw) = get(ENV_RECURRENCE_HORIZON_DAYS) {
            let days: u32 = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_RECURRENCE_HORIZON_DAYS, &raw, e))?;
            if days == 0 {
                return Err(ConfigError::invalid(ENV_RECURRENCE_HORIZON_DAYS, &raw, "must be at least 1"));
            }
            config.recurrence_horizon_days = days;
        }

        if let Some(raw) = get(ENV_WATCHER_CAPACITY) {
            let capacity: usize = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_WATCHER_CAPACITY, &raw, e))?;
            if capacity == 0 {
                return Err(ConfigError::invalid(ENV_WATCHER_CAPACITY, &raw, "must be at least 1"));
            }
            config.watcher_capacity = capacity;
        }

        if let Some(raw) = get(ENV_LOG_FORMAT) {
            config.log_format = raw
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_LOG_FORMAT, &raw, e))?;
        }

        Ok(config)
    }

    pub fn match_defaults(&self) -> MatchDefaults {
        MatchDefaults {
            default_radius_km: self.default_search_radius_km,
            horizon_days: self.recurrence_horizon_days,
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            watcher_capacity: self.watcher_capacity,
        }
    }
}

impl From<&EngineConfig> for MatchDefaults {
    fn from(config: &EngineConfig) -> Self {
        config.match_defaults()
    }
}

impl From<&EngineConfig> for StreamConfig {
    fn from(config: &EngineConfig) -> Self {
        config.stream_config()
    }
}
