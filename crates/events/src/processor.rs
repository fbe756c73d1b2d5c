use serde_json::Value as JsonValue;
use tracing::debug;

use flowmatch_core::TemporalEnvelope;

use crate::delta::{Delta, DeltaError};
use crate::effect::StateKey;
use crate::entry::AssertionEntry;
use crate::phase::AssertionPhase;

/// Read access to derived state, handed to processors while a transition is pending.
pub trait StateView {
    fn derive(&self, key: &StateKey, as_of: &TemporalEnvelope) -> Result<JsonValue, DeltaError>;
}

/// A pluggable guard consulted before a phase change commits.
///
/// Processors run in registration order; the first `Err` vetoes the transition and
/// leaves the stream untouched. Processors must be pure with respect to the stream: they
/// observe `state` but never write to it.
pub trait PhaseProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn check(
        &self,
        entry: &AssertionEntry,
        target: AssertionPhase,
        state: &dyn StateView,
    ) -> Result<(), String>;
}

/// Refuses to accept an increment that would drive its key below zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonNegativeGuard;

impl PhaseProcessor for NonNegativeGuard {
    fn name(&self) -> &str {
        "non-negative"
    }

    fn check(
        &self,
        entry: &AssertionEntry,
        target: AssertionPhase,
        state: &dyn StateView,
    ) -> Result<(), String> {
        if target != AssertionPhase::ACCEPTED {
            return Ok(());
        }
        let Delta::Increment(amount) = entry.effect().delta else {
            return Ok(());
        };
        if amount >= 0.0 {
            return Ok(());
        }

        let key = &entry.effect().target;
        let current = state
            .derive(key, &TemporalEnvelope::latest())
            .map_err(|e| e.to_string())?;
        let current = match current {
            JsonValue::Null => 0.0,
            JsonValue::Number(n) => n.as_f64().unwrap_or(0.0),
            other => return Err(format!("{key} is not numeric ({other})")),
        };

        debug!(%key, current, amount, "non-negative guard");
        if current + amount < 0.0 {
            return Err(format!("{key} would fall to {}", current + amount));
        }
        Ok(())
    }
}
