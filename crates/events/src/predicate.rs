use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use flowmatch_core::TemporalEnvelope;

use crate::delta::type_name;
use crate::effect::StateKey;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }
}

/// A condition over one derived attribute, e.g. `res-1/quantity > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePredicate {
    pub key: StateKey,
    pub op: CompareOp,
    pub threshold: JsonValue,
    /// Bitemporal coordinates to evaluate at; the latest knowledge when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<TemporalEnvelope>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum PredicateOutcome {
    Satisfied,
    Unsatisfied,
    /// The predicate could not be evaluated (type mismatch, underivable state).
    Failed(String),
}

impl StatePredicate {
    pub fn new(key: StateKey, op: CompareOp, threshold: impl Into<JsonValue>) -> Self {
        Self {
            key,
            op,
            threshold: threshold.into(),
            window: None,
        }
    }

    pub fn within(mut self, window: TemporalEnvelope) -> Self {
        self.window = Some(window);
        self
    }

    pub(crate) fn as_of(&self) -> TemporalEnvelope {
        self.window.unwrap_or_else(TemporalEnvelope::latest)
    }

    /// Compare a derived value against the threshold.
    ///
    /// Numbers compare numerically (an underived `null` counts as zero against a numeric
    /// threshold); other values support only `Eq`/`Ne`.
    pub fn evaluate(&self, value: &JsonValue) -> PredicateOutcome {
        let numeric = match (value, &self.threshold) {
            (JsonValue::Number(v), JsonValue::Number(t)) => v.as_f64().zip(t.as_f64()),
            (JsonValue::Null, JsonValue::Number(t)) => t.as_f64().map(|t| (0.0, t)),
            _ => None,
        };

        let holds = match (numeric, self.op) {
            (Some((v, t)), CompareOp::Gt) => v > t,
            (Some((v, t)), CompareOp::Ge) => v >= t,
            (Some((v, t)), CompareOp::Lt) => v < t,
            (Some((v, t)), CompareOp::Le) => v <= t,
            (Some((v, t)), CompareOp::Eq) => v == t,
            (Some((v, t)), CompareOp::Ne) => v != t,
            (None, CompareOp::Eq) => *value == self.threshold,
            (None, CompareOp::Ne) => *value != self.threshold,
            (None, op) => {
                return PredicateOutcome::Failed(format!(
                    "cannot compare {} {} {}",
                    type_name(value),
                    op.symbol(),
                    type_name(&self.threshold)
                ));
            }
        };

        if holds {
            PredicateOutcome::Satisfied
        } else {
            PredicateOutcome::Unsatisfied
        }
    }
}
