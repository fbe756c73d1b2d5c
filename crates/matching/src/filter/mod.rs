//! Eligibility filters.
//!
//! Rules arrive either as an [`Expr`] tree or in the legacy tagged form ([`FilterRule`]),
//! which compiles into the tree. Evaluation is fail-closed: anything that cannot be
//! evaluated (undefined variable, type mismatch, malformed rule) denies.

pub mod context;
pub mod expr;
pub mod rule;

use serde_json::Value as JsonValue;
use tracing::warn;

pub use context::FilterContext;
pub use expr::{CompareOp, Expr};
pub use rule::FilterRule;

/// Evaluate an expression; errors deny.
pub fn evaluate_filter(expr: &Expr, ctx: &FilterContext) -> bool {
    match expr.eval_bool(ctx) {
        Ok(allowed) => allowed,
        Err(error) => {
            warn!(%error, "eligibility filter failed; denying");
            false
        }
    }
}

/// Compile and evaluate a legacy rule; errors deny.
pub fn evaluate_eligibility_filter(rule: &FilterRule, ctx: &FilterContext) -> bool {
    match rule.compile() {
        Ok(expr) => evaluate_filter(&expr, ctx),
        Err(error) => {
            warn!(%error, "eligibility rule failed to compile; denying");
            false
        }
    }
}

/// Parse, compile and evaluate a rule in its raw JSON form; errors deny.
pub fn evaluate_eligibility_json(rule: &JsonValue, ctx: &FilterContext) -> bool {
    match FilterRule::from_json(rule) {
        Ok(rule) => evaluate_eligibility_filter(&rule, ctx),
        Err(error) => {
            warn!(%error, "eligibility rule malformed; denying");
            false
        }
    }
}
