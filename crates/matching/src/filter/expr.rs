//! Boolean expression tree evaluated against a [`FilterContext`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::FilterEvaluationError;
use crate::filter::context::FilterContext;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn name(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Literal { value: JsonValue },
    Var { name: String },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Membership: a scalar must be in `set`; an array must share an element with it.
    In { item: Box<Expr>, set: Vec<JsonValue> },
    And { all: Vec<Expr> },
    Or { any: Vec<Expr> },
    Not { expr: Box<Expr> },
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Strings compare case-insensitively, numbers numerically.
fn loosely_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::String(x), JsonValue::String(y)) => x.trim().eq_ignore_ascii_case(y.trim()),
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

impl Expr {
    pub fn literal(value: impl Into<JsonValue>) -> Self {
        Expr::Literal { value: value.into() }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var { name: name.into() }
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn is_in(item: Expr, set: Vec<JsonValue>) -> Self {
        Expr::In {
            item: Box::new(item),
            set,
        }
    }

    /// Evaluate to a JSON value. Variables missing from `ctx` are errors, never `null`.
    pub fn eval(&self, ctx: &FilterContext) -> Result<JsonValue, FilterEvaluationError> {
        match self {
            Expr::Literal { value } => Ok(value.clone()),
            Expr::Var { name } => ctx
                .lookup(name)
                .cloned()
                .ok_or_else(|| FilterEvaluationError::UndefinedVariable(name.clone())),
            Expr::Compare { op, left, right } => {
                let left = left.eval(ctx)?;
                let right = right.eval(ctx)?;
                compare_values(*op, &left, &right).map(JsonValue::Bool)
            }
            Expr::In { item, set } => {
                let item = item.eval(ctx)?;
                let contained = |v: &JsonValue| set.iter().any(|s| loosely_equal(v, s));
                let found = match &item {
                    JsonValue::Array(items) => items.iter().any(contained),
                    scalar => contained(scalar),
                };
                Ok(JsonValue::Bool(found))
            }
            Expr::And { all } => {
                for e in all {
                    if !e.eval_bool(ctx)? {
                        return Ok(JsonValue::Bool(false));
                    }
                }
                Ok(JsonValue::Bool(true))
            }
            Expr::Or { any } => {
                for e in any {
                    if e.eval_bool(ctx)? {
                        return Ok(JsonValue::Bool(true));
                    }
                }
                Ok(JsonValue::Bool(false))
            }
            Expr::Not { expr } => expr.eval_bool(ctx).map(|b| JsonValue::Bool(!b)),
        }
    }

    pub fn eval_bool(&self, ctx: &FilterContext) -> Result<bool, FilterEvaluationError> {
        match self.eval(ctx)? {
            JsonValue::Bool(b) => Ok(b),
            other => Err(FilterEvaluationError::NotBoolean(type_name(&other))),
        }
    }
}

/// Order comparison for numbers and strings; equality for anything.
pub fn compare_values(op: CompareOp, left: &JsonValue, right: &JsonValue) -> Result<bool, FilterEvaluationError> {
    let holds: fn(Ordering) -> bool = match op {
        CompareOp::Eq => return Ok(loosely_equal(left, right)),
        CompareOp::Ne => return Ok(!loosely_equal(left, right)),
        CompareOp::Gt => Ordering::is_gt,
        CompareOp::Ge => Ordering::is_ge,
        CompareOp::Lt => Ordering::is_lt,
        CompareOp::Le => Ordering::is_le,
    };

    let ordering = match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => {
            a.as_f64().zip(b.as_f64()).and_then(|(a, b)| a.partial_cmp(&b))
        }
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ordering.map(holds).ok_or(FilterEvaluationError::TypeMismatch {
        op: op.name(),
        left: type_name(left),
        right: type_name(right),
    })
}
