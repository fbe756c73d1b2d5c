//! State deltas: the operation an effect applies to an attribute value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeltaError {
    #[error("cannot {op} a value of type {found}")]
    TypeMismatch { op: &'static str, found: &'static str },

    #[error("{op} produced a non-finite number")]
    NonFinite { op: &'static str },
}

/// An operation plus payload. Deltas are folded left-to-right over an initial `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Delta {
    /// Replace the value.
    Set(JsonValue),
    /// Add to a number (`null` counts as zero). Negative amounts decrement.
    Increment(f64),
    /// Push onto an array (`null` counts as empty).
    Append(JsonValue),
    /// Shallow-merge fields into an object (`null` counts as empty).
    Merge(Map<String, JsonValue>),
    /// Remove one field of an object.
    Remove(String),
    /// Reset to `null`.
    Clear,
}

pub(crate) fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Integral results within the exactly-representable range are stored as integers so that
/// `1 + 2` derives to `3`, not `3.0`.
pub(crate) fn number(value: f64, op: &'static str) -> Result<JsonValue, DeltaError> {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    if !value.is_finite() {
        return Err(DeltaError::NonFinite { op });
    }
    if value.fract() == 0.0 && value.abs() < EXACT {
        return Ok(JsonValue::from(value as i64));
    }
    Number::from_f64(value)
        .map(JsonValue::Number)
        .ok_or(DeltaError::NonFinite { op })
}

impl Delta {
    pub fn op_name(&self) -> &'static str {
        match self {
            Delta::Set(_) => "set",
            Delta::Increment(_) => "increment",
            Delta::Append(_) => "append",
            Delta::Merge(_) => "merge",
            Delta::Remove(_) => "remove",
            Delta::Clear => "clear",
        }
    }

    /// Apply this delta to `current`, producing the next value.
    pub fn apply(&self, current: JsonValue) -> Result<JsonValue, DeltaError> {
        let op = self.op_name();
        match (self, current) {
            (Delta::Set(v), _) => Ok(v.clone()),
            (Delta::Clear, _) => Ok(JsonValue::Null),

            (Delta::Increment(n), JsonValue::Null) => number(*n, op),
            (Delta::Increment(n), JsonValue::Number(cur)) => {
                number(cur.as_f64().unwrap_or(0.0) + n, op)
            }

            (Delta::Append(v), JsonValue::Null) => Ok(JsonValue::Array(vec![v.clone()])),
            (Delta::Append(v), JsonValue::Array(mut items)) => {
                items.push(v.clone());
                Ok(JsonValue::Array(items))
            }

            (Delta::Merge(fields), JsonValue::Null) => Ok(JsonValue::Object(fields.clone())),
            (Delta::Merge(fields), JsonValue::Object(mut obj)) => {
                for (k, v) in fields {
                    obj.insert(k.clone(), v.clone());
                }
                Ok(JsonValue::Object(obj))
            }

            (Delta::Remove(_), JsonValue::Null) => Ok(JsonValue::Null),
            (Delta::Remove(field), JsonValue::Object(mut obj)) => {
                obj.remove(field);
                Ok(JsonValue::Object(obj))
            }

            (_, other) => Err(DeltaError::TypeMismatch {
                op,
                found: type_name(&other),
            }),
        }
    }

    /// Signed numeric contribution to a flow (only increments move quantity).
    pub fn flow_amount(&self) -> Option<f64> {
        match self {
            Delta::Increment(n) => Some(*n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn increments_start_from_zero_and_stay_integral() {
        let v = Delta::Increment(1.0).apply(JsonValue::Null).unwrap();
        let v = Delta::Increment(2.0).apply(v).unwrap();
        assert_eq!(v, json!(3));
        assert_eq!(Delta::Increment(0.5).apply(v).unwrap(), json!(3.5));
    }

    #[test]
    fn append_and_merge_build_containers() {
        let v = Delta::Append(json!("a")).apply(JsonValue::Null).unwrap();
        assert_eq!(Delta::Append(json!("b")).apply(v).unwrap(), json!(["a", "b"]));

        let mut fields = Map::new();
        fields.insert("x".into(), json!(1));
        let obj = Delta::Merge(fields).apply(json!({"y": 2})).unwrap();
        assert_eq!(obj, json!({"x": 1, "y": 2}));
        assert_eq!(Delta::Remove("y".into()).apply(obj).unwrap(), json!({"x": 1}));
    }

    #[test]
    fn mismatched_types_are_errors() {
        let err = Delta::Increment(1.0).apply(json!("text")).unwrap_err();
        assert_eq!(err, DeltaError::TypeMismatch { op: "increment", found: "string" });
        assert!(Delta::Increment(f64::INFINITY).apply(JsonValue::Null).is_err());
    }

    #[test]
    fn wire_form_is_op_tagged() {
        let d: Delta = serde_json::from_value(json!({"op": "increment", "value": 4})).unwrap();
        assert_eq!(d, Delta::Increment(4.0));
        let clear: Delta = serde_json::from_value(json!({"op": "clear"})).unwrap();
        assert_eq!(clear, Delta::Clear);
    }
}
