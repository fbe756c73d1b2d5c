use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Facts about a participant that eligibility rules read: trust metrics, location,
/// roles, commitment attributes.
///
/// Variables are addressed by dotted path (`trust.score` reads field `score` of the
/// top-level `trust` object).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterContext {
    values: BTreeMap<String, JsonValue>,
}

impl FilterContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Resolve a dotted path. A top-level key containing dots wins over nested lookup.
    pub fn lookup(&self, path: &str) -> Option<&JsonValue> {
        if let Some(v) = self.values.get(path) {
            return Some(v);
        }
        let mut parts = path.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}
