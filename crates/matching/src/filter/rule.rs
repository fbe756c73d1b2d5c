//! Legacy tagged eligibility rules and their compilation into [`Expr`].

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::FilterEvaluationError;
use crate::filter::expr::{CompareOp, Expr};

/// Context variable read by `trust` rules.
pub const TRUST_SCORE_VAR: &str = "trust.score";
pub const COUNTRY_VAR: &str = "location.country";
pub const CITY_VAR: &str = "location.city";
pub const ROLES_VAR: &str = "roles";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterRule {
    /// `trust.score >= min_score`.
    Trust { min_score: f64 },
    /// Country or city membership; an empty rule admits everyone.
    Location {
        #[serde(default)]
        countries: Vec<String>,
        #[serde(default)]
        cities: Vec<String>,
    },
    /// Participant holds at least one of the roles.
    Role { any_of: Vec<String> },
    All { rules: Vec<FilterRule> },
    Any { rules: Vec<FilterRule> },
    Expression { expr: Expr },
}

fn strings(values: &[String]) -> Vec<JsonValue> {
    values.iter().map(|v| JsonValue::String(v.clone())).collect()
}

impl FilterRule {
    /// Parse a rule from its tagged JSON form. Unknown `type` tags are malformed rules.
    pub fn from_json(value: &JsonValue) -> Result<Self, FilterEvaluationError> {
        Self::deserialize(value).map_err(|e| FilterEvaluationError::MalformedRule(e.to_string()))
    }

    pub fn compile(&self) -> Result<Expr, FilterEvaluationError> {
        Ok(match self {
            FilterRule::Trust { min_score } => {
                if !min_score.is_finite() {
                    return Err(FilterEvaluationError::MalformedRule(format!(
                        "trust min_score must be finite (got {min_score})"
                    )));
                }
                Expr::compare(CompareOp::Ge, Expr::var(TRUST_SCORE_VAR), Expr::literal(*min_score))
            }
            FilterRule::Location { countries, cities } => {
                let mut any = Vec::new();
                if !countries.is_empty() {
                    any.push(Expr::is_in(Expr::var(COUNTRY_VAR), strings(countries)));
                }
                if !cities.is_empty() {
                    any.push(Expr::is_in(Expr::var(CITY_VAR), strings(cities)));
                }
                if any.is_empty() {
                    Expr::literal(true)
                } else {
                    Expr::Or { any }
                }
            }
            FilterRule::Role { any_of } => {
                if any_of.is_empty() {
                    return Err(FilterEvaluationError::MalformedRule("role rule lists no roles".into()));
                }
                Expr::is_in(Expr::var(ROLES_VAR), strings(any_of))
            }
            FilterRule::All { rules } => Expr::And {
                all: rules.iter().map(FilterRule::compile).collect::<Result<_, _>>()?,
            },
            FilterRule::Any { rules } => Expr::Or {
                any: rules.iter().map(FilterRule::compile).collect::<Result<_, _>>()?,
            },
            FilterRule::Expression { expr } => expr.clone(),
        })
    }
}
