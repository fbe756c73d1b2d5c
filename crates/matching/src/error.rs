use thiserror::Error;

/// Why an eligibility filter could not be evaluated.
///
/// Never surfaced by the matcher: every variant is logged and treated as a deny.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterEvaluationError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("cannot apply {op} to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("expected a boolean, found {0}")]
    NotBoolean(&'static str),

    #[error("malformed rule: {0}")]
    MalformedRule(String),
}
