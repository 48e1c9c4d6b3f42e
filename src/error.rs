//! Error types for jx-lang.
//!
//! Compilation is pure, so every error here is reproducible: the same input
//! always fails the same way.

use thiserror::Error;

/// Errors raised while building, simplifying, evaluating or rendering an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JxError {
    /// Structurally invalid clause (bad operand shape, bad variable name, ...)
    #[error("Malformed expression: {0}")]
    Malformed(String),

    /// Object key that is not a known operator
    #[error("Malformed expression: unknown operator `{0}`")]
    UnknownOperator(String),

    /// Wrong number of operands for an operator
    #[error("Malformed expression: `{op}` expects {expected} operand(s), got {got}")]
    Arity {
        op: &'static str,
        expected: &'static str,
        got: usize,
    },

    /// A decoration key that must be a constant was given an expression
    #[error("Malformed expression: `{op}` requires a literal for `{key}`")]
    LiteralRequired { op: &'static str, key: &'static str },

    /// The `script` operator was used without enabling inline scripts
    #[error("Inline scripts are disabled; enable `allow_scripts` to use the `script` operator")]
    ScriptsDisabled,

    /// Simplification proved a value has a type its position cannot accept
    #[error("Type error: {0}")]
    Type(String),

    /// An expression spans more than one nesting depth and is not a conjunction
    #[error("Expression too complex: {0}")]
    TooComplex(String),

    /// The backend has no way to express this operator
    #[error("`{op}` is not supported by the {backend} backend")]
    Unsupported {
        op: &'static str,
        backend: &'static str,
    },

    /// Runtime evaluation failed
    #[error("Evaluation error: {0}")]
    Eval(String),

    /// Configuration could not be read or applied
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input was not valid JSON
    #[error("Invalid JSON: {0}")]
    Json(String),
}

impl JxError {
    /// True for every build-time "malformed expression" failure.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            JxError::Malformed(_)
                | JxError::UnknownOperator(_)
                | JxError::Arity { .. }
                | JxError::LiteralRequired { .. }
        )
    }
}

impl From<serde_json::Error> for JxError {
    fn from(e: serde_json::Error) -> Self {
        JxError::Json(e.to_string())
    }
}

/// Result type for jx-lang operations
pub type JxResult<T> = Result<T, JxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = JxError::UnknownOperator("frobnicate".to_string());
        assert_eq!(
            err.to_string(),
            "Malformed expression: unknown operator `frobnicate`"
        );

        let err = JxError::Arity {
            op: "eq",
            expected: "2",
            got: 3,
        };
        assert_eq!(
            err.to_string(),
            "Malformed expression: `eq` expects 2 operand(s), got 3"
        );

        let err = JxError::Unsupported {
            op: "script",
            backend: "sql",
        };
        assert_eq!(err.to_string(), "`script` is not supported by the sql backend");
    }

    #[test]
    fn test_malformed_grouping() {
        assert!(JxError::Malformed("x".into()).is_malformed());
        assert!(
            JxError::LiteralRequired {
                op: "concat",
                key: "separator"
            }
            .is_malformed()
        );
        assert!(!JxError::ScriptsDisabled.is_malformed());
        assert!(!JxError::TooComplex("x".into()).is_malformed());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: JxError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, JxError::Json(_)));
    }
}
