//! Error types shared across the evaluator.

use thiserror::Error;

/// Result type alias for evaluator operations.
pub type Result<T> = std::result::Result<T, SimevalError>;

/// Errors that can occur anywhere in the evaluation stack.
#[derive(Error, Debug)]
pub enum SimevalError {
    /// Malformed input: a turn or protocol step is missing required fields.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An external service returned a body that does not match the
    /// required JSON shape or types.
    #[error("Response contract violation: {0}")]
    ResponseContract(String),

    /// Out-of-range thresholds or a missing evaluator set.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Uncaught failure inside a background evaluation run.
    #[error("Task execution error: {0}")]
    TaskExecution(String),

    /// Document store failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Completion or extraction service transport failure.
    #[error("Model error: {0}")]
    Model(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimevalError::Validation("user_query is empty".to_string());
        assert_eq!(err.to_string(), "Validation error: user_query is empty");

        let err = SimevalError::ResponseContract("missing key: step_name".to_string());
        assert!(err.to_string().contains("step_name"));
    }

    #[test]
    fn test_error_from_serde() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: SimevalError = parse_err.into();
        assert!(matches!(err, SimevalError::Serde(_)));
    }
}
