//! Core error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while loading configuration or parsing rules.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("invalid rule {spec:?}: {reason}")]
    RuleParse { spec: String, reason: String },

    #[error("invalid instance bound {field}: {reason}")]
    InvalidBound { field: &'static str, reason: String },
}

impl CoreError {
    pub(crate) fn rule(spec: &str, reason: impl Into<String>) -> Self {
        CoreError::RuleParse {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from parsing a rule expression.
    pub fn is_rule_parse(&self) -> bool {
        matches!(self, CoreError::RuleParse { .. })
    }
}
