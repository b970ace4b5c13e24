//! Error types for pkat

use thiserror::Error;

/// pkat error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Fatal configuration error: unsupported column grammar, missing problem
    /// specification, mismatched sampler/analyzer pairing. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Too few usable points for a numeric fit. Recoverable: the offending
    /// (identifier, variable) unit is skipped and the batch continues.
    #[error("insufficient data: fit window needs {needed} points, {available} available")]
    InsufficientData {
        /// Points required by the fit window.
        needed: usize,
        /// Usable points remaining after filtering.
        available: usize,
    },

    /// Identifier lookup miss. A wrong mapping would corrupt cross-run
    /// comparisons invisibly, so lookups never fall back to a default.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Duplicate composite key in tidy assembly or similar integrity defect.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),
}

impl Error {
    /// Whether the error is recoverable at per-unit granularity (skip the
    /// offending (identifier, variable) computation, continue the batch).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InsufficientData { .. } | Error::Computation(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverability_classification() {
        let err = Error::InsufficientData { needed: 3, available: 1 };
        assert!(err.is_recoverable());
        assert!(Error::Computation("zero variance".into()).is_recoverable());
        assert!(!Error::Config("bad pairing".into()).is_recoverable());
        assert!(!Error::KeyNotFound("s99".into()).is_recoverable());
    }
}
