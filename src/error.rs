//! Error types for SinGAN training and sampling

use thiserror::Error;

use crate::training::Role;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, SinGanError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum SinGanError {
    /// Invalid hyperparameter or input, detected before any update runs
    #[error("Invalid configuration at stage {stage}: {what} (expected {expected}, got {actual})")]
    Configuration {
        stage: i64,
        what: String,
        expected: String,
        actual: String,
    },

    /// Operation requested while the session is in the wrong state
    #[error("Invalid state: {0}")]
    State(String),

    /// No optimizer registered for a role/stage pair
    #[error("No {role} optimizer registered for stage {stage}")]
    MissingOptimizer { role: Role, stage: usize },

    /// Tensor engine error
    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SinGanError {
    /// Build a configuration error with expected/actual values
    pub fn config(
        stage: i64,
        what: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        SinGanError::Configuration {
            stage,
            what: what.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Build a state error
    pub fn state(msg: impl Into<String>) -> Self {
        SinGanError::State(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message_is_diagnosable() {
        let err = SinGanError::config(2, "generator accumulation count", 1, 4);
        let msg = err.to_string();

        assert!(msg.contains("stage 2"));
        assert!(msg.contains("expected 1"));
        assert!(msg.contains("got 4"));
    }

    #[test]
    fn test_missing_optimizer_message() {
        let err = SinGanError::MissingOptimizer {
            role: Role::Discriminator,
            stage: 3,
        };
        assert_eq!(err.to_string(), "No discriminator optimizer registered for stage 3");
    }
}
