//! Error types for mas_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while describing or constructing a model.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The two primary branches disagree on their timestep count.
    #[error("Timestep mismatch: input_a has {a} timesteps, input_b has {b}")]
    TimestepMismatch {
        /// Timesteps of the first primary input.
        a: usize,
        /// Timesteps of the second primary input.
        b: usize,
    },

    /// Invalid shape or size parameter.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Activation name that has no counterpart.
    #[error("Unknown activation: {0}")]
    UnknownActivation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::TimestepMismatch { a: 50, b: 40 };
        assert_eq!(
            err.to_string(),
            "Timestep mismatch: input_a has 50 timesteps, input_b has 40"
        );
        assert_eq!(
            CoreError::UnknownActivation("swish".into()).to_string(),
            "Unknown activation: swish"
        );
    }
}
