//! Error types for model evaluation and optimization.
//!
//! This module defines the error taxonomy shared by the derivative oracles
//! and the optimizer built on top of them.

use thiserror::Error;

/// Errors raised while evaluating a forward model, a loss, or their derivatives.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Dimension mismatch between vectors.
    ///
    /// Raised when a vector handed to or returned by an oracle does not have
    /// the length the caller expects. Vectors are never reshaped silently.
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Which quantity had the wrong length
        what: String,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Numerical instability detected.
    ///
    /// Raised on NaN or infinite values in parameters, losses, or the
    /// curvature subproblem.
    #[error("Numerical instability detected: {reason}")]
    NumericalError {
        /// Description of the numerical issue
        reason: String,
    },

    /// The oracle hit a point where it cannot differentiate.
    #[error("Function is not differentiable at the requested point: {reason}")]
    NotDifferentiable {
        /// Description supplied by the oracle
        reason: String,
    },
}

impl ModelError {
    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch<S: Into<String>>(what: S, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create a NumericalError with a custom reason.
    pub fn numerical_error<S: Into<String>>(reason: S) -> Self {
        Self::NumericalError {
            reason: reason.into(),
        }
    }

    /// Create a NotDifferentiable error with a custom reason.
    pub fn not_differentiable<S: Into<String>>(reason: S) -> Self {
        Self::NotDifferentiable {
            reason: reason.into(),
        }
    }
}

/// Errors that can occur while building or running an optimizer.
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Invalid optimizer configuration.
    ///
    /// Raised when the optimizer is configured with invalid parameters
    /// (e.g. non-positive damping, empty parameter vector).
    #[error("Invalid optimizer configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
        /// Name of the invalid parameter
        parameter: String,
        /// Value that was invalid
        value: String,
    },

    /// Propagated model or loss error.
    #[error("Model evaluation failed: {0}")]
    Model(#[from] ModelError),
}

impl OptimizerError {
    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S1, S2, S3>(reason: S1, parameter: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidConfiguration {
            reason: reason.into(),
            parameter: parameter.into(),
            value: value.into(),
        }
    }
}

/// Result type alias for operations that can produce ModelError.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Result type alias for optimizer operations.
pub type OptimizerResult<T> = std::result::Result<T, OptimizerError>;
