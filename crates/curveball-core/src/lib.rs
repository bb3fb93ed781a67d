//! Core traits and types for the Curveball optimizer.
//!
//! Curveball minimizes a composite objective `L(f(x))`, where `f` is a
//! differentiable forward model and `L` a scalar loss on its predictions.
//! This crate defines the oracle interfaces the optimizer consumes and the
//! run-level plumbing around it.
//!
//! # Key Concepts
//!
//! - **Forward model**: maps parameters to predictions and exposes
//!   Jacobian-vector and vector-Jacobian products
//! - **Loss**: scalar objective on predictions, with gradient and
//!   Hessian-vector product
//! - **Stopping criteria**: when a run ends and why
//!
//! # Modules
//!
//! - [`callback`]: Observers for optimization runs
//! - [`counting`]: Wrappers that count oracle evaluations
//! - [`derivative_check`]: Adjoint, gradient and HVP checks
//! - [`error`]: Error types
//! - [`loss`]: Loss trait and standard losses
//! - [`model`]: Forward model trait and standard models
//! - [`numerical`]: Dimension and finiteness guards
//! - [`optimizer`]: Stopping criteria and results
//! - [`types`]: Scalar trait and type aliases

pub mod callback;
pub mod counting;
pub mod derivative_check;
pub mod error;
pub mod loss;
pub mod model;
pub mod numerical;
pub mod optimizer;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{ModelError, OptimizerError, OptimizerResult, Result};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use curveball_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::callback::{LoggingCallback, LossHistory, NoOpCallback, OptimizationCallback};
    pub use crate::counting::{CountingLoss, CountingModel, EvaluationCounts};
    pub use crate::derivative_check::DerivativeChecker;
    pub use crate::error::{ModelError, OptimizerError, OptimizerResult, Result};
    pub use crate::loss::{FnLoss, Loss, SquaredLoss};
    pub use crate::model::{FnModel, ForwardModel, IdentityModel};
    pub use crate::optimizer::{
        IterationInfo, OptimizationResult, StoppingCriterion, TerminationReason,
    };
    pub use crate::types::{DMatrix, DVector, Scalar};
}
