//! Curveball optimization.
//!
//! This crate provides the Curveball optimizer, a second-order method that
//! interleaves a single refinement of a Newton-like step with the parameter
//! update, so it needs no inner solver loop and no line search.
//!
//! # Components
//!
//! - **Curveball**: the optimizer and its step/driver loop
//! - **Subproblem**: the 2x2 model that chooses learning rate and momentum
//! - **Damping**: ratio-driven adaptation of the Levenberg-Marquardt term
//! - **Curvature**: Gauss-Newton or Hessian products in prediction space
//!
//! # Examples
//!
//! ```rust
//! use curveball_core::{loss::SquaredLoss, model::IdentityModel, optimizer::StoppingCriterion};
//! use curveball_optim::{Curveball, CurveballConfig};
//! use nalgebra::DVector;
//!
//! let mut optimizer = Curveball::new(
//!     DVector::from_vec(vec![0.0_f64]),
//!     IdentityModel::new(1),
//!     SquaredLoss::new(DVector::from_vec(vec![3.0])),
//!     true,
//!     CurveballConfig::new(),
//! )?;
//!
//! let result = optimizer.optimize(&StoppingCriterion::new().with_target_value(1e-10))?;
//! assert!(result.converged);
//! assert!((result.point[0] - 3.0).abs() < 1e-4);
//! # Ok::<(), curveball_core::OptimizerError>(())
//! ```

pub mod curvature;
pub mod curveball;
pub mod damping;
pub mod subproblem;

pub use curvature::CurvatureProduct;
pub use curveball::{Curveball, CurveballConfig, StepOutcome, StepRule};
pub use damping::DampingConfig;
pub use subproblem::{SolveKind, Subproblem};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exports() {
        let config = CurveballConfig::<f64>::new().with_damping(DampingConfig::fixed(0.1));
        assert_eq!(config.step_rule, StepRule::Automatic);
        assert_eq!(CurvatureProduct::from_squared_loss(true), CurvatureProduct::GaussNewton);
        assert_eq!(SolveKind::PseudoInverse.to_string(), "pseudo-inverse");
    }
}
