//! # Curveball
//!
//! Second-order optimization of composite objectives `L(f(x))` with the
//! Curveball method: a momentum vector refined by Gauss-Newton (or Hessian)
//! products, with learning rate and momentum chosen automatically every
//! step and an adaptive damping term.
//!
//! The caller supplies the differentiation oracles: a [`ForwardModel`]
//! exposing Jacobian-vector and vector-Jacobian products, and a [`Loss`]
//! exposing its gradient and Hessian-vector product. Both traits fall back
//! to finite differences for whatever is not implemented.
//!
//! ## Quick Start
//!
//! ```rust
//! use curveball::prelude::*;
//!
//! // Minimize ½‖x − target‖² directly in parameter space.
//! let target = DVector::from_vec(vec![1.0, -2.0, 0.5]);
//! let mut optimizer = Curveball::new(
//!     DVector::zeros(3),
//!     IdentityModel::new(3),
//!     SquaredLoss::new(target.clone()),
//!     true,
//!     CurveballConfig::default(),
//! )?;
//!
//! let result = optimizer.optimize(&StoppingCriterion::new().with_target_value(1e-12))?;
//! assert!((result.point - target).norm() < 1e-5);
//! # Ok::<(), OptimizerError>(())
//! ```
//!
//! ## Crates
//!
//! - [`core`]: oracle traits, errors, stopping criteria and callbacks
//! - [`optim`]: the optimizer, its damping schedule and 2x2 subproblem
//! - [`nalgebra`]: the linear algebra types used throughout

pub use curveball_core as core;
pub use curveball_optim as optim;
pub use nalgebra;

pub use curveball_core::{
    loss::{Loss, SquaredLoss},
    model::{ForwardModel, IdentityModel},
    ModelError, OptimizerError, OptimizerResult, Result,
};
pub use curveball_optim::{Curveball, CurveballConfig, DampingConfig, StepOutcome, StepRule};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use curveball_core::prelude::*;
    pub use curveball_optim::{
        CurvatureProduct, Curveball, CurveballConfig, DampingConfig, SolveKind, StepOutcome,
        StepRule,
    };
}
