//! Curvature products in prediction space.
//!
//! Curveball never forms the Gauss-Newton matrix `JᵀCJ`. It only needs `C`
//! applied to a Jacobian-vector product, where `C` is the Hessian of the
//! loss with respect to the predictions.

use curveball_core::{
    error::Result,
    loss::Loss,
    types::{DVector, Scalar},
};
use std::fmt;

/// Strategy for applying the loss curvature `C` to a vector `Jv`.
///
/// Chosen once when the optimizer is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CurvatureProduct {
    /// The loss is `½‖p − target‖²`, whose Hessian is the identity, so
    /// `C·Jv = Jv` and no loss derivative call is needed.
    GaussNewton,
    /// General loss: `C·Jv = ∇²L(p)·Jv` through the loss HVP.
    Hessian,
}

impl CurvatureProduct {
    /// Selects the strategy from the squared-loss flag.
    pub fn from_squared_loss(squared_loss: bool) -> Self {
        if squared_loss {
            Self::GaussNewton
        } else {
            Self::Hessian
        }
    }

    /// Applies `C` at `predictions` to `jv`.
    pub fn apply<T, L>(&self, loss: &L, predictions: &DVector<T>, jv: DVector<T>) -> Result<DVector<T>>
    where
        T: Scalar,
        L: Loss<T> + ?Sized,
    {
        match self {
            Self::GaussNewton => Ok(jv),
            Self::Hessian => loss.hessian_vector_product(predictions, &jv),
        }
    }
}

impl fmt::Display for CurvatureProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GaussNewton => write!(f, "Gauss-Newton"),
            Self::Hessian => write!(f, "Hessian"),
        }
    }
}
