//! The two-dimensional subproblem that picks β and ρ.
//!
//! Curveball restricts the damped quadratic model of the loss to the span
//! of the curvature direction `Δz` and the momentum `z`. In that basis the
//! model is `m(u) = bᵀu + ½uᵀAu` with a symmetric 2x2 matrix `A`, and the
//! step coefficients come from its minimizer `u = −A⁻¹b`.
//!
//! On the very first step `z = 0`, so `A` has a zero row and column. That is
//! the normal case, not a failure: the pseudo-inverse then yields the best
//! step along `Δz` alone.

use curveball_core::{
    error::{ModelError, Result},
    types::Scalar,
};
use nalgebra::{Matrix2, Vector2, SVD};
use num_traits::Float;
use std::fmt;

/// Iteration cap for the 2x2 SVD.
const SVD_MAX_ITERATIONS: usize = 100;

/// How the 2x2 system was solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolveKind {
    /// Well-conditioned system, solved with the exact inverse
    Regular,
    /// Near-singular system, solved with the least-norm pseudo-inverse
    PseudoInverse,
    /// Zero system or failed decomposition; the step is a no-op
    Degenerate,
    /// Coefficients supplied by the caller, no solve performed
    Fixed,
}

impl fmt::Display for SolveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular => write!(f, "regular"),
            Self::PseudoInverse => write!(f, "pseudo-inverse"),
            Self::Degenerate => write!(f, "degenerate"),
            Self::Fixed => write!(f, "fixed"),
        }
    }
}

/// Quadratic model `m(u) = bᵀu + ½uᵀAu` over the `{Δz, z}` basis.
#[derive(Debug, Clone, PartialEq)]
pub struct Subproblem<T: Scalar> {
    /// Symmetric system matrix
    pub matrix: Matrix2<T>,
    /// Linear term
    pub rhs: Vector2<T>,
}

impl<T: Scalar> Subproblem<T> {
    /// Builds the model from the three distinct entries of `A` and from `b`.
    pub fn new(a11: T, a12: T, a22: T, b1: T, b2: T) -> Self {
        Self {
            matrix: Matrix2::new(a11, a12, a12, a22),
            rhs: Vector2::new(b1, b2),
        }
    }

    /// Value of the model at `u`, i.e. the predicted loss change.
    pub fn predicted_change(&self, u: &Vector2<T>) -> T {
        let half = <T as Scalar>::from_f64(0.5);
        u.dot(&self.rhs) + half * u.dot(&(self.matrix * u))
    }

    /// Minimizes the model.
    ///
    /// The system is first divided by `max|A_ij|`. `tolerance` is then
    /// relative: the system counts as regular when
    /// `|det A| > tolerance · max|A_ij|²`, and singular values below
    /// `tolerance · σ_max` are discarded by the pseudo-inverse.
    ///
    /// # Errors
    ///
    /// Returns `NumericalError` if `A` or `b` has a non-finite entry.
    pub fn solve(&self, tolerance: T) -> Result<(Vector2<T>, SolveKind)> {
        if self.matrix.iter().chain(self.rhs.iter()).any(|v| !Float::is_finite(*v)) {
            return Err(ModelError::numerical_error(format!(
                "curvature subproblem has non-finite entries: A = {:?}, b = {:?}",
                self.matrix.as_slice(),
                self.rhs.as_slice()
            )));
        }

        let scale = self.matrix.amax();
        if scale == T::zero() {
            return Ok((Vector2::zeros(), SolveKind::Degenerate));
        }

        // A⁻¹b is invariant under scaling both; normalizing keeps det A finite.
        let matrix = self.matrix / scale;
        let rhs = self.rhs / scale;

        let det = matrix.determinant();
        if <T as Float>::abs(det) > tolerance {
            if let Some(inverse) = matrix.try_inverse() {
                return Ok((-(inverse * rhs), SolveKind::Regular));
            }
        }

        Ok(match Self::pseudo_inverse(matrix, tolerance) {
            Some(pinv) => (-(pinv * rhs), SolveKind::PseudoInverse),
            None => (Vector2::zeros(), SolveKind::Degenerate),
        })
    }

    /// SVD-based pseudo-inverse, or `None` when the decomposition fails or
    /// every singular value is negligible.
    fn pseudo_inverse(matrix: Matrix2<T>, tolerance: T) -> Option<Matrix2<T>> {
        let svd = SVD::try_new(
            matrix,
            true,
            true,
            <T as Float>::epsilon(),
            SVD_MAX_ITERATIONS,
        )?;
        let sigma_max = svd.singular_values.max();
        if sigma_max <= T::zero() {
            return None;
        }

        let cutoff = tolerance * sigma_max;
        let u = svd.u?;
        let v_t = svd.v_t?;

        let mut inv_s = Matrix2::zeros();
        for i in 0..2 {
            let sigma = svd.singular_values[i];
            if sigma > cutoff {
                inv_s[(i, i)] = T::one() / sigma;
            }
        }

        Some(v_t.transpose() * inv_s * u.transpose())
    }
}
