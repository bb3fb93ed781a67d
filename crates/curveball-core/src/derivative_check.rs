//! Utilities for checking derivative oracles.
//!
//! Hand-written or engine-provided derivatives are a common source of silent
//! optimizer failures. These checks compare them against each other or
//! against finite differences.

use crate::{
    error::Result,
    loss::Loss,
    model::ForwardModel,
    numerical::{ensure_dim, fd_step_for, max_abs},
    types::{DVector, Scalar},
};
use num_traits::Float;

/// Utilities for checking JVP/VJP, gradient and HVP implementations.
pub struct DerivativeChecker;

impl DerivativeChecker {
    /// Dot-product test between the model's JVP and VJP.
    ///
    /// For any `v ∈ R^n` and `u ∈ R^m`, `⟨u, J·v⟩ = ⟨Jᵀ·u, v⟩`. The error is
    /// measured relative to `max(1, |⟨u, J·v⟩|)`.
    ///
    /// # Returns
    ///
    /// A tuple of (passes, error).
    pub fn check_adjoint<T, M>(
        model: &M,
        x: &DVector<T>,
        v: &DVector<T>,
        u: &DVector<T>,
        tol: T,
    ) -> Result<(bool, T)>
    where
        T: Scalar,
        M: ForwardModel<T> + ?Sized,
    {
        ensure_dim("parameters", model.input_dim(), x.len())?;

        let jv = model.jvp(x, v)?;
        let jtu = model.vjp(x, u)?;
        ensure_dim("jvp output", model.output_dim(), jv.len())?;
        ensure_dim("vjp output", model.input_dim(), jtu.len())?;

        let lhs = u.dot(&jv);
        let rhs = jtu.dot(v);
        let scale = <T as Float>::max(T::one(), <T as Float>::abs(lhs));
        let error = <T as Float>::abs(lhs - rhs) / scale;

        Ok((error < tol, error))
    }

    /// Checks the loss gradient against central differences.
    ///
    /// # Returns
    ///
    /// A tuple of (passes, max_error) where max_error is the largest
    /// component-wise absolute error.
    pub fn check_gradient<T, L>(loss: &L, predictions: &DVector<T>, tol: T) -> Result<(bool, T)>
    where
        T: Scalar,
        L: Loss<T> + ?Sized,
    {
        let analytical = loss.gradient(predictions)?;
        ensure_dim("gradient", predictions.len(), analytical.len())?;

        let mut numerical = DVector::zeros(predictions.len());
        let mut perturbed = predictions.clone();
        for i in 0..predictions.len() {
            let h = fd_step_for(predictions[i]);

            perturbed[i] = predictions[i] + h;
            let f_plus = loss.value(&perturbed)?;
            perturbed[i] = predictions[i] - h;
            let f_minus = loss.value(&perturbed)?;
            perturbed[i] = predictions[i];

            numerical[i] = (f_plus - f_minus) / (h + h);
        }

        let max_error = max_abs(&(analytical - numerical));
        Ok((max_error < tol, max_error))
    }

    /// Checks the loss Hessian-vector product against finite differences
    /// of the gradient along `v`.
    ///
    /// # Returns
    ///
    /// A tuple of (passes, max_error).
    pub fn check_hessian_vector_product<T, L>(
        loss: &L,
        predictions: &DVector<T>,
        v: &DVector<T>,
        tol: T,
    ) -> Result<(bool, T)>
    where
        T: Scalar,
        L: Loss<T> + ?Sized,
    {
        ensure_dim("hvp direction", predictions.len(), v.len())?;

        let analytical = loss.hessian_vector_product(predictions, v)?;
        ensure_dim("hvp output", predictions.len(), analytical.len())?;

        let v_norm = v.norm();
        if v_norm == T::zero() {
            let max_error = max_abs(&analytical);
            return Ok((max_error < tol, max_error));
        }

        let t = T::FD_STEP * (T::one() + predictions.norm()) / v_norm;
        let grad_plus = loss.gradient(&(predictions + v * t))?;
        let grad_minus = loss.gradient(&(predictions - v * t))?;
        let numerical = (grad_plus - grad_minus) / (t + t);

        let max_error = max_abs(&(analytical - numerical));
        Ok((max_error < tol, max_error))
    }
}
