//! Loss interface: a scalar objective on the predictions.
//!
//! The optimizer needs the loss value, its gradient with respect to the
//! predictions, and (for losses that are not squared errors) the product of
//! its Hessian with a vector in prediction space.

use crate::{
    error::Result,
    numerical::{ensure_dim, fd_step_for},
    types::{DVector, Scalar},
};
use std::fmt::{self, Debug};

/// Trait for losses `L: R^m → R`.
pub trait Loss<T: Scalar>: Debug {
    /// Number of predictions this loss accepts, if fixed.
    ///
    /// `None` means any length is accepted. When `Some`, the optimizer
    /// checks it against the forward model's output dimension at construction.
    fn input_dim(&self) -> Option<usize> {
        None
    }

    /// Evaluates `L(p)`.
    fn value(&self, predictions: &DVector<T>) -> Result<T>;

    /// Gradient `∇L(p)`.
    ///
    /// # Default Implementation
    ///
    /// Central differences, two loss evaluations per component.
    fn gradient(&self, predictions: &DVector<T>) -> Result<DVector<T>> {
        let m = predictions.len();
        let mut gradient = DVector::zeros(m);
        let mut perturbed = predictions.clone();

        for i in 0..m {
            let h = fd_step_for(predictions[i]);

            perturbed[i] = predictions[i] + h;
            let f_plus = self.value(&perturbed)?;
            perturbed[i] = predictions[i] - h;
            let f_minus = self.value(&perturbed)?;
            perturbed[i] = predictions[i];

            gradient[i] = (f_plus - f_minus) / (h + h);
        }

        Ok(gradient)
    }

    /// Hessian-vector product `∇²L(p)·v`.
    ///
    /// # Default Implementation
    ///
    /// Central differences of [`Loss::gradient`] along `v`.
    fn hessian_vector_product(&self, predictions: &DVector<T>, v: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("hvp direction", predictions.len(), v.len())?;

        let v_norm = v.norm();
        if v_norm == T::zero() {
            return Ok(DVector::zeros(predictions.len()));
        }

        let t = T::FD_STEP * (T::one() + predictions.norm()) / v_norm;
        let grad_plus = self.gradient(&(predictions + v * t))?;
        let grad_minus = self.gradient(&(predictions - v * t))?;

        Ok((grad_plus - grad_minus) / (t + t))
    }
}

impl<T: Scalar, L: Loss<T> + ?Sized> Loss<T> for &L {
    fn input_dim(&self) -> Option<usize> {
        (**self).input_dim()
    }

    fn value(&self, predictions: &DVector<T>) -> Result<T> {
        (**self).value(predictions)
    }

    fn gradient(&self, predictions: &DVector<T>) -> Result<DVector<T>> {
        (**self).gradient(predictions)
    }

    fn hessian_vector_product(&self, predictions: &DVector<T>, v: &DVector<T>) -> Result<DVector<T>> {
        (**self).hessian_vector_product(predictions, v)
    }
}

/// Squared error `L(p) = 0.5·‖p − target‖²`.
///
/// Its Hessian is the identity, so the Gauss-Newton product is exact.
#[derive(Debug, Clone, PartialEq)]
pub struct SquaredLoss<T: Scalar> {
    target: DVector<T>,
}

impl<T: Scalar> SquaredLoss<T> {
    /// Creates the squared error against `target`.
    pub fn new(target: DVector<T>) -> Self {
        Self { target }
    }

    /// The regression target.
    pub fn target(&self) -> &DVector<T> {
        &self.target
    }
}

impl<T: Scalar> Loss<T> for SquaredLoss<T> {
    fn input_dim(&self) -> Option<usize> {
        Some(self.target.len())
    }

    fn value(&self, predictions: &DVector<T>) -> Result<T> {
        ensure_dim("predictions", self.target.len(), predictions.len())?;
        let residual = predictions - &self.target;
        Ok(<T as Scalar>::from_f64(0.5) * residual.dot(&residual))
    }

    fn gradient(&self, predictions: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("predictions", self.target.len(), predictions.len())?;
        Ok(predictions - &self.target)
    }

    fn hessian_vector_product(&self, predictions: &DVector<T>, v: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("predictions", self.target.len(), predictions.len())?;
        ensure_dim("hvp direction", self.target.len(), v.len())?;
        Ok(v.clone())
    }
}

/// A loss given by a closure.
///
/// Derivatives come from the finite-difference defaults of [`Loss`].
pub struct FnLoss<F> {
    input_dim: Option<usize>,
    f: F,
}

impl<F> FnLoss<F> {
    /// Wraps `f: R^m → R` accepting predictions of any length.
    pub fn new(f: F) -> Self {
        Self { input_dim: None, f }
    }

    /// Restricts the loss to predictions of length `dim`.
    pub fn with_input_dim(mut self, dim: usize) -> Self {
        self.input_dim = Some(dim);
        self
    }
}

impl<F> Debug for FnLoss<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLoss")
            .field("input_dim", &self.input_dim)
            .finish_non_exhaustive()
    }
}

impl<T, F> Loss<T> for FnLoss<F>
where
    T: Scalar,
    F: Fn(&DVector<T>) -> T,
{
    fn input_dim(&self) -> Option<usize> {
        self.input_dim
    }

    fn value(&self, predictions: &DVector<T>) -> Result<T> {
        if let Some(dim) = self.input_dim {
            ensure_dim("predictions", dim, predictions.len())?;
        }
        Ok((self.f)(predictions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_squared_loss() {
        let loss = SquaredLoss::new(DVector::from_vec(vec![1.0, 2.0, 3.0]));
        let p = DVector::from_vec(vec![2.0, 2.0, 5.0]);

        // 0.5 * (1 + 0 + 4)
        assert_relative_eq!(loss.value(&p).unwrap(), 2.5);
        assert_eq!(
            loss.gradient(&p).unwrap(),
            DVector::from_vec(vec![1.0, 0.0, 2.0])
        );

        let v = DVector::from_vec(vec![0.3, -0.1, 7.0]);
        assert_eq!(loss.hessian_vector_product(&p, &v).unwrap(), v);
        assert_eq!(loss.input_dim(), Some(3));
    }

    #[test]
    fn test_squared_loss_dimension_mismatch() {
        let loss = SquaredLoss::new(DVector::from_vec(vec![1.0, 2.0]));
        assert!(loss.value(&DVector::zeros(3)).is_err());
        assert!(loss.gradient(&DVector::zeros(1)).is_err());
    }

    #[test]
    fn test_fn_loss_finite_differences() {
        // L(p) = p0² p1 + p1³
        let loss = FnLoss::new(|p: &DVector<f64>| p[0] * p[0] * p[1] + p[1].powi(3));
        let p = DVector::from_vec(vec![1.0, 2.0]);

        let g = loss.gradient(&p).unwrap();
        assert_relative_eq!(g[0], 4.0, epsilon = 1e-6);
        assert_relative_eq!(g[1], 13.0, epsilon = 1e-6);

        // H = [[2 p1, 2 p0], [2 p0, 6 p1]] = [[4, 2], [2, 12]]
        let v = DVector::from_vec(vec![1.0, -1.0]);
        let hv = loss.hessian_vector_product(&p, &v).unwrap();
        assert_relative_eq!(hv[0], 2.0, epsilon = 1e-2);
        assert_relative_eq!(hv[1], -10.0, epsilon = 1e-2);
    }

    #[test]
    fn test_fn_loss_input_dim() {
        let loss = FnLoss::new(|p: &DVector<f64>| p.sum()).with_input_dim(2);
        assert_eq!(Loss::<f64>::input_dim(&loss), Some(2));
        assert!(loss.value(&DVector::<f64>::zeros(3)).is_err());
        assert_relative_eq!(loss.value(&DVector::from_vec(vec![1.0, 2.0])).unwrap(), 3.0);
    }
}
