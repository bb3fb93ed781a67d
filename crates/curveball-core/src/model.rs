//! Forward-model interface: predictions and their first derivatives.
//!
//! A forward model maps parameters `x ∈ R^n` to predictions `p ∈ R^m`.
//! The optimizer never forms the Jacobian `J = ∂p/∂x`; it only needs two
//! products with it:
//!
//! - **JVP** (forward mode): `J·v` for `v ∈ R^n`
//! - **VJP** (reverse mode): `Jᵀ·u` for `u ∈ R^m`
//!
//! Implementors backed by an automatic-differentiation engine should override
//! both. The default implementations use central finite differences, which is
//! enough for small problems and for checking analytic derivatives.

use crate::{
    error::Result,
    numerical::ensure_dim,
    types::{DVector, Scalar},
};
use std::fmt::{self, Debug};

/// Trait for forward models `f: R^n → R^m`.
pub trait ForwardModel<T: Scalar>: Debug {
    /// Number of parameters `n`.
    fn input_dim(&self) -> usize;

    /// Number of predictions `m`.
    fn output_dim(&self) -> usize;

    /// Evaluates the predictions `f(x)`.
    fn predict(&self, x: &DVector<T>) -> Result<DVector<T>>;

    /// Jacobian-vector product `J(x)·v`.
    ///
    /// # Default Implementation
    ///
    /// Central differences along `v`, two forward evaluations.
    fn jvp(&self, x: &DVector<T>, v: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("jvp direction", self.input_dim(), v.len())?;

        let v_norm = v.norm();
        if v_norm == T::zero() {
            return Ok(DVector::zeros(self.output_dim()));
        }

        let t = T::FD_STEP * (T::one() + x.norm()) / v_norm;
        let forward = self.predict(&(x + v * t))?;
        let backward = self.predict(&(x - v * t))?;

        Ok((forward - backward) / (t + t))
    }

    /// Vector-Jacobian product `J(x)ᵀ·u`.
    ///
    /// # Default Implementation
    ///
    /// Builds each Jacobian column with [`ForwardModel::jvp`] along a basis
    /// vector, so it costs `n` JVPs. Override this for anything but tiny `n`.
    fn vjp(&self, x: &DVector<T>, u: &DVector<T>) -> Result<DVector<T>> {
        let n = self.input_dim();
        ensure_dim("vjp cotangent", self.output_dim(), u.len())?;

        let mut result = DVector::zeros(n);
        let mut e_i = DVector::zeros(n);
        for i in 0..n {
            e_i[i] = T::one();
            let column = self.jvp(x, &e_i)?;
            result[i] = column.dot(u);
            e_i[i] = T::zero();
        }

        Ok(result)
    }
}

impl<T: Scalar, M: ForwardModel<T> + ?Sized> ForwardModel<T> for &M {
    fn input_dim(&self) -> usize {
        (**self).input_dim()
    }

    fn output_dim(&self) -> usize {
        (**self).output_dim()
    }

    fn predict(&self, x: &DVector<T>) -> Result<DVector<T>> {
        (**self).predict(x)
    }

    fn jvp(&self, x: &DVector<T>, v: &DVector<T>) -> Result<DVector<T>> {
        (**self).jvp(x, v)
    }

    fn vjp(&self, x: &DVector<T>, u: &DVector<T>) -> Result<DVector<T>> {
        (**self).vjp(x, u)
    }
}

/// The identity model `f(x) = x`.
///
/// Useful when the loss is written directly in terms of the parameters, as
/// in plain function minimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityModel {
    dim: usize,
}

impl IdentityModel {
    /// Creates the identity on `R^dim`.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl<T: Scalar> ForwardModel<T> for IdentityModel {
    fn input_dim(&self) -> usize {
        self.dim
    }

    fn output_dim(&self) -> usize {
        self.dim
    }

    fn predict(&self, x: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("parameters", self.dim, x.len())?;
        Ok(x.clone())
    }

    fn jvp(&self, _x: &DVector<T>, v: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("jvp direction", self.dim, v.len())?;
        Ok(v.clone())
    }

    fn vjp(&self, _x: &DVector<T>, u: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("vjp cotangent", self.dim, u.len())?;
        Ok(u.clone())
    }
}

/// A forward model given by a closure.
///
/// Derivatives come from the finite-difference defaults of [`ForwardModel`].
pub struct FnModel<F> {
    input_dim: usize,
    output_dim: usize,
    f: F,
}

impl<F> FnModel<F> {
    /// Wraps `f: R^input_dim → R^output_dim`.
    pub fn new(input_dim: usize, output_dim: usize, f: F) -> Self {
        Self {
            input_dim,
            output_dim,
            f,
        }
    }
}

impl<F> Debug for FnModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModel")
            .field("input_dim", &self.input_dim)
            .field("output_dim", &self.output_dim)
            .finish_non_exhaustive()
    }
}

impl<T, F> ForwardModel<T> for FnModel<F>
where
    T: Scalar,
    F: Fn(&DVector<T>) -> DVector<T>,
{
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn predict(&self, x: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("parameters", self.input_dim, x.len())?;
        let predictions = (self.f)(x);
        ensure_dim("predictions", self.output_dim, predictions.len())?;
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use approx::assert_relative_eq;

    /// f(x0, x1) = [x0², x0·x1, sin(x1)]
    fn nonlinear() -> FnModel<impl Fn(&DVector<f64>) -> DVector<f64>> {
        FnModel::new(2, 3, |x: &DVector<f64>| {
            DVector::from_vec(vec![x[0] * x[0], x[0] * x[1], x[1].sin()])
        })
    }

    #[test]
    fn test_identity_model() {
        let model = IdentityModel::new(3);
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let v = DVector::from_vec(vec![0.5, -1.0, 2.0]);

        assert_eq!(ForwardModel::<f64>::input_dim(&model), 3);
        assert_eq!(model.predict(&x).unwrap(), x);
        assert_eq!(model.jvp(&x, &v).unwrap(), v);
        assert_eq!(model.vjp(&x, &v).unwrap(), v);
    }

    #[test]
    fn test_identity_rejects_wrong_length() {
        let model = IdentityModel::new(3);
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let err = model.predict(&x).unwrap_err();
        assert!(matches!(err, ModelError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_finite_difference_jvp() {
        let model = nonlinear();
        let x = DVector::from_vec(vec![1.5, 0.5]);
        let v = DVector::from_vec(vec![1.0, -2.0]);

        // J = [[2x0, 0], [x1, x0], [0, cos(x1)]]
        let jv = model.jvp(&x, &v).unwrap();
        assert_relative_eq!(jv[0], 3.0, epsilon = 1e-6);
        assert_relative_eq!(jv[1], 0.5 - 3.0, epsilon = 1e-6);
        assert_relative_eq!(jv[2], -2.0 * 0.5_f64.cos(), epsilon = 1e-6);
    }

    #[test]
    fn test_finite_difference_vjp() {
        let model = nonlinear();
        let x = DVector::from_vec(vec![1.5, 0.5]);
        let u = DVector::from_vec(vec![1.0, 2.0, 3.0]);

        let jtu = model.vjp(&x, &u).unwrap();
        assert_relative_eq!(jtu[0], 2.0 * 1.5 + 2.0 * 0.5, epsilon = 1e-6);
        assert_relative_eq!(jtu[1], 2.0 * 1.5 + 3.0 * 0.5_f64.cos(), epsilon = 1e-6);
    }

    #[test]
    fn test_zero_direction_jvp() {
        let model = nonlinear();
        let x = DVector::from_vec(vec![1.5, 0.5]);
        let jv = model.jvp(&x, &DVector::zeros(2)).unwrap();
        assert_eq!(jv, DVector::zeros(3));
    }

    #[test]
    fn test_fn_model_checks_output_length() {
        let model = FnModel::new(2, 3, |x: &DVector<f64>| x.clone());
        let err = model.predict(&DVector::<f64>::zeros(2)).unwrap_err();
        assert!(matches!(
            err,
            ModelError::DimensionMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }
}
