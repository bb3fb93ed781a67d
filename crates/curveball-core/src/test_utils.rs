//! Test problems with analytic derivatives.
//!
//! These fixtures are shared by the optimizer tests and benchmarks.

use crate::{
    error::Result,
    loss::Loss,
    model::ForwardModel,
    numerical::ensure_dim,
    types::{DVector, Scalar},
};
use num_traits::Float;

/// The Rosenbrock function on a vector of even length `2k`.
///
/// The input is read as two rows `a = p[..k]`, `b = p[k..]` and
/// `L(p) = Σ 100 (b_i − a_i²)² + (1 − a_i)²`. The minimizer is all ones.
/// This is not a squared loss, so the optimizer needs its Hessian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosenbrockLoss {
    half: usize,
}

impl RosenbrockLoss {
    /// Rosenbrock on `R^dim`; `dim` must be even.
    pub fn new(dim: usize) -> Self {
        assert!(dim % 2 == 0, "Rosenbrock dimension must be even");
        Self { half: dim / 2 }
    }
}

impl<T: Scalar> Loss<T> for RosenbrockLoss {
    fn input_dim(&self) -> Option<usize> {
        Some(2 * self.half)
    }

    fn value(&self, p: &DVector<T>) -> Result<T> {
        ensure_dim("predictions", 2 * self.half, p.len())?;
        let hundred = <T as Scalar>::from_f64(100.0);
        let mut sum = T::zero();
        for i in 0..self.half {
            let (a, b) = (p[i], p[self.half + i]);
            let r = b - a * a;
            let s = T::one() - a;
            sum += hundred * r * r + s * s;
        }
        Ok(sum)
    }

    fn gradient(&self, p: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("predictions", 2 * self.half, p.len())?;
        let two = <T as Scalar>::from_f64(2.0);
        let two_hundred = <T as Scalar>::from_f64(200.0);
        let mut g = DVector::zeros(p.len());
        for i in 0..self.half {
            let (a, b) = (p[i], p[self.half + i]);
            let r = b - a * a;
            g[i] = -two * two_hundred * a * r - two * (T::one() - a);
            g[self.half + i] = two_hundred * r;
        }
        Ok(g)
    }

    fn hessian_vector_product(&self, p: &DVector<T>, v: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("predictions", 2 * self.half, p.len())?;
        ensure_dim("hvp direction", 2 * self.half, v.len())?;
        let two = <T as Scalar>::from_f64(2.0);
        let four_hundred = <T as Scalar>::from_f64(400.0);
        let twelve_hundred = <T as Scalar>::from_f64(1200.0);
        let two_hundred = <T as Scalar>::from_f64(200.0);
        let mut hv = DVector::zeros(p.len());
        for i in 0..self.half {
            let (a, b) = (p[i], p[self.half + i]);
            let h_aa = twelve_hundred * a * a - four_hundred * b + two;
            let h_ab = -four_hundred * a;
            let (va, vb) = (v[i], v[self.half + i]);
            hv[i] = h_aa * va + h_ab * vb;
            hv[self.half + i] = h_ab * va + two_hundred * vb;
        }
        Ok(hv)
    }
}

/// Exponential decay model `p_j = x0 · exp(x1 · t_j)` over fixed sample times.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialModel<T: Scalar> {
    times: DVector<T>,
}

impl<T: Scalar> ExponentialModel<T> {
    /// Creates the model sampled at `times`.
    pub fn new(times: DVector<T>) -> Self {
        Self { times }
    }

    /// Predictions for amplitude `amplitude` and rate `rate`.
    pub fn sample(&self, amplitude: T, rate: T) -> DVector<T> {
        self.times.map(|t| amplitude * <T as Float>::exp(rate * t))
    }
}

impl<T: Scalar> ForwardModel<T> for ExponentialModel<T> {
    fn input_dim(&self) -> usize {
        2
    }

    fn output_dim(&self) -> usize {
        self.times.len()
    }

    fn predict(&self, x: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("parameters", 2, x.len())?;
        Ok(self.sample(x[0], x[1]))
    }

    fn jvp(&self, x: &DVector<T>, v: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("parameters", 2, x.len())?;
        ensure_dim("jvp direction", 2, v.len())?;
        Ok(self.times.map(|t| {
            let e = <T as Float>::exp(x[1] * t);
            e * v[0] + x[0] * t * e * v[1]
        }))
    }

    fn vjp(&self, x: &DVector<T>, u: &DVector<T>) -> Result<DVector<T>> {
        ensure_dim("parameters", 2, x.len())?;
        ensure_dim("vjp cotangent", self.times.len(), u.len())?;
        let mut result = DVector::zeros(2);
        for (t, u_j) in self.times.iter().zip(u.iter()) {
            let e = <T as Float>::exp(x[1] * *t);
            result[0] += e * *u_j;
            result[1] += x[0] * *t * e * *u_j;
        }
        Ok(result)
    }
}
