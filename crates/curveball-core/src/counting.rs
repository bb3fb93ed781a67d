//! Wrappers that count oracle evaluations.
//!
//! Curveball's per-step cost is dominated by forward-model passes and
//! derivative products, so counting them is the cheapest way to compare
//! runs (e.g. "how much work to reach loss < 1e-2").

use crate::{
    error::Result,
    loss::Loss,
    model::ForwardModel,
    types::{DVector, Scalar},
};
use std::cell::Cell;
use std::ops::Add;

/// Snapshot of oracle evaluation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvaluationCounts {
    /// Forward-model evaluations `f(x)`
    pub predictions: usize,
    /// Jacobian-vector products
    pub jvp: usize,
    /// Vector-Jacobian products
    pub vjp: usize,
    /// Loss evaluations `L(p)`
    pub loss: usize,
    /// Loss gradients
    pub gradient: usize,
    /// Loss Hessian-vector products
    pub hvp: usize,
}

impl EvaluationCounts {
    /// Total number of oracle calls of any kind.
    pub fn total(&self) -> usize {
        self.predictions + self.jvp + self.vjp + self.loss + self.gradient + self.hvp
    }
}

impl Add for EvaluationCounts {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            predictions: self.predictions + rhs.predictions,
            jvp: self.jvp + rhs.jvp,
            vjp: self.vjp + rhs.vjp,
            loss: self.loss + rhs.loss,
            gradient: self.gradient + rhs.gradient,
            hvp: self.hvp + rhs.hvp,
        }
    }
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

/// Wrapper to count forward-model evaluations.
#[derive(Debug)]
pub struct CountingModel<M> {
    /// The underlying model
    pub inner: M,
    predictions: Cell<usize>,
    jvp: Cell<usize>,
    vjp: Cell<usize>,
}

impl<M> CountingModel<M> {
    /// Creates a new counting wrapper around a model.
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            predictions: Cell::new(0),
            jvp: Cell::new(0),
            vjp: Cell::new(0),
        }
    }

    /// Resets all counters to zero.
    pub fn reset_counts(&self) {
        self.predictions.set(0);
        self.jvp.set(0);
        self.vjp.set(0);
    }

    /// Returns the current evaluation counts (loss fields are zero).
    pub fn counts(&self) -> EvaluationCounts {
        EvaluationCounts {
            predictions: self.predictions.get(),
            jvp: self.jvp.get(),
            vjp: self.vjp.get(),
            ..EvaluationCounts::default()
        }
    }
}

impl<T: Scalar, M: ForwardModel<T>> ForwardModel<T> for CountingModel<M> {
    fn input_dim(&self) -> usize {
        self.inner.input_dim()
    }

    fn output_dim(&self) -> usize {
        self.inner.output_dim()
    }

    fn predict(&self, x: &DVector<T>) -> Result<DVector<T>> {
        bump(&self.predictions);
        self.inner.predict(x)
    }

    fn jvp(&self, x: &DVector<T>, v: &DVector<T>) -> Result<DVector<T>> {
        bump(&self.jvp);
        self.inner.jvp(x, v)
    }

    fn vjp(&self, x: &DVector<T>, u: &DVector<T>) -> Result<DVector<T>> {
        bump(&self.vjp);
        self.inner.vjp(x, u)
    }
}

/// Wrapper to count loss evaluations.
#[derive(Debug)]
pub struct CountingLoss<L> {
    /// The underlying loss
    pub inner: L,
    value: Cell<usize>,
    gradient: Cell<usize>,
    hvp: Cell<usize>,
}

impl<L> CountingLoss<L> {
    /// Creates a new counting wrapper around a loss.
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            value: Cell::new(0),
            gradient: Cell::new(0),
            hvp: Cell::new(0),
        }
    }

    /// Resets all counters to zero.
    pub fn reset_counts(&self) {
        self.value.set(0);
        self.gradient.set(0);
        self.hvp.set(0);
    }

    /// Returns the current evaluation counts (model fields are zero).
    pub fn counts(&self) -> EvaluationCounts {
        EvaluationCounts {
            loss: self.value.get(),
            gradient: self.gradient.get(),
            hvp: self.hvp.get(),
            ..EvaluationCounts::default()
        }
    }
}

impl<T: Scalar, L: Loss<T>> Loss<T> for CountingLoss<L> {
    fn input_dim(&self) -> Option<usize> {
        self.inner.input_dim()
    }

    fn value(&self, predictions: &DVector<T>) -> Result<T> {
        bump(&self.value);
        self.inner.value(predictions)
    }

    fn gradient(&self, predictions: &DVector<T>) -> Result<DVector<T>> {
        bump(&self.gradient);
        self.inner.gradient(predictions)
    }

    fn hessian_vector_product(&self, predictions: &DVector<T>, v: &DVector<T>) -> Result<DVector<T>> {
        bump(&self.hvp);
        self.inner.hessian_vector_product(predictions, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{loss::SquaredLoss, model::IdentityModel};

    #[test]
    fn test_counting_model() {
        let model = CountingModel::new(IdentityModel::new(2));
        let x = DVector::from_vec(vec![1.0, 2.0]);

        model.predict(&x).unwrap();
        model.predict(&x).unwrap();
        model.jvp(&x, &x).unwrap();
        model.vjp(&x, &x).unwrap();

        let counts = model.counts();
        assert_eq!(counts.predictions, 2);
        assert_eq!(counts.jvp, 1);
        assert_eq!(counts.vjp, 1);
        assert_eq!(counts.total(), 4);

        model.reset_counts();
        assert_eq!(model.counts(), EvaluationCounts::default());
    }

    #[test]
    fn test_counting_loss() {
        let loss = CountingLoss::new(SquaredLoss::new(DVector::from_vec(vec![0.0, 0.0])));
        let p = DVector::from_vec(vec![1.0, 2.0]);

        loss.value(&p).unwrap();
        loss.gradient(&p).unwrap();
        loss.hessian_vector_product(&p, &p).unwrap();
        loss.hessian_vector_product(&p, &p).unwrap();

        let counts = loss.counts();
        assert_eq!(counts.loss, 1);
        assert_eq!(counts.gradient, 1);
        assert_eq!(counts.hvp, 2);
    }

    #[test]
    fn test_counts_add() {
        let a = EvaluationCounts {
            predictions: 1,
            jvp: 2,
            ..EvaluationCounts::default()
        };
        let b = EvaluationCounts {
            loss: 3,
            hvp: 4,
            ..EvaluationCounts::default()
        };
        assert_eq!((a + b).total(), 10);
    }
}
