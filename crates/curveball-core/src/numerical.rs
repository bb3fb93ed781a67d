//! Shape and finiteness checks shared by the oracles and the optimizer.

use crate::{
    error::{ModelError, Result},
    types::{DVector, Scalar},
};
use num_traits::Float;

/// Fails with `DimensionMismatch` unless `actual == expected`.
pub fn ensure_dim(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ModelError::dimension_mismatch(what, expected, actual))
    }
}

/// Fails with `NumericalError` if `value` is NaN or infinite.
pub fn ensure_finite<T: Scalar>(what: &str, value: T) -> Result<()> {
    if Float::is_finite(value) {
        Ok(())
    } else {
        Err(ModelError::numerical_error(format!("{what} is not finite ({value})")))
    }
}

/// Fails with `NumericalError` if any component of `v` is NaN or infinite.
pub fn ensure_finite_vector<T: Scalar>(what: &str, v: &DVector<T>) -> Result<()> {
    match v.iter().position(|x| !Float::is_finite(*x)) {
        None => Ok(()),
        Some(i) => Err(ModelError::numerical_error(format!(
            "{what} has a non-finite component at index {i}"
        ))),
    }
}

/// Maximum absolute component of `v`, zero for an empty vector.
pub fn max_abs<T: Scalar>(v: &DVector<T>) -> T {
    v.iter()
        .map(|x| <T as Float>::abs(*x))
        .fold(T::zero(), |a, b| <T as Float>::max(a, b))
}

/// Finite-difference step for a coordinate of magnitude `|x|`.
pub fn fd_step_for<T: Scalar>(x: T) -> T {
    T::FD_STEP * (T::one() + <T as Float>::abs(x))
}
