//! Type definitions and aliases for Curveball optimization.
//!
//! This module provides the vector aliases and the trait for numeric types,
//! which carries the per-precision tolerances used throughout the library.

use nalgebra::{Dyn, OMatrix, OVector, RealField, Scalar as NalgebraScalar};
use num_traits::{Float, FromPrimitive};
use std::fmt::{Debug, Display};

/// Trait for scalar types used in optimization (f32 or f64).
///
/// This trait combines all the necessary numeric traits required
/// by the optimizer and the derivative oracles.
pub trait Scalar:
    NalgebraScalar
    + RealField
    + Float
    + FromPrimitive
    + Display
    + Debug
    + Default
    + Copy
    + Send
    + Sync
    + 'static
{
    /// Relative determinant tolerance below which a 2x2 system is
    /// treated as singular.
    const SINGULARITY_TOLERANCE: Self;

    /// Base step for forward-mode finite differences.
    const FD_STEP: Self;

    /// Smallest damping the optimizer will ever use.
    const MIN_DAMPING: Self;

    /// Largest damping the optimizer will ever use.
    const MAX_DAMPING: Self;

    /// Convert from f64 (for constants).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails.
    fn from_f64(v: f64) -> Self {
        <Self as FromPrimitive>::from_f64(v).expect("Failed to convert from f64")
    }
}

impl Scalar for f32 {
    const SINGULARITY_TOLERANCE: Self = 1e-5;
    const FD_STEP: Self = 1e-3;
    const MIN_DAMPING: Self = 1e-6;
    const MAX_DAMPING: Self = 1e6;
}

impl Scalar for f64 {
    const SINGULARITY_TOLERANCE: Self = 1e-12;
    const FD_STEP: Self = 1e-6;
    const MIN_DAMPING: Self = 1e-8;
    const MAX_DAMPING: Self = 1e8;
}

/// Type alias for a dynamically-sized matrix.
pub type DMatrix<T> = OMatrix<T, Dyn, Dyn>;

/// Type alias for a dynamically-sized vector.
///
/// Parameters, momentum, predictions and every derivative product are
/// carried in this type.
pub type DVector<T> = OVector<T, Dyn>;
