//! Adaptive damping.
//!
//! The damping `λ` regularizes the curvature matrix `JᵀCJ + λI`. After each
//! step the actual loss change is compared with the change predicted by the
//! quadratic model; the ratio drives `λ` up (model too optimistic) or down
//! (model too pessimistic), in the same way a trust region radius follows
//! its reduction ratio.

use curveball_core::{
    error::{OptimizerError, OptimizerResult},
    types::Scalar,
};
use num_traits::Float;

/// Configuration for the damping schedule.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DampingConfig<T: Scalar> {
    /// Damping before the first step
    pub initial: T,
    /// Factor applied when the model over-predicts the decrease (≥ 1)
    pub increase_factor: T,
    /// Factor applied when the model under-predicts the decrease (in (0, 1])
    pub decrease_factor: T,
    /// Ratio below which damping increases
    pub lower_ratio: T,
    /// Ratio above which damping decreases
    pub upper_ratio: T,
    /// Lower clamp for damping
    pub min_damping: T,
    /// Upper clamp for damping
    pub max_damping: T,
    /// Adapt only on iterations that are multiples of this value
    pub update_interval: usize,
}

impl<T: Scalar> Default for DampingConfig<T> {
    fn default() -> Self {
        Self {
            initial: T::one(),
            increase_factor: <T as Scalar>::from_f64(1.01),
            decrease_factor: <T as Scalar>::from_f64(0.99),
            lower_ratio: <T as Scalar>::from_f64(0.5),
            upper_ratio: <T as Scalar>::from_f64(1.5),
            min_damping: T::MIN_DAMPING,
            max_damping: T::MAX_DAMPING,
            update_interval: 1,
        }
    }
}

impl<T: Scalar> DampingConfig<T> {
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial damping.
    pub fn with_initial(mut self, damping: T) -> Self {
        self.initial = damping;
        self
    }

    /// Sets the increase and decrease factors.
    pub fn with_factors(mut self, increase: T, decrease: T) -> Self {
        self.increase_factor = increase;
        self.decrease_factor = decrease;
        self
    }

    /// Sets the ratio thresholds.
    pub fn with_ratio_thresholds(mut self, lower: T, upper: T) -> Self {
        self.lower_ratio = lower;
        self.upper_ratio = upper;
        self
    }

    /// Sets the damping clamp.
    pub fn with_bounds(mut self, min: T, max: T) -> Self {
        self.min_damping = min;
        self.max_damping = max;
        self
    }

    /// Sets how often damping adapts.
    pub fn with_update_interval(mut self, interval: usize) -> Self {
        self.update_interval = interval;
        self
    }

    /// Disables adaptation; damping stays at its initial value.
    pub fn fixed(damping: T) -> Self {
        Self::default()
            .with_initial(damping)
            .with_factors(T::one(), T::one())
    }

    /// Checks the configuration for consistency.
    pub fn validate(&self) -> OptimizerResult<()> {
        let positive = |v: T| Float::is_finite(v) && v > T::zero();

        if !positive(self.min_damping) || !positive(self.max_damping) {
            return Err(OptimizerError::invalid_configuration(
                "damping bounds must be positive and finite",
                "damping.min_damping/max_damping",
                format!("[{}, {}]", self.min_damping, self.max_damping),
            ));
        }
        if self.min_damping > self.max_damping {
            return Err(OptimizerError::invalid_configuration(
                "minimum damping exceeds maximum damping",
                "damping.min_damping/max_damping",
                format!("[{}, {}]", self.min_damping, self.max_damping),
            ));
        }
        if !positive(self.initial) || self.initial < self.min_damping || self.initial > self.max_damping
        {
            return Err(OptimizerError::invalid_configuration(
                "initial damping must be positive and within the damping bounds",
                "damping.initial",
                self.initial.to_string(),
            ));
        }
        if !Float::is_finite(self.increase_factor) || self.increase_factor < T::one() {
            return Err(OptimizerError::invalid_configuration(
                "increase factor must be at least 1",
                "damping.increase_factor",
                self.increase_factor.to_string(),
            ));
        }
        if !positive(self.decrease_factor) || self.decrease_factor > T::one() {
            return Err(OptimizerError::invalid_configuration(
                "decrease factor must be in (0, 1]",
                "damping.decrease_factor",
                self.decrease_factor.to_string(),
            ));
        }
        if !Float::is_finite(self.lower_ratio)
            || !Float::is_finite(self.upper_ratio)
            || self.lower_ratio > self.upper_ratio
        {
            return Err(OptimizerError::invalid_configuration(
                "ratio thresholds must be finite with lower <= upper",
                "damping.lower_ratio/upper_ratio",
                format!("[{}, {}]", self.lower_ratio, self.upper_ratio),
            ));
        }
        if self.update_interval == 0 {
            return Err(OptimizerError::invalid_configuration(
                "update interval must be at least 1",
                "damping.update_interval",
                "0",
            ));
        }
        Ok(())
    }

    /// Whether damping adapts after the step taken at `iteration`.
    pub fn updates_at(&self, iteration: usize) -> bool {
        iteration % self.update_interval == 0
    }

    /// New damping given the ratio of actual to predicted loss change.
    ///
    /// The result is clamped to `[min_damping, max_damping]`.
    pub fn adapt(&self, current: T, ratio: T) -> T {
        let next = if ratio < self.lower_ratio {
            current * self.increase_factor
        } else if ratio > self.upper_ratio {
            current * self.decrease_factor
        } else {
            current
        };
        self.clamp(next)
    }

    /// Clamps a damping value into the configured bounds.
    pub fn clamp(&self, damping: T) -> T {
        <T as Float>::min(<T as Float>::max(damping, self.min_damping), self.max_damping)
    }
}
