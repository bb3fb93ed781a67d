//! Stopping criteria and optimization results.
//!
//! The optimizer itself advances one step at a time; everything a caller
//! needs to drive it to completion lives here: when to stop, why it
//! stopped, and what the run produced.
//!
//! # Termination
//!
//! - **TargetReached**: loss at or below a user threshold
//! - **FunctionTolerance**: loss change between steps below tolerance
//! - **MaxIterations** / **MaxTime**: budget exhausted
//! - **Stalled**: too many consecutive steps made no progress
//! - **CallbackRequest**: a callback asked to stop
//!
//! The stall guard matters for losses whose curvature subproblem turns
//! singular: a loop that only waits for `loss < threshold` would otherwise
//! never end.
//!
//! # Example
//!
//! ```rust
//! use curveball_core::optimizer::StoppingCriterion;
//! use std::time::Duration;
//!
//! let criterion = StoppingCriterion::<f64>::new()
//!     .with_max_iterations(500)
//!     .with_target_value(1e-2)
//!     .with_max_time(Duration::from_secs(60));
//! assert_eq!(criterion.max_iterations, Some(500));
//! ```

use crate::types::{DVector, Scalar};
use num_traits::Float;
use std::fmt;
use std::time::Duration;

/// Why an optimization run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminationReason {
    /// Loss reached the target value: L(x) ≤ L_target
    TargetReached,
    /// Loss change between consecutive steps fell below tolerance
    FunctionTolerance,
    /// Maximum iteration count exhausted
    MaxIterations,
    /// Wall-clock time limit exceeded
    MaxTime,
    /// Too many consecutive steps made no progress
    Stalled,
    /// A callback requested early termination
    CallbackRequest,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetReached => write!(f, "target loss reached"),
            Self::FunctionTolerance => write!(f, "loss change below tolerance"),
            Self::MaxIterations => write!(f, "maximum iterations reached"),
            Self::MaxTime => write!(f, "time limit exceeded"),
            Self::Stalled => write!(f, "no progress for too many steps"),
            Self::CallbackRequest => write!(f, "stopped by callback"),
        }
    }
}

/// Per-iteration information handed to callbacks and stopping checks.
#[derive(Debug, Clone)]
pub struct IterationInfo<T: Scalar> {
    /// Iteration counter after the step
    pub iteration: usize,
    /// Loss after the step
    pub value: T,
    /// Loss before the step
    pub previous_value: T,
    /// Damping after the step
    pub damping: T,
    /// False when the step was a no-op
    pub progressed: bool,
    /// Number of consecutive no-op steps, including this one
    pub consecutive_stalls: usize,
    /// Time since the run started
    pub elapsed: Duration,
}

/// Conditions under which a run terminates.
///
/// Every field is optional; `None` disables that check.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoppingCriterion<T: Scalar> {
    /// Maximum number of steps for this run
    pub max_iterations: Option<usize>,

    /// Maximum wall-clock time for this run
    pub max_time: Option<Duration>,

    /// Stop when the loss is at or below this value
    pub target_value: Option<T>,

    /// Stop when |L(x_k) − L(x_{k−1})| falls below this value on a step
    /// that made progress
    pub function_tolerance: Option<T>,

    /// Stop after this many consecutive no-op steps
    pub max_stalled_iterations: Option<usize>,
}

impl<T: Scalar> Default for StoppingCriterion<T> {
    fn default() -> Self {
        Self {
            max_iterations: Some(1000),
            max_time: None,
            target_value: None,
            function_tolerance: None,
            max_stalled_iterations: Some(10),
        }
    }
}

impl<T: Scalar> StoppingCriterion<T> {
    /// Creates a new stopping criterion with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = Some(max_iter);
        self
    }

    /// Sets the maximum optimization time.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Sets the target loss value.
    pub fn with_target_value(mut self, target: T) -> Self {
        self.target_value = Some(target);
        self
    }

    /// Sets the loss change tolerance.
    pub fn with_function_tolerance(mut self, tol: T) -> Self {
        self.function_tolerance = Some(tol);
        self
    }

    /// Sets how many consecutive no-op steps are tolerated.
    pub fn with_max_stalled_iterations(mut self, max_stalled: usize) -> Self {
        self.max_stalled_iterations = Some(max_stalled);
        self
    }

    /// Disables the stall guard.
    pub fn without_stall_guard(mut self) -> Self {
        self.max_stalled_iterations = None;
        self
    }

    /// Checks the loss before any step has been taken.
    pub fn check_initial(&self, value: T) -> Option<TerminationReason> {
        if let Some(target) = self.target_value {
            if value <= target {
                return Some(TerminationReason::TargetReached);
            }
        }

        if self.max_iterations == Some(0) {
            return Some(TerminationReason::MaxIterations);
        }

        None
    }

    /// Checks the criteria after a step.
    ///
    /// `steps_taken` counts the steps of the current run, which may differ
    /// from `info.iteration` when an optimizer is reused across runs.
    pub fn check(&self, info: &IterationInfo<T>, steps_taken: usize) -> Option<TerminationReason> {
        if let Some(target) = self.target_value {
            if info.value <= target {
                return Some(TerminationReason::TargetReached);
            }
        }

        if let Some(tol) = self.function_tolerance {
            if info.progressed && <T as Float>::abs(info.value - info.previous_value) < tol {
                return Some(TerminationReason::FunctionTolerance);
            }
        }

        if let Some(max_stalled) = self.max_stalled_iterations {
            if info.consecutive_stalls >= max_stalled {
                return Some(TerminationReason::Stalled);
            }
        }

        if let Some(max_iter) = self.max_iterations {
            if steps_taken >= max_iter {
                return Some(TerminationReason::MaxIterations);
            }
        }

        if let Some(max_time) = self.max_time {
            if info.elapsed >= max_time {
                return Some(TerminationReason::MaxTime);
            }
        }

        None
    }
}

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult<T: Scalar> {
    /// Final parameters
    pub point: DVector<T>,

    /// Loss at the final parameters
    pub value: T,

    /// Value of the optimizer's iteration counter at the end of the run
    pub iterations: usize,

    /// Wall-clock time elapsed during the run
    pub duration: Duration,

    /// Why the run stopped
    pub termination_reason: TerminationReason,

    /// True if the run stopped on a loss-based criterion
    pub converged: bool,

    /// Loss before the first step followed by the loss after every step
    pub loss_history: Vec<T>,

    /// Number of no-op steps in the run
    pub stalled_steps: usize,
}

impl<T: Scalar> OptimizationResult<T> {
    /// Creates a new optimization result.
    pub fn new(
        point: DVector<T>,
        value: T,
        iterations: usize,
        duration: Duration,
        termination_reason: TerminationReason,
    ) -> Self {
        let converged = matches!(
            termination_reason,
            TerminationReason::TargetReached | TerminationReason::FunctionTolerance
        );

        Self {
            point,
            value,
            iterations,
            duration,
            termination_reason,
            converged,
            loss_history: Vec::new(),
            stalled_steps: 0,
        }
    }

    /// Sets the loss trajectory.
    pub fn with_loss_history(mut self, history: Vec<T>) -> Self {
        self.loss_history = history;
        self
    }

    /// Sets the number of no-op steps.
    pub fn with_stalled_steps(mut self, stalled: usize) -> Self {
        self.stalled_steps = stalled;
        self
    }
}
