//! Callback support for optimization runs.
//!
//! Callbacks observe every step of a run and can stop it early. The loss
//! trajectory they see is what reporting and plotting layers consume.

use crate::{
    error::Result,
    optimizer::{IterationInfo, OptimizationResult},
    types::Scalar,
};

/// Trait for optimization callbacks.
pub trait OptimizationCallback<T: Scalar> {
    /// Called at the start of a run with the initial loss.
    fn on_optimization_start(&mut self, initial_value: T) -> Result<()> {
        let _ = initial_value;
        Ok(())
    }

    /// Called at the end of each iteration.
    ///
    /// Returns `true` to continue optimization, `false` to stop early.
    fn on_iteration_end(&mut self, info: &IterationInfo<T>) -> Result<bool> {
        let _ = info;
        Ok(true)
    }

    /// Called at the end of a run.
    fn on_optimization_end(&mut self, result: &OptimizationResult<T>) -> Result<()> {
        let _ = result;
        Ok(())
    }
}

/// A no-op callback that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl<T: Scalar> OptimizationCallback<T> for NoOpCallback {}

/// Records the loss after every step.
#[derive(Debug, Clone, Default)]
pub struct LossHistory<T: Scalar> {
    values: Vec<T>,
    dampings: Vec<T>,
}

impl<T: Scalar> LossHistory<T> {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            dampings: Vec::new(),
        }
    }

    /// Loss values, starting with the loss before the first step.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Damping after every step.
    pub fn dampings(&self) -> &[T] {
        &self.dampings
    }

    /// Smallest loss seen so far.
    pub fn best(&self) -> Option<T> {
        self.values
            .iter()
            .copied()
            .reduce(|best, v| if v < best { v } else { best })
    }
}

impl<T: Scalar> OptimizationCallback<T> for LossHistory<T> {
    fn on_optimization_start(&mut self, initial_value: T) -> Result<()> {
        self.values.push(initial_value);
        Ok(())
    }

    fn on_iteration_end(&mut self, info: &IterationInfo<T>) -> Result<bool> {
        self.values.push(info.value);
        self.dampings.push(info.damping);
        Ok(true)
    }
}

/// Emits progress through `tracing` every `log_every` iterations.
#[derive(Debug, Clone)]
pub struct LoggingCallback {
    log_every: usize,
}

impl LoggingCallback {
    /// Create a new logging callback.
    pub fn new(log_every: usize) -> Self {
        Self {
            log_every: log_every.max(1),
        }
    }
}

impl<T: Scalar> OptimizationCallback<T> for LoggingCallback {
    fn on_optimization_start(&mut self, initial_value: T) -> Result<()> {
        tracing::info!(loss = %initial_value, "starting optimization");
        Ok(())
    }

    fn on_iteration_end(&mut self, info: &IterationInfo<T>) -> Result<bool> {
        if info.iteration % self.log_every == 0 {
            tracing::info!(
                iteration = info.iteration,
                loss = %info.value,
                damping = %info.damping,
                "curveball progress"
            );
        }
        Ok(true)
    }

    fn on_optimization_end(&mut self, result: &OptimizationResult<T>) -> Result<()> {
        tracing::info!(
            iterations = result.iterations,
            loss = %result.value,
            reason = %result.termination_reason,
            "optimization complete"
        );
        Ok(())
    }
}
