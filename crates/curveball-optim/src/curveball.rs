//! The Curveball optimizer.
//!
//! Curveball is a second-order method for composite objectives `L(f(x))`.
//! Instead of solving a Newton system it keeps a momentum vector `z` and
//! refines it by one step per iteration, using only products with the
//! Jacobian `J` of the forward model and the curvature `C` of the loss.
//! The learning rate `β` and momentum `ρ` are not hand-tuned: each step
//! solves a 2x2 quadratic model for them.
//!
//! # Algorithm Overview
//!
//! At each iteration, with damping `λ`:
//! 1. Evaluates `p = f(x)`, the loss and its gradient `∇L(p)`
//! 2. Forms the curvature direction `Δz = Jᵀ(C·J·z + ∇L(p)) + λz`
//! 3. Builds the quadratic model of the loss on `span{Δz, z}`
//! 4. Solves it for `(β, ρ)` and updates `z ← ρz − βΔz`, `x ← x + z`
//! 5. Adapts `λ` from the ratio of actual to predicted loss change
//!
//! Each step costs two forward passes, two JVPs and two VJPs, plus two
//! loss HVPs when the loss is not a squared error.
//!
//! # References
//!
//! - Henriques et al., "Small steps and giant leaps: Minimal Newton solvers
//!   for Deep Learning" (2019)

use crate::{
    curvature::CurvatureProduct,
    damping::DampingConfig,
    subproblem::{SolveKind, Subproblem},
};
use curveball_core::{
    callback::{NoOpCallback, OptimizationCallback},
    error::{OptimizerError, OptimizerResult},
    loss::Loss,
    model::ForwardModel,
    numerical::{ensure_dim, ensure_finite, ensure_finite_vector},
    optimizer::{IterationInfo, OptimizationResult, StoppingCriterion, TerminationReason},
    types::{DVector, Scalar},
};
use nalgebra::Vector2;
use num_traits::Float;
use std::time::Instant;

/// How the learning rate and momentum are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepRule<T: Scalar> {
    /// Solve the 2x2 subproblem every step
    #[default]
    Automatic,
    /// Use the given coefficients and skip the solve
    Fixed {
        /// Learning rate
        beta: T,
        /// Momentum
        rho: T,
    },
}

/// Configuration for the Curveball optimizer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurveballConfig<T: Scalar> {
    /// Learning-rate and momentum rule
    pub step_rule: StepRule<T>,
    /// Damping schedule
    pub damping: DampingConfig<T>,
    /// Relative determinant tolerance for the 2x2 solve
    pub singularity_tolerance: T,
}

impl<T: Scalar> Default for CurveballConfig<T> {
    fn default() -> Self {
        Self {
            step_rule: StepRule::Automatic,
            damping: DampingConfig::default(),
            singularity_tolerance: T::SINGULARITY_TOLERANCE,
        }
    }
}

impl<T: Scalar> CurveballConfig<T> {
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the step rule.
    pub fn with_step_rule(mut self, rule: StepRule<T>) -> Self {
        self.step_rule = rule;
        self
    }

    /// Uses a fixed learning rate and momentum.
    pub fn with_fixed_step(mut self, beta: T, rho: T) -> Self {
        self.step_rule = StepRule::Fixed { beta, rho };
        self
    }

    /// Sets the damping schedule.
    pub fn with_damping(mut self, damping: DampingConfig<T>) -> Self {
        self.damping = damping;
        self
    }

    /// Sets the initial damping, keeping the rest of the schedule.
    pub fn with_initial_damping(mut self, damping: T) -> Self {
        self.damping.initial = damping;
        self
    }

    /// Sets the singularity tolerance of the 2x2 solve.
    pub fn with_singularity_tolerance(mut self, tol: T) -> Self {
        self.singularity_tolerance = tol;
        self
    }

    /// Checks the configuration for consistency.
    pub fn validate(&self) -> OptimizerResult<()> {
        self.damping.validate()?;

        if !Float::is_finite(self.singularity_tolerance) || self.singularity_tolerance < T::zero() {
            return Err(OptimizerError::invalid_configuration(
                "singularity tolerance must be finite and non-negative",
                "singularity_tolerance",
                self.singularity_tolerance.to_string(),
            ));
        }

        if let StepRule::Fixed { beta, rho } = self.step_rule {
            if !Float::is_finite(beta) || !Float::is_finite(rho) {
                return Err(OptimizerError::invalid_configuration(
                    "fixed learning rate and momentum must be finite",
                    "step_rule",
                    format!("beta = {beta}, rho = {rho}"),
                ));
            }
        }

        Ok(())
    }
}

/// Result of a single Curveball step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome<T: Scalar> {
    /// Parameters after the step
    pub parameters: DVector<T>,
    /// Loss after the step
    pub loss: T,
    /// Loss before the step
    pub previous_loss: T,
    /// Learning rate used
    pub beta: T,
    /// Momentum used
    pub rho: T,
    /// Loss change predicted by the quadratic model
    pub predicted_change: T,
    /// Damping after the step
    pub damping: T,
    /// How the 2x2 subproblem was solved
    pub solve: SolveKind,
}

impl<T: Scalar> StepOutcome<T> {
    /// False when the step was a no-op.
    pub fn progressed(&self) -> bool {
        self.solve != SolveKind::Degenerate
    }
}

/// Curveball optimizer over a forward model `M` and a loss `L`.
///
/// The optimizer owns the iterate, the momentum and the damping. A step
/// either commits all of them together with the iteration counter, or
/// leaves them untouched and returns an error.
#[derive(Debug)]
pub struct Curveball<T: Scalar, M, L> {
    model: M,
    loss: L,
    curvature: CurvatureProduct,
    config: CurveballConfig<T>,
    x: DVector<T>,
    z: DVector<T>,
    damping: T,
    iteration: usize,
}

impl<T, M, L> Curveball<T, M, L>
where
    T: Scalar,
    M: ForwardModel<T>,
    L: Loss<T>,
{
    /// Creates an optimizer starting at `x0` with zero momentum.
    ///
    /// `squared_loss` declares that `loss` is `½‖p − target‖²`, in which case
    /// the loss Hessian is never requested.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` for an empty `x0` or an inconsistent config
    /// - `DimensionMismatch` if `x0`, the model and the loss disagree
    /// - `NumericalError` if `x0` is not finite
    pub fn new(
        x0: DVector<T>,
        model: M,
        loss: L,
        squared_loss: bool,
        config: CurveballConfig<T>,
    ) -> OptimizerResult<Self> {
        config.validate()?;

        if x0.is_empty() {
            return Err(OptimizerError::invalid_configuration(
                "initial parameters must not be empty",
                "x0",
                "[]",
            ));
        }
        ensure_dim("initial parameters", model.input_dim(), x0.len())?;
        if let Some(loss_dim) = loss.input_dim() {
            ensure_dim("model output", loss_dim, model.output_dim())?;
        }
        ensure_finite_vector("initial parameters", &x0)?;

        let curvature = CurvatureProduct::from_squared_loss(squared_loss);
        let damping = config.damping.initial;
        let z = DVector::zeros(x0.len());

        tracing::debug!(
            dim = x0.len(),
            outputs = model.output_dim(),
            curvature = %curvature,
            damping = %damping,
            "created Curveball optimizer"
        );

        Ok(Self {
            model,
            loss,
            curvature,
            config,
            x: x0,
            z,
            damping,
            iteration: 0,
        })
    }

    /// Number of completed steps.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Current parameters.
    pub fn parameters(&self) -> &DVector<T> {
        &self.x
    }

    /// Current momentum vector `z`.
    pub fn momentum(&self) -> &DVector<T> {
        &self.z
    }

    /// Current damping `λ`.
    pub fn damping(&self) -> T {
        self.damping
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CurveballConfig<T> {
        &self.config
    }

    /// Curvature strategy chosen at construction.
    pub fn curvature(&self) -> CurvatureProduct {
        self.curvature
    }

    /// The forward model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The loss.
    pub fn loss(&self) -> &L {
        &self.loss
    }

    /// Evaluates `L(f(x))` at the current parameters.
    pub fn evaluate(&self) -> OptimizerResult<T> {
        let predictions = self.model.predict(&self.x)?;
        Ok(self.loss.value(&predictions)?)
    }

    /// Performs one Curveball step.
    ///
    /// # Errors
    ///
    /// Propagates model and loss errors, and returns `NumericalError` when
    /// the step would produce non-finite parameters or loss. On error the
    /// optimizer state is unchanged.
    pub fn step(&mut self) -> OptimizerResult<StepOutcome<T>> {
        let x = &self.x;
        let z = &self.z;
        let lambda = self.damping;
        let n = x.len();
        let m = self.model.output_dim();

        let predictions = self.model.predict(x)?;
        ensure_dim("model output", m, predictions.len())?;
        let loss0 = self.loss.value(&predictions)?;
        ensure_finite("loss", loss0)?;
        let grad_pred = self.loss.gradient(&predictions)?;
        ensure_dim("loss gradient", m, grad_pred.len())?;

        // Curvature applied to the momentum: C·J·z
        let jz = self.model.jvp(x, z)?;
        ensure_dim("jvp output", m, jz.len())?;
        let cjz = self.curvature.apply(&self.loss, &predictions, jz.clone())?;
        ensure_dim("curvature product", m, cjz.len())?;

        let jt_residual = self.model.vjp(x, &(&cjz + &grad_pred))?;
        ensure_dim("vjp output", n, jt_residual.len())?;
        let delta_z = jt_residual + z * lambda;
        let grad = self.model.vjp(x, &grad_pred)?;
        ensure_dim("vjp output", n, grad.len())?;

        let j_delta = self.model.jvp(x, &delta_z)?;
        ensure_dim("jvp output", m, j_delta.len())?;
        let cj_delta = self.curvature.apply(&self.loss, &predictions, j_delta.clone())?;
        ensure_dim("curvature product", m, cj_delta.len())?;

        let subproblem = Subproblem::new(
            j_delta.dot(&cj_delta) + lambda * delta_z.dot(&delta_z),
            jz.dot(&cj_delta) + lambda * z.dot(&delta_z),
            jz.dot(&cjz) + lambda * z.dot(z),
            grad.dot(&delta_z),
            grad.dot(z),
        );

        let (u, solve) = match self.config.step_rule {
            StepRule::Automatic => subproblem.solve(self.config.singularity_tolerance)?,
            StepRule::Fixed { beta, rho } => (Vector2::new(-beta, rho), SolveKind::Fixed),
        };
        let beta = -u[0];
        let rho = u[1];

        let (x_new, z_new, loss1) = if solve == SolveKind::Degenerate {
            tracing::debug!(
                iteration = self.iteration,
                "curvature subproblem is degenerate, step is a no-op"
            );
            (x.clone(), z.clone(), loss0)
        } else {
            if solve == SolveKind::PseudoInverse {
                tracing::debug!(
                    iteration = self.iteration,
                    a = ?subproblem.matrix.as_slice(),
                    "curvature subproblem is near-singular, using pseudo-inverse"
                );
            }
            let z_new = z * rho - &delta_z * beta;
            let x_new = x + &z_new;
            ensure_finite_vector("updated parameters", &x_new)?;
            let loss1 = self.loss.value(&self.model.predict(&x_new)?)?;
            ensure_finite("updated loss", loss1)?;
            (x_new, z_new, loss1)
        };

        let predicted_change = subproblem.predicted_change(&u);
        let mut damping = lambda;
        if predicted_change != T::zero() && self.config.damping.updates_at(self.iteration) {
            let ratio = (loss1 - loss0) / predicted_change;
            damping = self.config.damping.adapt(lambda, ratio);
            if damping != lambda {
                tracing::debug!(
                    iteration = self.iteration,
                    ratio = %ratio,
                    from = %lambda,
                    to = %damping,
                    "damping adapted"
                );
            }
        }

        self.x = x_new;
        self.z = z_new;
        self.damping = damping;
        self.iteration += 1;

        tracing::trace!(
            iteration = self.iteration,
            loss = %loss1,
            damping = %damping,
            beta = %beta,
            rho = %rho,
            solve = %solve,
            "curveball step"
        );

        Ok(StepOutcome {
            parameters: self.x.clone(),
            loss: loss1,
            previous_loss: loss0,
            beta,
            rho,
            predicted_change,
            damping,
            solve,
        })
    }

    /// Steps until `criterion` fires.
    pub fn optimize(
        &mut self,
        criterion: &StoppingCriterion<T>,
    ) -> OptimizerResult<OptimizationResult<T>> {
        self.optimize_with_callback(criterion, &mut NoOpCallback)
    }

    /// Steps until `criterion` fires or `callback` asks to stop.
    pub fn optimize_with_callback<C>(
        &mut self,
        criterion: &StoppingCriterion<T>,
        callback: &mut C,
    ) -> OptimizerResult<OptimizationResult<T>>
    where
        C: OptimizationCallback<T> + ?Sized,
    {
        let start = Instant::now();
        let initial_value = self.evaluate()?;
        ensure_finite("initial loss", initial_value)?;
        callback.on_optimization_start(initial_value)?;

        let mut history = vec![initial_value];
        let mut value = initial_value;
        let mut steps = 0;
        let mut consecutive_stalls = 0;
        let mut stalled_steps = 0;

        let reason = match criterion.check_initial(initial_value) {
            Some(reason) => reason,
            None => loop {
                let outcome = self.step()?;
                steps += 1;

                let progressed = outcome.progressed();
                if progressed {
                    consecutive_stalls = 0;
                } else {
                    consecutive_stalls += 1;
                    stalled_steps += 1;
                }
                value = outcome.loss;
                history.push(value);

                let info = IterationInfo {
                    iteration: self.iteration,
                    value,
                    previous_value: outcome.previous_loss,
                    damping: outcome.damping,
                    progressed,
                    consecutive_stalls,
                    elapsed: start.elapsed(),
                };

                if !callback.on_iteration_end(&info)? {
                    break TerminationReason::CallbackRequest;
                }
                if let Some(reason) = criterion.check(&info, steps) {
                    break reason;
                }
            },
        };

        if reason == TerminationReason::Stalled {
            tracing::warn!(
                iteration = self.iteration,
                stalled = consecutive_stalls,
                loss = %value,
                "Curveball made no progress, stopping"
            );
        }

        let result = OptimizationResult::new(
            self.x.clone(),
            value,
            self.iteration,
            start.elapsed(),
            reason,
        )
        .with_loss_history(history)
        .with_stalled_steps(stalled_steps);

        tracing::info!(
            iterations = result.iterations,
            steps,
            loss = %result.value,
            reason = %result.termination_reason,
            "Curveball optimization finished"
        );

        callback.on_optimization_end(&result)?;
        Ok(result)
    }
}
